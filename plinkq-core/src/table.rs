//! Table-function protocol: typed fixed-capacity output batches,
//! projection pushdown, and the kernel interface the scan driver runs.
//!
//! The enclosing engine consumes results in batches of at most
//! [`VECTOR_CAPACITY`] rows. A scan call fills one batch and returns as
//! soon as it is full or its input range is exhausted; an empty batch
//! signals that the calling worker is done.

use plinkq_geno::Result;

/// Sentinel projection entry for the engine's row-id pseudo column.
/// The engine computes row ids itself; kernels emit null there.
pub const ROW_ID_COLUMN: usize = usize::MAX;

/// Fixed output-batch capacity, in rows.
pub const VECTOR_CAPACITY: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar,
    Int32,
    Double,
    /// Variable-length list of nullable int32 (genotype lists).
    Int32List,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: &'static str, ty: ColumnType) -> Self {
        ColumnDef { name, ty }
    }
}

/// The projected column list: logical column ids in output order, plus
/// possibly [`ROW_ID_COLUMN`] entries.
#[derive(Debug, Clone)]
pub struct Projection {
    pub column_ids: Vec<usize>,
}

impl Projection {
    /// Project every column of a schema, in order.
    pub fn all(schema: &[ColumnDef]) -> Self {
        Projection {
            column_ids: (0..schema.len()).collect(),
        }
    }

    pub fn new(column_ids: Vec<usize>) -> Self {
        Projection { column_ids }
    }

    /// True when any projected logical column id is >= `first`; the
    /// kernels use this to decide whether decoder resources are needed
    /// at all.
    pub fn any_at_or_beyond(&self, first: usize) -> bool {
        self.column_ids
            .iter()
            .any(|&c| c != ROW_ID_COLUMN && c >= first)
    }
}

/// One output column's values plus its null mask, represented as
/// options.
pub enum ColumnData {
    Varchar(Vec<Option<String>>),
    Int32(Vec<Option<i32>>),
    Double(Vec<Option<f64>>),
    Int32List(Vec<Option<Vec<Option<i32>>>>),
}

impl ColumnData {
    fn with_capacity(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Varchar => ColumnData::Varchar(Vec::with_capacity(capacity)),
            ColumnType::Int32 => ColumnData::Int32(Vec::with_capacity(capacity)),
            ColumnType::Double => ColumnData::Double(Vec::with_capacity(capacity)),
            ColumnType::Int32List => ColumnData::Int32List(Vec::with_capacity(capacity)),
        }
    }

    fn push_null(&mut self) {
        match self {
            ColumnData::Varchar(v) => v.push(None),
            ColumnData::Int32(v) => v.push(None),
            ColumnData::Double(v) => v.push(None),
            ColumnData::Int32List(v) => v.push(None),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::Varchar(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Int32List(v) => v.len(),
        }
    }
}

/// Borrowed view of one cell, for consumers and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Varchar(&'a str),
    Int32(i32),
    Double(f64),
    Int32List(&'a [Option<i32>]),
}

/// A fixed-capacity output batch with one column per projection entry.
pub struct OutputBatch {
    columns: Vec<ColumnData>,
    capacity: usize,
    rows: usize,
}

impl OutputBatch {
    /// Allocate a batch shaped by `projection` against `schema`.
    /// [`ROW_ID_COLUMN`] entries become null-filled int32 columns.
    pub fn for_projection(
        schema: &[ColumnDef],
        projection: &Projection,
        capacity: usize,
    ) -> Self {
        let columns = projection
            .column_ids
            .iter()
            .map(|&col_id| {
                let ty = if col_id == ROW_ID_COLUMN {
                    ColumnType::Int32
                } else {
                    schema[col_id].ty
                };
                ColumnData::with_capacity(ty, capacity)
            })
            .collect();
        OutputBatch {
            columns,
            capacity,
            rows: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_full(&self) -> bool {
        self.rows >= self.capacity
    }

    /// Rows still writable before the batch must be handed back.
    pub fn remaining(&self) -> usize {
        self.capacity - self.rows
    }

    pub fn column_ct(&self) -> usize {
        self.columns.len()
    }

    pub fn push_null(&mut self, out_col: usize) {
        self.columns[out_col].push_null();
    }

    pub fn push_varchar(&mut self, out_col: usize, value: Option<&str>) {
        match &mut self.columns[out_col] {
            ColumnData::Varchar(v) => v.push(value.map(str::to_string)),
            _ => panic!("column {out_col} is not VARCHAR"),
        }
    }

    pub fn push_int32(&mut self, out_col: usize, value: Option<i32>) {
        match &mut self.columns[out_col] {
            ColumnData::Int32(v) => v.push(value),
            _ => panic!("column {out_col} is not INTEGER"),
        }
    }

    pub fn push_double(&mut self, out_col: usize, value: Option<f64>) {
        match &mut self.columns[out_col] {
            ColumnData::Double(v) => v.push(value),
            _ => panic!("column {out_col} is not DOUBLE"),
        }
    }

    pub fn push_int32_list(&mut self, out_col: usize, value: Option<Vec<Option<i32>>>) {
        match &mut self.columns[out_col] {
            ColumnData::Int32List(v) => v.push(value),
            _ => panic!("column {out_col} is not LIST(INTEGER)"),
        }
    }

    /// Seal the current row. Every output column must have been pushed
    /// exactly once since the previous call.
    pub fn finish_row(&mut self) {
        self.rows += 1;
        debug_assert!(self.columns.iter().all(|c| c.len() == self.rows));
    }

    pub fn value(&self, out_col: usize, row: usize) -> Value<'_> {
        match &self.columns[out_col] {
            ColumnData::Varchar(v) => match &v[row] {
                None => Value::Null,
                Some(s) => Value::Varchar(s),
            },
            ColumnData::Int32(v) => match v[row] {
                None => Value::Null,
                Some(x) => Value::Int32(x),
            },
            ColumnData::Double(v) => match v[row] {
                None => Value::Null,
                Some(x) => Value::Double(x),
            },
            ColumnData::Int32List(v) => match &v[row] {
                None => Value::Null,
                Some(xs) => Value::Int32List(xs),
            },
        }
    }
}

/// The shared kernel interface: bind is each kernel's constructor,
/// then the engine calls `init_global` once, `init_local` once per
/// worker thread, and `scan` repeatedly until it emits an empty batch.
pub trait ScanKernel: Send + Sync {
    type Global: Send + Sync;
    type Local: Send;

    fn name(&self) -> &'static str;

    fn schema(&self) -> &[ColumnDef];

    fn init_global(&self, projection: &Projection) -> Result<Self::Global>;

    fn init_local(&self, global: &Self::Global) -> Result<Self::Local>;

    /// Worker-thread parallelism hint; serialized kernels return 1.
    fn max_threads(&self, global: &Self::Global) -> usize;

    fn scan(
        &self,
        global: &Self::Global,
        local: &mut Self::Local,
        ctx: &crate::scan::ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()>;
}
