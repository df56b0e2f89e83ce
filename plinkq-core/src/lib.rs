//! plinkq-core: SQL-style analytics kernels over PLINK 2 genotype
//! datasets.
//!
//! Every kernel follows the same table-function lifecycle — bind,
//! init-global, init-local per worker, then repeated scan calls into
//! fixed-capacity output batches — driven in parallel by [`scan::run_scan`].

pub mod bind;
pub mod freq;
pub mod hardy;
pub mod ld;
pub mod missing;
pub mod read;
pub mod scan;
pub mod score;
pub mod table;

pub use bind::{Dataset, ScanOptions};
pub use scan::{run_scan, ScanContext};
pub use table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel, Value};
