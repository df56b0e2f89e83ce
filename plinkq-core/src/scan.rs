//! Parallel scan driving: batch claiming, cancellation, and the
//! worker loop that runs a kernel to completion.
//!
//! Work distribution follows a shared atomic cursor over the variant
//! (or sample) range: each worker claims a contiguous block with
//! `fetch_add`, so every index is processed by exactly one thread and
//! per-thread output is ascending. Global order across threads is
//! unspecified; consumers that need one must sort downstream.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use plinkq_geno::{PlinkError, Result};

use crate::table::{OutputBatch, Projection, ScanKernel, VECTOR_CAPACITY};

/// Cooperative cancellation shared between the driver and the host.
/// Observed at claim boundaries; kernels run claimed work to
/// completion.
#[derive(Clone, Default)]
pub struct ScanContext {
    cancel: Arc<AtomicBool>,
}

impl ScanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// Atomic claim cursor over a half-open index range.
pub struct BatchClaimer {
    next: AtomicU32,
    end: u32,
}

impl BatchClaimer {
    pub fn new(start: u32, end: u32) -> Self {
        BatchClaimer {
            next: AtomicU32::new(start),
            end,
        }
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Claim up to `max` consecutive indices; `None` once the range is
    /// exhausted or cancellation has been observed.
    pub fn claim(&self, max: u32, ctx: &ScanContext) -> Option<(u32, u32)> {
        if max == 0 || ctx.is_cancelled() {
            return None;
        }
        let start = self.next.fetch_add(max, Ordering::Relaxed);
        if start >= self.end {
            return None;
        }
        Some((start, (start + max).min(self.end)))
    }
}

/// The shared `max_threads` heuristic for variant-parallel kernels.
pub fn default_max_threads(range_len: u32) -> usize {
    ((range_len / 500) as usize + 1).min(16)
}

/// Run a kernel to completion: init-global once, then one worker per
/// thread doing init-local followed by repeated scans. Returns every
/// non-empty batch; batch order across workers is unspecified.
pub fn run_scan<K: ScanKernel>(
    kernel: &K,
    projection: &Projection,
    ctx: &ScanContext,
) -> Result<Vec<OutputBatch>> {
    let global = kernel.init_global(projection)?;
    let threads = kernel.max_threads(&global).max(1);
    tracing::debug!(kernel = kernel.name(), threads, "starting scan");

    if threads == 1 {
        let mut local = kernel.init_local(&global)?;
        let mut batches = Vec::new();
        loop {
            let mut batch =
                OutputBatch::for_projection(kernel.schema(), projection, VECTOR_CAPACITY);
            kernel.scan(&global, &mut local, ctx, &mut batch)?;
            if batch.rows() == 0 {
                break;
            }
            batches.push(batch);
        }
        return Ok(batches);
    }

    let results: Mutex<Vec<OutputBatch>> = Mutex::new(Vec::new());
    let first_error: Mutex<Option<PlinkError>> = Mutex::new(None);

    rayon::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|_| {
                let outcome = worker_loop(kernel, &global, projection, ctx, &results);
                if let Err(err) = outcome {
                    // First failure wins; siblings stop at their next
                    // claim boundary.
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    ctx.cancel();
                }
            });
        }
    });

    if let Some(err) = first_error.into_inner().unwrap() {
        return Err(err);
    }
    Ok(results.into_inner().unwrap())
}

fn worker_loop<K: ScanKernel>(
    kernel: &K,
    global: &K::Global,
    projection: &Projection,
    ctx: &ScanContext,
    results: &Mutex<Vec<OutputBatch>>,
) -> Result<()> {
    let mut local = kernel.init_local(global)?;
    loop {
        let mut batch = OutputBatch::for_projection(kernel.schema(), projection, VECTOR_CAPACITY);
        kernel.scan(global, &mut local, ctx, &mut batch)?;
        if batch.rows() == 0 {
            return Ok(());
        }
        results.lock().unwrap().push(batch);
    }
}
