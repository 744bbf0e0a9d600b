//! Worker pool and chunk scheduler for per-generation computation

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::available_parallelism;

use log::debug;
use rayon::prelude::*;

use crate::cellmap::CellMap;
use crate::error::ComputeError;
use crate::flag::StopFlag;

/// Fixed-size worker pool executing one compute task per frontier chunk.
///
/// Chunking bounds per-task overhead and balances load; the pool itself is
/// shared across generations. `dispatch` blocks until every chunk of the
/// in-flight generation has finished, so the next buffers are fully
/// populated before anything reads them.
pub struct ChunkScheduler {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ChunkScheduler {
    /// Builds the pool with `workers` threads, or available parallelism + 1
    /// when unspecified.
    pub fn new(workers: Option<usize>) -> Self {
        let workers = workers.unwrap_or_else(default_pool_size);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("gridlife-worker-{index}"))
            .build()
            .expect("failed to build worker thread pool");
        debug!("worker pool sized to {workers} threads");
        Self { pool, workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the transition rule over the map's frontier, one task per chunk
    /// of `chunk_size` cells, and returns the summed alive count.
    ///
    /// No partial result escapes: a stop request pending when a chunk starts
    /// aborts the whole generation with `Interrupted`, and a panicking chunk
    /// task surfaces as `Failed`. The caller must skip the commit and roll
    /// the next buffers back on any error.
    pub fn dispatch(
        &self,
        map: &CellMap,
        chunk_size: usize,
        stop: &StopFlag,
    ) -> Result<u64, ComputeError> {
        let frontier = map.frontier();
        let chunk_size = chunk_size.max(1);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                frontier
                    .par_chunks(chunk_size)
                    .map(|chunk| {
                        if stop.is_on() {
                            return Err(ComputeError::Interrupted);
                        }
                        Ok(map.compute_cells(chunk))
                    })
                    .try_reduce(|| 0u64, |a, b| Ok(a + b))
            })
        }));
        match outcome {
            Ok(result) => result,
            Err(panic) => Err(ComputeError::Failed(panic_message(panic))),
        }
    }

    /// Runs `attempts` random seeding tasks over the pool. Collisions are
    /// allowed, so the number of cells actually turned on may be lower.
    pub fn seed(&self, map: &CellMap, attempts: usize) -> usize {
        self.pool.install(|| {
            (0..attempts)
                .into_par_iter()
                .filter(|_| map.seed_random_cell())
                .count()
        })
    }
}

fn default_pool_size() -> usize {
    available_parallelism().map(|threads| threads.get()).unwrap_or(1) + 1
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "chunk task panicked".to_string()
    }
}
