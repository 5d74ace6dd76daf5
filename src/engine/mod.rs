/*
Copyright 2026 NWP Consumer Contributors

This file is part of the NWP Consumer.

The NWP Consumer is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

The NWP Consumer is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with the NWP Consumer. If not, see https://www.gnu.org/licenses/.
*/

//! Bounded-parallel fetch/decode/region-write engines (C7 [`consume`],
//! C8 [`archive`]) and the worker-pool plumbing they share.
//!
//! A `rayon::ThreadPool` sized to the configured concurrency, jobs
//! `spawn`ed onto it, results collected through an `std::sync::mpsc`
//! channel read exclusively by the calling thread. That calling thread is
//! also the only one ever writing to the tensor store (spec.md §5's
//! single-writer-thread discipline), so no cross-thread write
//! synchronization is needed on the store itself.

pub mod archive;
pub mod consume;

use crate::errors::JobError;
use crate::repo::{Fragment, Job};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::mpsc;

/// Builds the worker pool sized `max_connections - 1` (minimum 1), reserving
/// one connection's worth of capacity for the writer thread's own I/O
/// (spec.md §4.5 step 6, §5).
pub fn build_worker_pool(max_connections: usize) -> ThreadPool {
    let workers = max_connections.saturating_sub(1).max(1);
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .expect("building the worker pool must not fail")
}

/// Dispatches every job in `jobs` onto `pool` and invokes `on_result` on the
/// calling thread as each completes, in unspecified (unordered) completion
/// order. `on_result` is therefore the only place store writes may happen.
pub fn run_jobs(pool: &ThreadPool, jobs: Vec<Job>, mut on_result: impl FnMut(Result<Vec<Fragment>, JobError>)) {
    let job_count = jobs.len();
    let (tx, rx) = mpsc::channel();

    for job in jobs {
        let tx = tx.clone();
        pool.spawn(move || {
            let _ = tx.send(job.run());
        });
    }
    drop(tx);

    for _ in 0..job_count {
        let result = rx
            .recv()
            .expect("a worker dropped its sender without reporting a result");
        on_result(result);
    }
}
