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

//! Background performance monitor (spec.md §4.5/§4.6 step 1, §5): an
//! independent thread sampling process memory at a fixed interval, joined
//! when the engine's run finishes.
//!
//! The sampler itself is injected as a plain closure rather than hardwiring
//! a `cap::Cap` reference here, so the monitor can be exercised in tests
//! without a process-wide allocator.

use crate::constants::PERF_SAMPLE_INTERVAL;
use crate::notify::Performance;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// A running sampler thread. `stop` joins it and summarizes the samples
/// taken since [`PerformanceMonitor::start`].
pub struct PerformanceMonitor {
    started_at: Instant,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<Vec<usize>>>,
}

impl PerformanceMonitor {
    /// Spawns the sampler thread. `sample_bytes` is called roughly every
    /// [`PERF_SAMPLE_INTERVAL`] and must be cheap and non-blocking (it runs
    /// on the monitor's own thread, touching only its own buffer, per
    /// spec.md §5's shared-resources note).
    pub fn start(sample_bytes: impl Fn() -> usize + Send + 'static) -> PerformanceMonitor {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop_flag = Arc::clone(&stop_flag);

        let handle = std::thread::spawn(move || {
            let mut samples = Vec::new();
            while !thread_stop_flag.load(Ordering::Relaxed) {
                samples.push(sample_bytes());
                std::thread::sleep(PERF_SAMPLE_INTERVAL);
            }
            samples.push(sample_bytes());
            samples
        });

        PerformanceMonitor {
            started_at: Instant::now(),
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Signals the sampler thread to stop, joins it, and summarizes the run
    /// as a [`Performance`] record: elapsed wall time and peak sampled
    /// memory, per spec.md §3's `perf = {duration_seconds, memory_mb}`.
    pub fn stop(mut self) -> Performance {
        self.stop_flag.store(true, Ordering::Relaxed);
        let samples = self
            .handle
            .take()
            .expect("stop is only ever called once")
            .join()
            .unwrap_or_default();

        let peak_bytes = samples.into_iter().max().unwrap_or(0);
        Performance {
            duration_seconds: self.started_at.elapsed().as_secs(),
            memory_mb: peak_bytes as f64 / 1_000_000.0,
        }
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stop_reports_the_peak_sampled_value() {
        let counter = Arc::new(AtomicUsize::new(0));
        let sampler_counter = Arc::clone(&counter);

        let monitor = PerformanceMonitor::start(move || {
            sampler_counter.fetch_add(1_000_000, Ordering::Relaxed);
            sampler_counter.load(Ordering::Relaxed)
        });

        std::thread::sleep(PERF_SAMPLE_INTERVAL * 3);
        let perf = monitor.stop();

        assert!(perf.memory_mb > 0.0);
    }
}
