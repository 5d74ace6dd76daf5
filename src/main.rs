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

//! Numerical weather prediction consumer: pulls multi-parameter forecast
//! data for an init-time from a selected remote provider, decodes it, and
//! writes the result as a single chunked tensor archive that can be
//! regionally updated in parallel.
//!
//! **Binary decoders (GRIB2/etc.) are not part of this core** (see
//! [`repo::providers::Decoder`]); [`stub_decoder`] is a placeholder that
//! fails clearly until a real one is wired in.

mod cli;
mod config;
mod constants;
mod coords;
mod engine;
mod errors;
mod notify;
mod perf;
mod registry;
mod repo;
mod store;

#[cfg(test)]
mod super_tests;

use cap::Cap;
use clap::Parser;
use env_logger::Env;
use repo::providers::Decoder;
use std::alloc;
use std::collections::HashMap;
use std::path::Path;

/// Global allocator, used both to cap process memory and, via
/// [`cap_sampler`], as the source the background performance monitor reads
/// from.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// A [`Decoder`] that always fails. Ships so the binary is runnable end to
/// end against the fetch/cache/region-write machinery; a real deployment
/// links in a GRIB2 (or provider-specific) decoder in its place.
fn stub_decoder() -> Decoder {
    std::sync::Arc::new(|path: &Path| -> Result<HashMap<String, ndarray::ArrayD<f64>>, String> {
        Err(format!(
            "no binary decoder configured; cannot decode {}",
            path.display()
        ))
    })
}

/// Samples current bytes allocated via the global allocator, for
/// [`perf::PerformanceMonitor`].
fn cap_sampler() -> impl Fn() -> usize + Send + 'static {
    || ALLOCATOR.allocated()
}

fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("NWPC_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("NWPC_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let cli = cli::Cli::parse();
    std::process::exit(cli::run(cli));
}
