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

//! Constants shared across the consumer.

use std::time::Duration;

/// Default number of chunks per non-unit dimension, per spec.md §3
/// ("step=1, variable=1, <spatial>/4 by default").
pub const DEFAULT_SPATIAL_CHUNK_DIVISOR: usize = 4;

/// Default connect timeout for provider network calls (spec.md §5).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Capped exponential backoff schedule for transient transport errors
/// (spec.md §5: 3 attempts, 1s/4s/16s).
pub const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(4),
    Duration::from_secs(16),
];

/// Sampling interval for the background performance monitor.
pub const PERF_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Fill value chunks are initialized with; `write_to_region` only clears
/// this where actual fragment data lands, so `missing_times` can treat an
/// init-time whose chunks are all still this value as unwritten.
pub const FILL_VALUE: f64 = f64::NAN;
