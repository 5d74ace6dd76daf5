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

//! Reference [`crate::repo::RawRepository`] adaptors (C5).

pub mod ceda_archive;
pub mod noaa_gfs;

use ndarray::ArrayD;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// The binary decoder is an opaque, injected capability (spec.md §1's
/// "treated as an opaque `decode(path) -> list<Fragment>` capability"):
/// adaptors depend on one of these rather than embedding a GRIB2 parser.
/// Errors are plain messages since decoding itself is out of scope; the
/// caller wraps them as `JobError::Decode`.
pub type Decoder = Arc<dyn Fn(&Path) -> Result<HashMap<String, ArrayD<f64>>, String> + Send + Sync>;
