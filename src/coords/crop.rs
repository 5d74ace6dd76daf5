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

//! Cropping a lat/lon coordinate map to a bounding box (§3, §4.2 `crop`).
//!
//! Only defined for [`Spatial::LatLon`] coordinate maps; projected grids
//! have no notion of a `(north, west, south, east)` box without a
//! projection-specific reprojection step, which is out of scope here.

use super::{Coords, Spatial};
use crate::errors::CoordsError;

/// Restricts `coords` to the lat/lon box `[south, north] x` the
/// (possibly wrapping) longitude range `[west, east]`.
///
/// When `west > east` the box is taken to wrap across the antimeridian,
/// i.e. it covers `[west, 180] u [-180, east]`.
pub fn crop(
    coords: &Coords,
    north: f64,
    west: f64,
    south: f64,
    east: f64,
) -> Result<Coords, CoordsError> {
    let Spatial::LatLon { latitude, longitude } = &coords.spatial else {
        return Err(CoordsError::MissingSpatialDims);
    };

    let cropped_lat: Vec<f64> = latitude
        .iter()
        .cloned()
        .filter(|lat| *lat >= south && *lat <= north)
        .collect();
    if cropped_lat.is_empty() {
        return Err(CoordsError::EmptyCrop("latitude"));
    }

    let wraps = west > east;
    let cropped_lon: Vec<f64> = longitude
        .iter()
        .cloned()
        .filter(|lon| {
            if wraps {
                *lon >= west || *lon <= east
            } else {
                *lon >= west && *lon <= east
            }
        })
        .collect();
    if cropped_lon.is_empty() {
        return Err(CoordsError::EmptyCrop("longitude"));
    }

    Ok(Coords {
        spatial: Spatial::LatLon {
            latitude: cropped_lat,
            longitude: cropped_lon,
        },
        ..coords.clone()
    })
}

/// Named regional crops used by provider adaptors that only need a subset
/// of a model's global grid (`with_region` equivalents for the UK and the
/// Indian subcontinent).
pub fn crop_named(coords: &Coords, region: &str) -> Result<Coords, CoordsError> {
    match region {
        "uk" => crop(coords, 62.0, -12.0, 48.0, 3.0),
        "india" => crop(coords, 35.0, 67.0, 6.0, 97.0),
        other => Err(CoordsError::UnknownRegion(other.to_string())),
    }
}
