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

//! Coordinate map describing the shape of one init-time's tensor (C2).
//!
//! A [`Coords`] is deliberately a struct of typed fields in a fixed order,
//! not a generic string-keyed map: heterogeneous dimension vectors
//! (datetimes, integers, parameters, floats, labels) are awkward to handle
//! uniformly, and a fixed struct lets the compiler enforce which dimensions
//! are required. [`Coords::axes`] re-exposes the fields as `(label, vector)`
//! pairs for the algebra in [`region`] and [`crop`], which does need to walk
//! dimensions generically.

pub mod crop;
pub mod region;

use crate::errors::CoordsError;
use crate::registry::{self, Parameter};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Either of the two spatial grid conventions providers use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Spatial {
    /// Regular latitude/longitude grid, degrees.
    LatLon {
        latitude: Vec<f64>,
        longitude: Vec<f64>,
    },
    /// Projected grid, meters in `projection`.
    ProjectedYX {
        y: Vec<f64>,
        x: Vec<f64>,
        projection: String,
    },
}

/// Plain-data transfer shape for handing coordinates to/from a decoder or
/// storage layer. `variable` carries raw provider-facing names; [`from_indexes`]
/// resolves them through the registry, [`to_indexes`] un-resolves them back
/// to canonical names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordIndexes {
    pub init_time: Vec<NaiveDateTime>,
    pub step: Vec<u32>,
    pub variable: Vec<String>,
    pub ensemble_stat: Option<Vec<String>>,
    pub ensemble_member: Option<Vec<i64>>,
    pub latitude: Option<Vec<f64>>,
    pub longitude: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub x: Option<Vec<f64>>,
    pub projection: Option<String>,
    /// Alternate spelling some providers (e.g. ECMWF's realtime feed) use for
    /// `ensemble_member`. Resolved the same way a variable alias is: if
    /// `ensemble_member` itself is absent and `number` is present, `number`
    /// is treated as `ensemble_member`.
    pub number: Option<Vec<i64>>,
}

/// A read-only view of one dimension's coordinate vector, for generic
/// traversal (region algebra, cropping).
#[derive(Debug, Clone, Copy)]
pub enum DimAxis<'a> {
    Times(&'a [NaiveDateTime]),
    Steps(&'a [u32]),
    Variables(&'a [Parameter]),
    Ints(&'a [i64]),
    Floats(&'a [f64]),
    Labels(&'a [String]),
}

impl<'a> DimAxis<'a> {
    pub fn len(&self) -> usize {
        match self {
            DimAxis::Times(v) => v.len(),
            DimAxis::Steps(v) => v.len(),
            DimAxis::Variables(v) => v.len(),
            DimAxis::Ints(v) => v.len(),
            DimAxis::Floats(v) => v.len(),
            DimAxis::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One init-time's tensor shape: the ordered dimensions required by every
/// store (§3), plus whichever optional dimensions the provider uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub init_time: Vec<NaiveDateTime>,
    pub step: Vec<u32>,
    pub variable: Vec<Parameter>,
    pub ensemble_stat: Option<Vec<String>>,
    pub ensemble_member: Option<Vec<i64>>,
    pub spatial: Spatial,
}

fn is_strictly_monotonic<T: PartialOrd>(values: &[T]) -> bool {
    if values.len() < 2 {
        return true;
    }
    let ascending = values.windows(2).all(|w| w[0] < w[1]);
    let descending = values.windows(2).all(|w| w[0] > w[1]);
    ascending || descending
}

impl Coords {
    /// Ordered dimension labels, per §3/§4.2 `dims()`.
    pub fn dims(&self) -> Vec<&'static str> {
        let mut d = vec!["init_time", "step", "variable"];
        if self.ensemble_stat.is_some() {
            d.push("ensemble_stat");
        }
        if self.ensemble_member.is_some() {
            d.push("ensemble_member");
        }
        match &self.spatial {
            Spatial::LatLon { .. } => {
                d.push("latitude");
                d.push("longitude");
            }
            Spatial::ProjectedYX { .. } => {
                d.push("y");
                d.push("x");
            }
        }
        d
    }

    /// Length of each dimension vector, in `dims()` order.
    pub fn shape(&self) -> HashMap<String, usize> {
        self.axes()
            .into_iter()
            .map(|(label, axis)| (label.to_string(), axis.len()))
            .collect()
    }

    /// `(label, vector)` view of every dimension, in fixed order.
    pub fn axes(&self) -> Vec<(&'static str, DimAxis<'_>)> {
        let mut out = vec![
            ("init_time", DimAxis::Times(&self.init_time)),
            ("step", DimAxis::Steps(&self.step)),
            ("variable", DimAxis::Variables(&self.variable)),
        ];
        if let Some(stat) = &self.ensemble_stat {
            out.push(("ensemble_stat", DimAxis::Labels(stat)));
        }
        if let Some(member) = &self.ensemble_member {
            out.push(("ensemble_member", DimAxis::Ints(member)));
        }
        match &self.spatial {
            Spatial::LatLon { latitude, longitude } => {
                out.push(("latitude", DimAxis::Floats(latitude)));
                out.push(("longitude", DimAxis::Floats(longitude)));
            }
            Spatial::ProjectedYX { y, x, .. } => {
                out.push(("y", DimAxis::Floats(y)));
                out.push(("x", DimAxis::Floats(x)));
            }
        }
        out
    }

    /// Bounding box of the current spatial dims, as `(north, west, south, east)`.
    /// Only defined for [`Spatial::LatLon`] coordinate maps.
    pub fn nwse(&self) -> Result<(f64, f64, f64, f64), CoordsError> {
        match &self.spatial {
            Spatial::LatLon { latitude, longitude } => {
                let north = latitude.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let south = latitude.iter().cloned().fold(f64::INFINITY, f64::min);
                let west = longitude.iter().cloned().fold(f64::INFINITY, f64::min);
                let east = longitude.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                Ok((north, west, south, east))
            }
            Spatial::ProjectedYX { .. } => Err(CoordsError::MissingSpatialDims),
        }
    }

    /// Validate and build a [`Coords`] from decoder-facing indexes (§4.2 `from_indexes`).
    pub fn from_indexes(mut idx: CoordIndexes) -> Result<Coords, CoordsError> {
        if idx.ensemble_member.is_none() {
            idx.ensemble_member = idx.number.take();
        }

        if !is_strictly_monotonic(&idx.step) {
            return Err(CoordsError::NotMonotonic("step"));
        }
        if !is_strictly_monotonic(&idx.init_time) {
            return Err(CoordsError::NotMonotonic("init_time"));
        }
        if let Some(member) = &idx.ensemble_member {
            if !is_strictly_monotonic(member) {
                return Err(CoordsError::NotMonotonic("ensemble_member"));
            }
        }

        let mut variable = Vec::with_capacity(idx.variable.len());
        let mut seen = std::collections::HashSet::with_capacity(idx.variable.len());
        for raw in &idx.variable {
            let param = registry::from_alternate(raw)?;
            if !seen.insert(param) {
                return Err(CoordsError::DuplicateVariable(param.name().to_string()));
            }
            variable.push(param);
        }

        let spatial = match (idx.latitude, idx.longitude, idx.y, idx.x) {
            (Some(latitude), Some(longitude), None, None) => {
                if !is_strictly_monotonic(&latitude) {
                    return Err(CoordsError::NotMonotonic("latitude"));
                }
                if !is_strictly_monotonic(&longitude) {
                    return Err(CoordsError::NotMonotonic("longitude"));
                }
                Spatial::LatLon { latitude, longitude }
            }
            (None, None, Some(y), Some(x)) => {
                if !is_strictly_monotonic(&y) {
                    return Err(CoordsError::NotMonotonic("y"));
                }
                if !is_strictly_monotonic(&x) {
                    return Err(CoordsError::NotMonotonic("x"));
                }
                let projection = idx
                    .projection
                    .ok_or(CoordsError::MissingDimension("projection"))?;
                Spatial::ProjectedYX { y, x, projection }
            }
            (Some(_), None, _, _) | (None, Some(_), _, _) => {
                return Err(CoordsError::MissingDimension("longitude"))
            }
            (_, _, Some(_), None) | (_, _, None, Some(_)) => {
                return Err(CoordsError::MissingDimension("x"))
            }
            (None, None, None, None) => return Err(CoordsError::MissingSpatialDims),
        };

        Ok(Coords {
            init_time: idx.init_time,
            step: idx.step,
            variable,
            ensemble_stat: idx.ensemble_stat,
            ensemble_member: idx.ensemble_member,
            spatial,
        })
    }

    /// Inverse of [`Coords::from_indexes`] (§4.2 `to_indexes`), used when
    /// handing coordinates to the decoder/storage layer.
    pub fn to_indexes(&self) -> CoordIndexes {
        let (latitude, longitude, y, x, projection) = match &self.spatial {
            Spatial::LatLon { latitude, longitude } => {
                (Some(latitude.clone()), Some(longitude.clone()), None, None, None)
            }
            Spatial::ProjectedYX { y, x, projection } => {
                (None, None, Some(y.clone()), Some(x.clone()), Some(projection.clone()))
            }
        };

        CoordIndexes {
            init_time: self.init_time.clone(),
            step: self.step.clone(),
            variable: self.variable.iter().map(|p| p.name().to_string()).collect(),
            ensemble_stat: self.ensemble_stat.clone(),
            ensemble_member: self.ensemble_member.clone(),
            latitude,
            longitude,
            y,
            x,
            projection,
            number: None,
        }
    }

    /// A copy of this map with `init_time` replaced, used by the consume and
    /// archive engines to specialize a model's `expected_coordinates` to one
    /// (or all of a month's) concrete init-time(s).
    pub fn with_init_times(&self, init_time: Vec<NaiveDateTime>) -> Coords {
        Coords {
            init_time,
            ..self.clone()
        }
    }
}
