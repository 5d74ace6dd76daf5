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

//! Chunk-shape math (§3, §4.3): `init_time=1, step=1, variable=1, <spatial>/4`
//! by default, with per-dimension divisor overrides from C3.

use crate::constants::DEFAULT_SPATIAL_CHUNK_DIVISOR;
use crate::coords::Coords;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn chunk_size_for(len: usize, divisor: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let divisor = divisor.max(1);
    (len + divisor - 1) / divisor
}

fn is_spatial_dim(dim: &str) -> bool {
    matches!(dim, "latitude" | "longitude" | "y" | "x")
}

/// One dimension's contribution to the chunking plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimChunking {
    pub dim: String,
    pub len: usize,
    pub chunk_size: usize,
}

impl DimChunking {
    pub fn chunk_count(&self) -> usize {
        if self.chunk_size == 0 {
            0
        } else {
            (self.len + self.chunk_size - 1) / self.chunk_size
        }
    }
}

/// The chunking plan for one coordinate map: dimension order mirrors
/// [`Coords::dims`], and the chunk is the atomic write unit a
/// [`crate::store::TensorStore`] guarantees at-most-one-writer for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub dims: Vec<DimChunking>,
}

impl ChunkPlan {
    /// Builds the default plan (`init_time=1, step=1, variable=1,
    /// <spatial>/DEFAULT_SPATIAL_CHUNK_DIVISOR`), then applies `overrides`
    /// (a divisor per dimension name) from the repository's
    /// `chunk_count_overrides`.
    pub fn new(coords: &Coords, overrides: &HashMap<String, usize>) -> ChunkPlan {
        let shape = coords.shape();
        let dims = coords
            .dims()
            .into_iter()
            .map(|dim| {
                let len = shape[dim];
                let default_divisor = if is_spatial_dim(dim) {
                    DEFAULT_SPATIAL_CHUNK_DIVISOR
                } else {
                    1
                };
                let divisor = overrides.get(dim).copied().unwrap_or(default_divisor);
                DimChunking {
                    dim: dim.to_string(),
                    len,
                    chunk_size: chunk_size_for(len, divisor),
                }
            })
            .collect();
        ChunkPlan { dims }
    }

    pub fn total_chunks(&self) -> usize {
        self.dims.iter().map(DimChunking::chunk_count).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordIndexes;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn grid() -> Coords {
        Coords::from_indexes(CoordIndexes {
            init_time: vec![dt(0)],
            step: (0..3).collect(),
            variable: vec!["t2m".to_string(), "dswrf".to_string()],
            ensemble_stat: None,
            ensemble_member: None,
            latitude: Some(vec![60.0, 59.5, 59.0, 58.5, 58.0, 57.5, 57.0, 56.5]),
            longitude: Some(vec![0.0, 0.5, 1.0, 1.5]),
            y: None,
            x: None,
            projection: None,
            number: None,
        })
        .unwrap()
    }

    #[test]
    fn default_plan_chunks_non_spatial_dims_by_one() {
        let plan = ChunkPlan::new(&grid(), &HashMap::new());
        let by_dim: HashMap<_, _> = plan.dims.iter().map(|d| (d.dim.as_str(), d)).collect();
        assert_eq!(by_dim["init_time"].chunk_size, 1);
        assert_eq!(by_dim["step"].chunk_size, 1);
        assert_eq!(by_dim["variable"].chunk_size, 1);
    }

    #[test]
    fn default_plan_splits_spatial_dims_by_divisor() {
        let plan = ChunkPlan::new(&grid(), &HashMap::new());
        let by_dim: HashMap<_, _> = plan.dims.iter().map(|d| (d.dim.as_str(), d)).collect();
        // 8 latitudes / 4 => chunk_size 2, 4 chunks
        assert_eq!(by_dim["latitude"].chunk_size, 2);
        assert_eq!(by_dim["latitude"].chunk_count(), 4);
    }

    #[test]
    fn overrides_replace_the_default_divisor() {
        let mut overrides = HashMap::new();
        overrides.insert("latitude".to_string(), 8usize);
        let plan = ChunkPlan::new(&grid(), &overrides);
        let by_dim: HashMap<_, _> = plan.dims.iter().map(|d| (d.dim.as_str(), d)).collect();
        assert_eq!(by_dim["latitude"].chunk_size, 1);
        assert_eq!(by_dim["latitude"].chunk_count(), 8);
    }
}
