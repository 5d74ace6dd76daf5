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

//! Region algebra: deriving the write-region of a fragment's coordinates
//! inside an initialized store's coordinates (§3, §4.2).

use super::{Coords, DimAxis};
use crate::errors::RegionError;
use std::collections::HashMap;
use std::ops::Range;

/// Maps each dimension label to the half-open range of indexes in `outer`
/// that `inner` occupies.
pub type Region = HashMap<String, Range<usize>>;

/// For every dimension of `inner`, checks that its coordinate values are a
/// subset of `outer`'s and occupy a contiguous run of indexes there, then
/// returns the index range per dimension.
///
/// This is the xarray `.sel()`-by-label idea, done without loading the full
/// outer coordinate vectors into a generic indexer: each dimension's
/// comparison is typed, so a mismatched variable list or an out-of-grid
/// latitude is caught before any I/O happens.
pub fn determine_region(outer: &Coords, inner: &Coords) -> Result<Region, RegionError> {
    let outer_dims = outer.dims();
    let inner_dims = inner.dims();
    if outer_dims != inner_dims {
        return Err(RegionError::MismatchedDims {
            details: format!("outer has {outer_dims:?}, inner has {inner_dims:?}"),
        });
    }

    let outer_axes = outer.axes();
    let inner_axes = inner.axes();

    let mut region = Region::with_capacity(outer_dims.len());
    for ((label, outer_axis), (_, inner_axis)) in outer_axes.iter().zip(inner_axes.iter()) {
        let range = range_for_axis(label, outer_axis, inner_axis)?;
        region.insert((*label).to_string(), range);
    }
    Ok(region)
}

fn range_for_axis(
    label: &str,
    outer: &DimAxis<'_>,
    inner: &DimAxis<'_>,
) -> Result<Range<usize>, RegionError> {
    match (outer, inner) {
        (DimAxis::Times(o), DimAxis::Times(i)) => contiguous_range(label, o, i),
        (DimAxis::Steps(o), DimAxis::Steps(i)) => contiguous_range(label, o, i),
        (DimAxis::Variables(o), DimAxis::Variables(i)) => {
            let o: Vec<&str> = o.iter().map(|p| p.name()).collect();
            let i: Vec<&str> = i.iter().map(|p| p.name()).collect();
            contiguous_range(label, &o, &i)
        }
        (DimAxis::Ints(o), DimAxis::Ints(i)) => contiguous_range(label, o, i),
        (DimAxis::Floats(o), DimAxis::Floats(i)) => contiguous_range(label, o, i),
        (DimAxis::Labels(o), DimAxis::Labels(i)) => contiguous_range(label, o, i),
        _ => Err(RegionError::MismatchedDims {
            details: format!("dimension {label} has differing types between outer and inner"),
        }),
    }
}

/// Finds the index of `inner[0]` in `outer`, then verifies every following
/// `inner` value sits at the next outer index in turn: a subset check and a
/// contiguity check folded into one scan.
fn contiguous_range<T: PartialEq + std::fmt::Debug>(
    label: &str,
    outer: &[T],
    inner: &[T],
) -> Result<Range<usize>, RegionError> {
    if inner.is_empty() {
        return Ok(0..0);
    }

    let start = outer.iter().position(|v| v == &inner[0]).ok_or_else(|| {
        RegionError::NotSubset {
            dim: label.to_string(),
            details: format!("{:?} not found in outer dimension", inner[0]),
        }
    })?;

    if start + inner.len() > outer.len() {
        return Err(RegionError::NonContiguous {
            dim: label.to_string(),
            details: "inner dimension runs past the end of outer".to_string(),
        });
    }

    for (offset, value) in inner.iter().enumerate() {
        if outer[start + offset] != *value {
            return Err(RegionError::NonContiguous {
                dim: label.to_string(),
                details: format!(
                    "value at inner index {offset} does not match outer index {}",
                    start + offset
                ),
            });
        }
    }

    Ok(start..start + inner.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Coords, CoordIndexes};
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn base(lat: Vec<f64>, lon: Vec<f64>, steps: Vec<u32>) -> Coords {
        Coords::from_indexes(CoordIndexes {
            init_time: vec![dt(0)],
            step: steps,
            variable: vec!["t2m".to_string()],
            ensemble_stat: None,
            ensemble_member: None,
            latitude: Some(lat),
            longitude: Some(lon),
            y: None,
            x: None,
            projection: None,
            number: None,
        })
        .unwrap()
    }

    /// Property 1: region correctness.
    #[test]
    fn determine_region_finds_contiguous_subset() {
        let outer = base(
            vec![60.0, 59.5, 59.0, 58.5, 58.0],
            vec![0.0, 0.5, 1.0, 1.5],
            (0..10).collect(),
        );
        let inner = base(vec![59.5, 59.0, 58.5], vec![0.0, 0.5, 1.0, 1.5], vec![3, 4]);

        let region = determine_region(&outer, &inner).unwrap();
        assert_eq!(region["latitude"], 1..4);
        assert_eq!(region["longitude"], 0..4);
        assert_eq!(region["step"], 3..5);
        assert_eq!(region["variable"], 0..1);
        assert_eq!(region["init_time"], 0..1);
    }

    /// Property 2: non-subset / non-contiguous rejection.
    #[test]
    fn determine_region_rejects_values_outside_outer() {
        let outer = base(vec![60.0, 59.5, 59.0], vec![0.0, 0.5], (0..3).collect());
        let inner = base(vec![59.5, 100.0], vec![0.0, 0.5], vec![0, 1]);

        let err = determine_region(&outer, &inner).unwrap_err();
        assert!(matches!(err, RegionError::NotSubset { .. } | RegionError::NonContiguous { .. }));
    }

    #[test]
    fn determine_region_rejects_non_contiguous_subset() {
        let outer = base(vec![60.0, 59.5, 59.0, 58.5], vec![0.0, 0.5], (0..4).collect());
        let inner = base(vec![60.0, 59.0], vec![0.0, 0.5], vec![0, 1]);

        let err = determine_region(&outer, &inner).unwrap_err();
        assert!(matches!(err, RegionError::NonContiguous { .. }));
    }

    #[test]
    fn determine_region_rejects_mismatched_dims() {
        let outer = base(vec![60.0, 59.5], vec![0.0, 0.5], vec![0, 1]);
        let inner_indexes = CoordIndexes {
            init_time: vec![dt(0)],
            step: vec![0],
            variable: vec!["t2m".to_string()],
            ensemble_stat: Some(vec!["mean".to_string()]),
            ensemble_member: None,
            latitude: Some(vec![60.0]),
            longitude: Some(vec![0.0]),
            y: None,
            x: None,
            projection: None,
            number: None,
        };
        let inner = Coords::from_indexes(inner_indexes).unwrap();
        let err = determine_region(&outer, &inner).unwrap_err();
        assert!(matches!(err, RegionError::MismatchedDims { .. }));
    }
}
