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

//! Model & repository metadata (C3): the static description of a provider's
//! data product, independent of any particular fetch.

use crate::coords::crop::crop_named;
use crate::coords::{CoordIndexes, Coords};
use crate::errors::CoordsError;
use crate::store::PostprocessOptions;
use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::fmt;

/// Static description of a raw repository's data product: what it serves,
/// when a new init time becomes available, and how to talk to it.
#[derive(Debug, Clone)]
pub struct ModelRepositoryMetadata {
    pub name: String,
    /// Serves the full historical record rather than only recent init times.
    pub is_archive: bool,
    /// Data must be ordered from the provider before it can be fetched.
    pub is_order_based: bool,
    /// Hours of the day (0-23) on which a new init time is published.
    pub running_hours: Vec<u8>,
    /// Typical publication lag behind the init time itself.
    pub delay_minutes: i64,
    pub required_env: Vec<String>,
    pub optional_env: HashMap<String, String>,
    pub max_connections: usize,
    pub expected_coordinates: Coords,
    pub chunk_count_overrides: HashMap<String, usize>,
    pub postprocess_options: PostprocessOptions,
}

impl ModelRepositoryMetadata {
    /// The greatest init time `<= now - delay_minutes` whose hour is one of
    /// `running_hours`.
    ///
    /// Ported from `determine_latest_it_from`: truncate `now` to the hour,
    /// subtract the publication delay, then walk back an hour at a time
    /// until the result's hour is a running hour.
    pub fn latest_init_time_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        let truncated = now.date().and_hms_opt(now.hour(), 0, 0).unwrap();
        let mut it = truncated - chrono::Duration::minutes(self.delay_minutes);
        while !self.running_hours.contains(&(it.hour() as u8)) {
            it -= chrono::Duration::hours(1);
        }
        it
    }

    /// Returns a copy scoped to one of the named regions (§4.2), renaming to
    /// `<name>_<region>` and cropping `expected_coordinates` accordingly.
    pub fn with_region(&self, region: &str) -> Result<ModelRepositoryMetadata, CoordsError> {
        let cropped = crop_named(&self.expected_coordinates, region)?;
        Ok(ModelRepositoryMetadata {
            name: format!("{}_{region}", self.name),
            expected_coordinates: cropped,
            ..self.clone()
        })
    }

    /// Returns a copy with `overrides` merged into `chunk_count_overrides`.
    /// Keys naming a dimension absent from `expected_coordinates` are logged
    /// and dropped rather than rejected outright.
    pub fn with_chunk_count_overrides(
        &self,
        overrides: HashMap<String, usize>,
    ) -> ModelRepositoryMetadata {
        let known_dims = self.expected_coordinates.dims();
        let mut merged = self.chunk_count_overrides.clone();
        for (dim, divisor) in overrides {
            if known_dims.iter().any(|d| dim == *d) {
                merged.insert(dim, divisor);
            } else {
                log::warn!("ignoring chunk count override for unknown dimension {dim:?}");
            }
        }
        ModelRepositoryMetadata {
            chunk_count_overrides: merged,
            ..self.clone()
        }
    }
}

impl fmt::Display for ModelRepositoryMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (archive={}, order_based={}, running_hours={:?}, delay={}m)",
            self.name, self.is_archive, self.is_order_based, self.running_hours, self.delay_minutes
        )
    }
}

fn lat_lon(lat_count: usize, lat_step: f64, lon_count: usize, lon_step: f64) -> (Vec<f64>, Vec<f64>) {
    let lat = (0..lat_count).map(|i| 90.0 - i as f64 * lat_step).collect();
    let lon = (0..lon_count).map(|i| i as f64 * lon_step).collect();
    (lat, lon)
}

/// A handful of concrete, deterministic presets standing in for the model
/// documentation a real deployment would read grid shape and cadence from.
pub fn known_models(init_time: NaiveDateTime) -> HashMap<&'static str, ModelRepositoryMetadata> {
    let mut m = HashMap::new();

    let (lat, lon) = lat_lon(1801, 0.1, 3600, 0.1);
    let hres_coords = Coords::from_indexes(CoordIndexes {
        init_time: vec![init_time],
        step: (0..=84).collect(),
        variable: vec![
            "t2m".to_string(),
            "ssrd".to_string(),
            "strd".to_string(),
            "u10".to_string(),
            "v10".to_string(),
            "msl".to_string(),
        ],
        ensemble_stat: None,
        ensemble_member: None,
        latitude: Some(lat),
        longitude: Some(lon),
        y: None,
        x: None,
        projection: None,
        number: None,
    })
    .expect("hres preset coordinates must be valid");
    m.insert(
        "ecmwf-hres-ifs",
        ModelRepositoryMetadata {
            name: "ecmwf-hres-ifs".to_string(),
            is_archive: false,
            is_order_based: true,
            running_hours: vec![0, 6, 12, 18],
            delay_minutes: 360,
            required_env: vec![
                "CEDA_FTP_USER".to_string(),
                "CEDA_FTP_PASS".to_string(),
                "CEDA_ORDER_ID".to_string(),
            ],
            optional_env: HashMap::new(),
            max_connections: 4,
            expected_coordinates: hres_coords,
            chunk_count_overrides: HashMap::new(),
            postprocess_options: PostprocessOptions::default(),
        },
    );

    let (lat, lon) = lat_lon(181, 1.0, 360, 1.0);
    let ens_coords = Coords::from_indexes(CoordIndexes {
        init_time: vec![init_time],
        step: (0..=48).step_by(6).collect(),
        variable: vec!["t2m".to_string(), "prate".to_string()],
        ensemble_stat: Some(vec![
            "mean".to_string(),
            "std".to_string(),
            "p10".to_string(),
            "p90".to_string(),
        ]),
        ensemble_member: None,
        latitude: Some(lat),
        longitude: Some(lon),
        y: None,
        x: None,
        projection: None,
        number: None,
    })
    .expect("ensemble preset coordinates must be valid");
    m.insert(
        "ncep-gefs-ensemble",
        ModelRepositoryMetadata {
            name: "ncep-gefs-ensemble".to_string(),
            is_archive: false,
            is_order_based: false,
            running_hours: vec![0, 6, 12, 18],
            delay_minutes: 270,
            required_env: Vec::new(),
            optional_env: HashMap::new(),
            max_connections: 8,
            expected_coordinates: ens_coords,
            chunk_count_overrides: HashMap::new(),
            postprocess_options: PostprocessOptions {
                append_to_archive: Some(crate::store::ArchiveCadence::Monthly),
            },
        },
    );

    let (lat, lon) = lat_lon(181, 1.0, 360, 1.0);
    let gfs_coords = Coords::from_indexes(CoordIndexes {
        init_time: vec![init_time],
        step: (0..=384).step_by(3).collect(),
        variable: vec![
            "t2m".to_string(),
            "u10".to_string(),
            "v10".to_string(),
            "tcc".to_string(),
            "prate".to_string(),
        ],
        ensemble_stat: None,
        ensemble_member: None,
        latitude: Some(lat),
        longitude: Some(lon),
        y: None,
        x: None,
        projection: None,
        number: None,
    })
    .expect("gfs preset coordinates must be valid");
    m.insert(
        "noaa-gfs",
        ModelRepositoryMetadata {
            name: "noaa-gfs".to_string(),
            is_archive: true,
            is_order_based: false,
            running_hours: vec![0, 6, 12, 18],
            delay_minutes: 240,
            required_env: Vec::new(),
            optional_env: HashMap::new(),
            max_connections: 16,
            expected_coordinates: gfs_coords,
            chunk_count_overrides: HashMap::new(),
            postprocess_options: PostprocessOptions::default(),
        },
    );

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn meta(running_hours: Vec<u8>, delay_minutes: i64) -> ModelRepositoryMetadata {
        let coords = Coords::from_indexes(CoordIndexes {
            init_time: vec![dt(2024, 1, 1, 0, 0)],
            step: vec![0],
            variable: vec!["t2m".to_string()],
            ensemble_stat: None,
            ensemble_member: None,
            latitude: Some(vec![1.0, 0.0]),
            longitude: Some(vec![0.0, 1.0]),
            y: None,
            x: None,
            projection: None,
            number: None,
        })
        .unwrap();
        ModelRepositoryMetadata {
            name: "test".to_string(),
            is_archive: false,
            is_order_based: false,
            running_hours,
            delay_minutes,
            required_env: Vec::new(),
            optional_env: HashMap::new(),
            max_connections: 1,
            expected_coordinates: coords,
            chunk_count_overrides: HashMap::new(),
            postprocess_options: PostprocessOptions::default(),
        }
    }

    #[test]
    fn latest_init_time_steps_back_to_a_running_hour() {
        let m = meta(vec![0, 6, 12, 18], 240);
        // 14:30 - 4h delay = 10:30, truncated hour 10 not running -> step back to 06.
        let got = m.latest_init_time_at(dt(2024, 3, 5, 14, 30));
        assert_eq!(got, dt(2024, 3, 5, 6, 0));
    }

    #[test]
    fn latest_init_time_is_inclusive_of_the_boundary() {
        let m = meta(vec![0, 6, 12, 18], 60);
        // 7:00 truncated - 1h delay = 6:00, hour 6 is already running: no further stepping back.
        let got = m.latest_init_time_at(dt(2024, 3, 5, 7, 0));
        assert_eq!(got, dt(2024, 3, 5, 6, 0));
    }

    #[test]
    fn latest_init_time_crosses_a_day_boundary() {
        let m = meta(vec![18], 60);
        let got = m.latest_init_time_at(dt(2024, 3, 5, 0, 30));
        assert_eq!(got, dt(2024, 3, 4, 18, 0));
    }

    #[test]
    fn with_region_renames_and_crops() {
        let coords = Coords::from_indexes(CoordIndexes {
            init_time: vec![dt(2024, 1, 1, 0, 0)],
            step: vec![0],
            variable: vec!["t2m".to_string()],
            ensemble_stat: None,
            ensemble_member: None,
            latitude: Some(vec![80.0, 60.0, 40.0]),
            longitude: Some(vec![-10.0, 0.0, 10.0]),
            y: None,
            x: None,
            projection: None,
            number: None,
        })
        .unwrap();
        let m = ModelRepositoryMetadata {
            expected_coordinates: coords,
            ..meta(vec![0], 0)
        };
        let cropped = m.with_region("uk").unwrap();
        assert_eq!(cropped.name, "test_uk");
        assert!(
            cropped.expected_coordinates.shape()["latitude"]
                < m.expected_coordinates.shape()["latitude"]
        );
    }

    #[test]
    fn with_chunk_count_overrides_drops_unknown_dims() {
        let m = meta(vec![0], 0);
        let mut overrides = HashMap::new();
        overrides.insert("latitude".to_string(), 2usize);
        overrides.insert("not_a_dim".to_string(), 7usize);
        let updated = m.with_chunk_count_overrides(overrides);
        assert_eq!(updated.chunk_count_overrides.len(), 1);
        assert_eq!(updated.chunk_count_overrides["latitude"], 2);
    }

    #[test]
    fn known_models_builds_without_panicking() {
        let presets = known_models(dt(2024, 1, 1, 0, 0));
        assert!(presets.contains_key("ecmwf-hres-ifs"));
        assert!(presets.contains_key("ncep-gefs-ensemble"));
        assert!(presets.contains_key("noaa-gfs"));
    }
}
