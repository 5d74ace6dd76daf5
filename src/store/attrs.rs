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

//! Attributes block persisted alongside a store's tensor and coordinates
//! (§3, §4.3 `update_attrs`): creation metadata, producer, variable
//! descriptions, and the accumulated `failed_times` archive mode records.

use crate::coords::Coords;
use crate::errors::StoreError;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const ATTRS_FILENAME: &str = "attrs.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attrs {
    pub created_at: chrono::DateTime<Utc>,
    pub producer: String,
    pub variable_descriptions: HashMap<String, String>,
    /// `size_mb` from §3: monotonically increased as writes succeed.
    pub size_mb: f64,
    /// Init-times for which a write has failed; populated by the archive
    /// engine via [`crate::store::TensorStore::update_attrs`].
    pub failed_times: Vec<NaiveDateTime>,
}

impl Attrs {
    pub fn new(coords: &Coords, producer: &str) -> Attrs {
        let variable_descriptions = coords
            .variable
            .iter()
            .map(|p| (p.name().to_string(), p.data().description.to_string()))
            .collect();
        Attrs {
            created_at: Utc::now(),
            producer: producer.to_string(),
            variable_descriptions,
            size_mb: 0.0,
            failed_times: Vec::new(),
        }
    }

    pub fn load(dir: &Path) -> Result<Attrs, StoreError> {
        let bytes = std::fs::read(dir.join(ATTRS_FILENAME)).map_err(|source| StoreError::Io {
            path: dir.join(ATTRS_FILENAME),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(dir.join(ATTRS_FILENAME), bytes).map_err(|source| StoreError::Io {
            path: dir.join(ATTRS_FILENAME),
            source,
        })
    }

    /// Descending `dd HH:MM` order, as required of the archive engine's
    /// `failed_times` attribute (S3).
    pub fn failed_times_descending(&self) -> Vec<NaiveDateTime> {
        let mut times = self.failed_times.clone();
        times.sort_by(|a, b| b.cmp(a));
        times
    }
}
