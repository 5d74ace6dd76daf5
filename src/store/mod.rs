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

//! Chunked tensor store (C4): a fixed-shape, disk-backed tensor whose shape
//! is derived entirely from a [`Coords`] map before any data lands, so every
//! write is a pure index-to-slab assignment (spec.md §4.3's "this is what
//! buys the region-parallel write property").
//!
//! This realization keeps the tensor as one flat, row-major `f64` binary
//! file (`NaN`-filled on creation) rather than adopting a full chunked
//! array format: chunk boundaries are still computed and persisted (see
//! [`chunk`]) since they define the atomic write unit callers must respect,
//! but the on-disk representation here is the simplest concrete one that
//! satisfies §3's invariants.

pub mod attrs;
pub mod chunk;

use crate::coords::region::{determine_region, Region};
use crate::coords::Coords;
use crate::constants::FILL_VALUE;
use crate::errors::StoreError;
use attrs::Attrs;
use chunk::ChunkPlan;
use chrono::NaiveDateTime;
use ndarray::{ArrayD, IxDyn};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const COORDS_FILENAME: &str = "coords.json";
const CHUNKING_FILENAME: &str = "chunking.json";
const TENSOR_FILENAME: &str = "tensor.bin";

/// How a store's `postprocess` should fold it into a longer-lived archive,
/// per spec.md §4.3 (the only postprocess option defined today).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCadence {
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Default)]
pub struct PostprocessOptions {
    pub append_to_archive: Option<ArchiveCadence>,
}

/// A `(store name, init-time(s), expected coordinates)` triple mapped to one
/// store directory, per spec.md §3.
pub struct TensorStore {
    pub path: PathBuf,
    pub coords: Coords,
    pub attrs: Attrs,
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Iterates every multi-index of an N-dimensional box, odometer-style.
struct Odometer {
    lens: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Odometer {
    fn new(lens: Vec<usize>) -> Odometer {
        let next = if lens.iter().all(|&l| l > 0) {
            Some(vec![0; lens.len()])
        } else {
            None
        };
        Odometer { lens, next }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;

        let mut candidate = current.clone();
        let mut carry_pos = candidate.len();
        loop {
            if carry_pos == 0 {
                self.next = None;
                break;
            }
            carry_pos -= 1;
            candidate[carry_pos] += 1;
            if candidate[carry_pos] < self.lens[carry_pos] {
                self.next = Some(candidate);
                break;
            }
            candidate[carry_pos] = 0;
        }

        Some(current)
    }
}

impl TensorStore {
    fn tensor_path(&self) -> PathBuf {
        self.path.join(TENSOR_FILENAME)
    }

    /// `initialize_empty(name, coords, overwrite)` (§4.3): creates the store
    /// directory, a skeleton whose chunks all hold [`FILL_VALUE`], and
    /// persists coordinates, chunking plan, and attributes.
    pub fn initialize_empty(
        storedir: &Path,
        name: &str,
        coords: Coords,
        overwrite: bool,
        chunk_overrides: &HashMap<String, usize>,
    ) -> Result<TensorStore, StoreError> {
        if coords.init_time.is_empty() {
            return Err(StoreError::EmptyInitTimes);
        }

        let suffix = if coords.init_time.len() == 1 {
            coords.init_time[0].format("%Y%m%d%H").to_string()
        } else {
            coords.init_time[0].format("%Y%m").to_string()
        };
        let dir = storedir.join(name).join(format!("{suffix}.store"));

        if dir.exists() {
            if !overwrite {
                return Err(StoreError::StoreExists(dir));
            }
            std::fs::remove_dir_all(&dir).map_err(|source| io_err(&dir, source))?;
        }
        std::fs::create_dir_all(&dir).map_err(|source| io_err(&dir, source))?;

        std::fs::write(dir.join(COORDS_FILENAME), serde_json::to_vec_pretty(&coords)?)
            .map_err(|source| io_err(&dir, source))?;

        let plan = ChunkPlan::new(&coords, chunk_overrides);
        std::fs::write(dir.join(CHUNKING_FILENAME), serde_json::to_vec_pretty(&plan)?)
            .map_err(|source| io_err(&dir, source))?;

        let total_elems: usize = coords.shape().values().product();
        let tensor_path = dir.join(TENSOR_FILENAME);
        {
            let file = File::create(&tensor_path).map_err(|source| io_err(&tensor_path, source))?;
            let mut writer = BufWriter::new(file);
            let fill_bytes = FILL_VALUE.to_le_bytes();
            for _ in 0..total_elems {
                writer
                    .write_all(&fill_bytes)
                    .map_err(|source| io_err(&tensor_path, source))?;
            }
            writer.flush().map_err(|source| io_err(&tensor_path, source))?;
        }

        let attrs = Attrs::new(&coords, "nwp-consumer");
        attrs.save(&dir)?;

        Ok(TensorStore { path: dir, coords, attrs })
    }

    /// Loads a previously-initialized store from `dir`.
    pub fn open(dir: &Path) -> Result<TensorStore, StoreError> {
        let coords_bytes =
            std::fs::read(dir.join(COORDS_FILENAME)).map_err(|source| io_err(dir, source))?;
        let coords: Coords = serde_json::from_slice(&coords_bytes)?;
        let attrs = Attrs::load(dir)?;
        Ok(TensorStore {
            path: dir.to_path_buf(),
            coords,
            attrs,
        })
    }

    /// `write_to_region(fragment, region?)` (§4.3): writes only the
    /// fragment's chunks, deriving the region via [`determine_region`] when
    /// not supplied, and returns the number of bytes written.
    pub fn write_to_region(
        &mut self,
        fragment_coords: &Coords,
        data: &ArrayD<f64>,
        region: Option<Region>,
    ) -> Result<u64, StoreError> {
        let region = match region {
            Some(r) => r,
            None => determine_region(&self.coords, fragment_coords)?,
        };

        let dims = self.coords.dims();
        let shape_map = self.coords.shape();
        let outer_shape: Vec<usize> = dims.iter().map(|d| shape_map[*d]).collect();
        let outer_strides = strides(&outer_shape);

        let region_lens: Vec<usize> = dims
            .iter()
            .map(|d| region.get(*d).map(|r| r.len()).unwrap_or(0))
            .collect();
        let region_starts: Vec<usize> = dims
            .iter()
            .map(|d| region.get(*d).map(|r| r.start).unwrap_or(0))
            .collect();
        let local_strides = strides(&region_lens);

        let standard = data.as_standard_layout();
        let local_values = standard
            .as_slice()
            .expect("fragment array must be in standard layout");

        let tensor_path = self.tensor_path();
        let mut file = OpenOptions::new()
            .write(true)
            .read(true)
            .open(&tensor_path)
            .map_err(|source| io_err(&tensor_path, source))?;

        let mut bytes_written = 0u64;
        for idx in Odometer::new(region_lens.clone()) {
            let outer_offset: usize = idx
                .iter()
                .zip(&region_starts)
                .zip(&outer_strides)
                .map(|((i, start), stride)| (i + start) * stride)
                .sum();
            let local_flat: usize = idx.iter().zip(&local_strides).map(|(i, s)| i * s).sum();

            file.seek(SeekFrom::Start((outer_offset * 8) as u64))
                .map_err(|source| io_err(&tensor_path, source))?;
            file.write_all(&local_values[local_flat].to_le_bytes())
                .map_err(|source| io_err(&tensor_path, source))?;
            bytes_written += 8;
        }

        self.attrs.size_mb += bytes_written as f64 / 1_000_000.0;
        self.attrs.save(&self.path)?;
        Ok(bytes_written)
    }

    /// `missing_times()` (§4.3): an init-time is missing iff every
    /// non-spatial... (every) chunk belonging to it is still [`FILL_VALUE`].
    /// `init_time` is always the outermost dimension (see
    /// [`Coords::dims`]), so each init-time's slab is one contiguous block.
    pub fn missing_times(&self) -> Result<Vec<NaiveDateTime>, StoreError> {
        let dims = self.coords.dims();
        let shape_map = self.coords.shape();
        let block_elems: usize = dims
            .iter()
            .filter(|d| **d != "init_time")
            .map(|d| shape_map[*d])
            .product();
        let block_bytes = block_elems * 8;

        let tensor_path = self.tensor_path();
        let mut file = File::open(&tensor_path).map_err(|source| io_err(&tensor_path, source))?;
        let mut buf = vec![0u8; block_bytes];
        let mut missing = Vec::new();

        for (idx, it) in self.coords.init_time.iter().enumerate() {
            file.seek(SeekFrom::Start((idx * block_bytes) as u64))
                .map_err(|source| io_err(&tensor_path, source))?;
            file.read_exact(&mut buf)
                .map_err(|source| io_err(&tensor_path, source))?;
            let all_fill = buf
                .chunks_exact(8)
                .all(|c| f64::from_le_bytes(c.try_into().unwrap()).is_nan());
            if all_fill {
                missing.push(*it);
            }
        }
        Ok(missing)
    }

    /// Reads the full tensor into memory, in `dims()` order.
    pub fn read_all(&self) -> Result<ArrayD<f64>, StoreError> {
        let tensor_path = self.tensor_path();
        let bytes = std::fs::read(&tensor_path).map_err(|source| io_err(&tensor_path, source))?;
        let shape: Vec<usize> = self
            .coords
            .dims()
            .iter()
            .map(|d| self.coords.shape()[*d])
            .collect();
        let values: Vec<f64> = bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| io_err(&tensor_path, std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))
    }

    /// `postprocess(options)` (§4.3): today's only option folds this store
    /// into an encompassing monthly/yearly archive store via a region-write,
    /// then deletes the source. The encompassing store is expected to exist
    /// already (created ahead of time by the archive engine); this keeps the
    /// merge itself a pure region-write rather than reimplementing archive
    /// bootstrap here.
    pub fn postprocess(
        &mut self,
        storedir: &Path,
        model_name: &str,
        options: &PostprocessOptions,
    ) -> Result<(), StoreError> {
        let Some(cadence) = options.append_to_archive else {
            return Ok(());
        };

        let it = self.coords.init_time[0];
        let suffix = match cadence {
            ArchiveCadence::Monthly => it.format("%Y%m").to_string(),
            ArchiveCadence::Yearly => it.format("%Y").to_string(),
        };
        let target_dir = storedir.join(model_name).join(format!("{suffix}.store"));
        if !target_dir.exists() {
            return Err(io_err(
                &target_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "encompassing archive store does not exist",
                ),
            ));
        }

        let mut target = TensorStore::open(&target_dir)?;
        let fragment_data = self.read_all()?;
        target.write_to_region(&self.coords, &fragment_data, None)?;

        std::fs::remove_dir_all(&self.path).map_err(|source| io_err(&self.path, source))?;
        Ok(())
    }

    /// `update_attrs(map)` (§4.3), realized as a mutator closure over the
    /// typed [`Attrs`] record rather than a generic map, then persisted.
    pub fn update_attrs(&mut self, f: impl FnOnce(&mut Attrs)) -> Result<(), StoreError> {
        f(&mut self.attrs);
        self.attrs.save(&self.path)
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

    fn small_coords(init_times: Vec<NaiveDateTime>) -> Coords {
        Coords::from_indexes(CoordIndexes {
            init_time: init_times,
            step: vec![0, 1],
            variable: vec!["t2m".to_string()],
            ensemble_stat: None,
            ensemble_member: None,
            latitude: Some(vec![60.0, 59.5]),
            longitude: Some(vec![10.0, 10.5]),
            y: None,
            x: None,
            projection: None,
            number: None,
        })
        .unwrap()
    }

    #[test]
    fn initialize_empty_creates_fill_valued_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            TensorStore::initialize_empty(dir.path(), "test-model", small_coords(vec![dt(0)]), false, &HashMap::new())
                .unwrap();

        let tensor = store.read_all().unwrap();
        assert!(tensor.iter().all(|v| v.is_nan()));
        assert_eq!(tensor.shape(), &[1, 2, 1, 2, 2]);
    }

    #[test]
    fn initialize_empty_fails_when_store_exists_and_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        TensorStore::initialize_empty(dir.path(), "test-model", small_coords(vec![dt(0)]), false, &HashMap::new())
            .unwrap();

        let err =
            TensorStore::initialize_empty(dir.path(), "test-model", small_coords(vec![dt(0)]), false, &HashMap::new())
                .unwrap_err();
        assert!(matches!(err, StoreError::StoreExists(_)));
    }

    #[test]
    fn write_to_region_updates_only_fragment_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            TensorStore::initialize_empty(dir.path(), "test-model", small_coords(vec![dt(0)]), false, &HashMap::new())
                .unwrap();

        let fragment_coords = small_coords(vec![dt(0)]);
        let data = ArrayD::from_shape_vec(
            IxDyn(&[1, 2, 1, 2, 2]),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();

        let written = store.write_to_region(&fragment_coords, &data, None).unwrap();
        assert_eq!(written, 8 * 8);

        let tensor = store.read_all().unwrap();
        assert_eq!(tensor.as_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(store.attrs.size_mb > 0.0);
    }

    /// Property 4: write commutativity.
    #[test]
    fn write_commutativity_across_orderings() {
        let run = |reversed: bool| {
            let dir = tempfile::tempdir().unwrap();
            let mut store = TensorStore::initialize_empty(
                dir.path(),
                "test-model",
                small_coords(vec![dt(0)]),
                false,
                &HashMap::new(),
            )
            .unwrap();

            let left = Coords::from_indexes(CoordIndexes {
                init_time: vec![dt(0)],
                step: vec![0],
                variable: vec!["t2m".to_string()],
                ensemble_stat: None,
                ensemble_member: None,
                latitude: Some(vec![60.0, 59.5]),
                longitude: Some(vec![10.0, 10.5]),
                y: None,
                x: None,
                projection: None,
                number: None,
            })
            .unwrap();
            let right = Coords::from_indexes(CoordIndexes {
                init_time: vec![dt(0)],
                step: vec![1],
                variable: vec!["t2m".to_string()],
                ensemble_stat: None,
                ensemble_member: None,
                latitude: Some(vec![60.0, 59.5]),
                longitude: Some(vec![10.0, 10.5]),
                y: None,
                x: None,
                projection: None,
                number: None,
            })
            .unwrap();

            let left_data = ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
            let right_data = ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 2, 2]), vec![5.0, 6.0, 7.0, 8.0]).unwrap();

            let writes: Vec<(&Coords, &ArrayD<f64>)> = if reversed {
                vec![(&right, &right_data), (&left, &left_data)]
            } else {
                vec![(&left, &left_data), (&right, &right_data)]
            };

            for (coords, data) in writes {
                store.write_to_region(coords, data, None).unwrap();
            }
            store.read_all().unwrap()
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn missing_times_reports_untouched_init_times() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TensorStore::initialize_empty(
            dir.path(),
            "test-model",
            small_coords(vec![dt(0), dt(6)]),
            false,
            &HashMap::new(),
        )
        .unwrap();

        let fragment_coords = small_coords(vec![dt(0)]);
        let data = ArrayD::from_shape_vec(IxDyn(&[1, 2, 1, 2, 2]), vec![1.0; 8]).unwrap();
        store.write_to_region(&fragment_coords, &data, None).unwrap();

        let missing = store.missing_times().unwrap();
        assert_eq!(missing, vec![dt(6)]);
    }

    #[test]
    fn update_attrs_persists_failed_times() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            TensorStore::initialize_empty(dir.path(), "test-model", small_coords(vec![dt(0)]), false, &HashMap::new())
                .unwrap();

        store.update_attrs(|a| a.failed_times.push(dt(0))).unwrap();

        let reopened = TensorStore::open(&store.path).unwrap();
        assert_eq!(reopened.attrs.failed_times, vec![dt(0)]);
    }
}
