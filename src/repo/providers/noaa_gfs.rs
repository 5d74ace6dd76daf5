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

//! NOAA GFS on AWS Open Data (public HTTPS, no auth beyond optional region
//! config): one job per forecast step, each yielding one fragment per
//! variable present in that step's file.

use super::Decoder;
use crate::errors::{AuthError, JobError};
use crate::registry;
use crate::repo::metadata::{known_models, ModelRepositoryMetadata};
use crate::repo::{cache_path, download_if_needed, fragment_coords, http_client, Fragment, Job, RawRepository};
use chrono::NaiveDateTime;
use std::path::PathBuf;

const REPO_NAME: &str = "noaa-gfs";

/// Model keys this adaptor can serve, selected by the `MODEL` environment
/// variable (spec.md §6).
pub fn available_models(init_time: NaiveDateTime) -> std::collections::HashMap<&'static str, ModelRepositoryMetadata> {
    let mut all = known_models(init_time);
    all.retain(|k, _| *k == "noaa-gfs");
    all
}

pub struct NoaaGfs {
    rawdir: PathBuf,
    metadata: ModelRepositoryMetadata,
    decode: Decoder,
}

impl NoaaGfs {
    pub fn new(rawdir: PathBuf, metadata: ModelRepositoryMetadata, decode: Decoder) -> NoaaGfs {
        NoaaGfs { rawdir, metadata, decode }
    }

    fn object_url(&self, it: NaiveDateTime, step: u32) -> String {
        format!(
            "https://noaa-gfs-bdp-pds.s3.amazonaws.com/gfs.{date}/{hour:02}/atmos/gfs.t{hour:02}z.pgrb2.1p00.f{step:03}",
            date = it.format("%Y%m%d"),
            hour = it.format("%H").to_string().parse::<u32>().unwrap_or(0),
            step = step,
        )
    }
}

impl RawRepository for NoaaGfs {
    fn metadata(&self) -> &ModelRepositoryMetadata {
        &self.metadata
    }

    fn authenticate(&self) -> Result<(), AuthError> {
        crate::repo::check_required_env(&self.metadata.required_env)
    }

    fn fetch_init_data(&self, it: NaiveDateTime) -> Vec<Job> {
        let steps = self.metadata.expected_coordinates.step.clone();
        let allowed = self.metadata.expected_coordinates.variable.clone();
        let expected = self.metadata.expected_coordinates.clone();
        let rawdir = self.rawdir.clone();
        let model_name = self.metadata.name.clone();
        let decode = self.decode.clone();

        steps
            .into_iter()
            .map(|step| {
                let url = self.object_url(it, step);
                let allowed = allowed.clone();
                let expected = expected.clone();
                let rawdir = rawdir.clone();
                let model_name = model_name.clone();
                let decode = decode.clone();
                let label = format!("{REPO_NAME}/{model_name} it={it} step={step}");

                Job::new(label, move || {
                    let basename = format!("{}.grib2", url.rsplit('/').next().unwrap_or("unknown"));
                    let dest = cache_path(&rawdir, REPO_NAME, &model_name, &basename);

                    let client = http_client();
                    download_if_needed(&client, &url, &dest)?;

                    let decoded = (decode)(&dest).map_err(|e| JobError::Decode(e.to_string()))?;
                    let renamed = registry::rename_else_drop(decoded, &allowed);

                    let mut fragments = Vec::with_capacity(renamed.len());
                    for (name, data) in renamed {
                        let param = registry::canonical(&name)
                            .expect("rename_else_drop only yields canonical names");
                        fragments.push(Fragment {
                            coords: fragment_coords(&expected, it, step, param),
                            data,
                        });
                    }
                    Ok(fragments)
                })
            })
            .collect()
    }
}
