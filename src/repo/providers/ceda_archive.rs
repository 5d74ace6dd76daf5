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

//! CEDA/Met-Office-shaped order-based archive adaptor. Data must be ordered
//! from the provider ahead of time (`is_order_based = true`); the adaptor
//! downloads pre-placed order files over HTTP with FTP-style credentials
//! rather than speaking raw FTP, keeping it within the corpus's HTTP client
//! idiom while preserving the order-based contract shape.

use super::Decoder;
use crate::errors::{AuthError, JobError};
use crate::registry;
use crate::repo::metadata::{known_models, ModelRepositoryMetadata};
use crate::repo::{cache_path, fragment_coords, http_client, Fragment, Job, RawRepository};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::time::Duration;

const REPO_NAME: &str = "ceda-archive";

pub fn available_models(init_time: NaiveDateTime) -> std::collections::HashMap<&'static str, ModelRepositoryMetadata> {
    let mut all = known_models(init_time);
    all.retain(|k, _| *k == "ecmwf-hres-ifs");
    all
}

pub struct CedaArchive {
    rawdir: PathBuf,
    metadata: ModelRepositoryMetadata,
    decode: Decoder,
}

impl CedaArchive {
    pub fn new(rawdir: PathBuf, metadata: ModelRepositoryMetadata, decode: Decoder) -> CedaArchive {
        CedaArchive { rawdir, metadata, decode }
    }

    fn order_id(&self) -> Result<String, AuthError> {
        std::env::var("CEDA_ORDER_ID").map_err(|_| AuthError::MissingEnv("CEDA_ORDER_ID".to_string()))
    }

    fn order_url(&self, order_id: &str, it: NaiveDateTime, step: u32) -> String {
        format!(
            "https://dap.ceda.ac.uk/badc/ecmwf-hres-ifs/data/orders/{order_id}/{it}/step{step:03}.grib",
            order_id = order_id,
            it = it.format("%Y%m%d%H"),
            step = step,
        )
    }
}

impl RawRepository for CedaArchive {
    fn metadata(&self) -> &ModelRepositoryMetadata {
        &self.metadata
    }

    fn authenticate(&self) -> Result<(), AuthError> {
        crate::repo::check_required_env(&self.metadata.required_env)?;
        self.order_id()?;
        Ok(())
    }

    fn fetch_init_data(&self, it: NaiveDateTime) -> Vec<Job> {
        let order_id = match self.order_id() {
            Ok(id) => id,
            Err(_) => return Vec::new(),
        };

        let steps = self.metadata.expected_coordinates.step.clone();
        let allowed = self.metadata.expected_coordinates.variable.clone();
        let expected = self.metadata.expected_coordinates.clone();
        let rawdir = self.rawdir.clone();
        let model_name = self.metadata.name.clone();
        let decode = self.decode.clone();

        steps
            .into_iter()
            .map(|step| {
                let url = self.order_url(&order_id, it, step);
                let allowed = allowed.clone();
                let expected = expected.clone();
                let rawdir = rawdir.clone();
                let model_name = model_name.clone();
                let decode = decode.clone();
                let label = format!("{REPO_NAME}/{model_name} it={it} step={step}");

                Job::new(label, move || {
                    let basename = format!("{model_name}-it{it}-step{step:03}.grib", it = it.format("%Y%m%dT%H"));
                    let dest = cache_path(&rawdir, REPO_NAME, &model_name, &basename);

                    CedaArchiveDownloader.download(&url, &dest)?;

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

/// Free-standing credential lookup so a job's closure doesn't need to
/// capture `&CedaArchive` (jobs must be `'static` to cross the worker pool).
struct CedaArchiveDownloader;

impl CedaArchiveDownloader {
    fn download(&self, url: &str, dest: &std::path::Path) -> Result<(), JobError> {
        if let Ok(existing) = std::fs::metadata(dest) {
            if existing.len() > 0 {
                log::debug!("cache hit for {url}, skipping download");
                return Ok(());
            }
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JobError::Network {
                url: url.to_string(),
                message: e.to_string(),
                transient: false,
            })?;
        }

        let user = std::env::var("CEDA_FTP_USER").unwrap_or_default();
        let pass = std::env::var("CEDA_FTP_PASS").ok();
        let client = http_client();

        let mut attempt = 0usize;
        loop {
            let response = client
                .get(url)
                .basic_auth(&user, pass.as_ref())
                .timeout(Duration::from_secs(60))
                .send();

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let bytes = resp.bytes().map_err(|e| JobError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                        transient: true,
                    })?;
                    let part = dest.with_extension("part");
                    std::fs::write(&part, &bytes).map_err(|e| JobError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                        transient: false,
                    })?;
                    std::fs::rename(&part, dest).map_err(|e| JobError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                        transient: false,
                    })?;
                    return Ok(());
                }
                Ok(resp) if resp.status().is_server_error() && attempt < crate::constants::RETRY_BACKOFF.len() => {
                    std::thread::sleep(crate::constants::RETRY_BACKOFF[attempt]);
                    attempt += 1;
                }
                Ok(resp) => {
                    return Err(JobError::Network {
                        url: url.to_string(),
                        message: format!("unexpected status: {}", resp.status()),
                        transient: false,
                    })
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < crate::constants::RETRY_BACKOFF.len() => {
                    std::thread::sleep(crate::constants::RETRY_BACKOFF[attempt]);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(JobError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                        transient: e.is_timeout() || e.is_connect(),
                    })
                }
            }
        }
    }
}
