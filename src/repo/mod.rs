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

//! Raw repository port (C5): the provider-agnostic contract every adaptor
//! implements, plus the shared fetch/cache plumbing the reference adaptors
//! in [`providers`] build on.

pub mod metadata;
pub mod providers;

use crate::coords::{Coords, Spatial};
use crate::errors::{AuthError, JobError};
use crate::registry::Parameter;
use chrono::NaiveDateTime;
use ndarray::ArrayD;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A decoded piece of forecast data: its coordinate map is a strict subset
/// of the store's outer map along every dimension (spec.md §3).
#[derive(Debug, Clone)]
pub struct Fragment {
    pub coords: Coords,
    pub data: ArrayD<f64>,
}

/// A deferred fetch/decode/normalize computation (spec.md §4.4, §9): building
/// the sequence of jobs for an init-time must not itself perform I/O, only
/// `run` may.
pub struct Job {
    label: String,
    thunk: Box<dyn FnOnce() -> Result<Vec<Fragment>, JobError> + Send>,
}

impl Job {
    pub fn new(
        label: impl Into<String>,
        thunk: impl FnOnce() -> Result<Vec<Fragment>, JobError> + Send + 'static,
    ) -> Job {
        Job {
            label: label.into(),
            thunk: Box::new(thunk),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self) -> Result<Vec<Fragment>, JobError> {
        (self.thunk)()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Provider-agnostic contract (spec.md §4.4): `authenticate -> list fetch
/// jobs for an init-time -> each job lazily downloads & decodes into
/// fragments`.
///
/// `repository()`/`model()` of the distilled spec are both satisfied by
/// `metadata()`, since this crate folds the two C3 descriptors (provider-level
/// and model-level) into one [`metadata::ModelRepositoryMetadata`] record.
pub trait RawRepository: Send + Sync {
    fn metadata(&self) -> &metadata::ModelRepositoryMetadata;

    /// Verifies configuration (required env vars present, credentials
    /// acceptable where cheaply checkable). Idempotent.
    fn authenticate(&self) -> Result<(), AuthError>;

    /// Lazily builds the job sequence for one init-time. Must not perform
    /// network I/O itself; each returned [`Job`] performs one fetch + decode
    /// + normalize when run.
    fn fetch_init_data(&self, it: NaiveDateTime) -> Vec<Job>;
}

/// Checks `required_env` is fully set in the process environment, per
/// `authenticate()`'s `ConfigError`/`AuthError` contract (spec.md §4.4, §7).
pub fn check_required_env(required: &[String]) -> Result<(), AuthError> {
    for key in required {
        if std::env::var(key).is_err() {
            return Err(AuthError::MissingEnv(key.clone()));
        }
    }
    Ok(())
}

/// `$RAWDIR/<repo-name>/<model-name>/raw/<basename>` (spec.md §6).
pub fn cache_path(rawdir: &Path, repo_name: &str, model_name: &str, basename: &str) -> PathBuf {
    rawdir.join(repo_name).join(model_name).join("raw").join(basename)
}

/// Downloads `url` to `dest` unless `dest` already exists with a non-zero
/// size matching the remote `Content-Length` (spec.md §4.4 step 2). Writes
/// atomically via a `.part` sibling, retrying on `5xx`/connection errors per
/// [`crate::constants::RETRY_BACKOFF`] (spec.md §5). `4xx` responses and
/// decode errors are never retried.
pub fn download_if_needed(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> Result<(), JobError> {
    if let Ok(existing) = std::fs::metadata(dest) {
        if existing.len() > 0 {
            if let Ok(remote_len) = remote_content_length(client, url) {
                if remote_len == existing.len() {
                    log::debug!("cache hit for {url}, skipping download");
                    return Ok(());
                }
            }
        }
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| JobError::Network {
            url: url.to_string(),
            message: e.to_string(),
            transient: false,
        })?;
    }

    let part_path = dest.with_extension("part");
    let mut attempt = 0usize;
    loop {
        match fetch_to_file(client, url, &part_path) {
            Ok(()) => {
                std::fs::rename(&part_path, dest).map_err(|e| JobError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                    transient: false,
                })?;
                return Ok(());
            }
            Err(err) if err.transient && attempt < crate::constants::RETRY_BACKOFF.len() => {
                log::warn!("transient fetch error for {url}, retrying: {}", err.message);
                std::thread::sleep(crate::constants::RETRY_BACKOFF[attempt]);
                attempt += 1;
            }
            Err(err) => return Err(JobError::Network { url: err.url, message: err.message, transient: err.transient }),
        }
    }
}

struct TransientError {
    url: String,
    message: String,
    transient: bool,
}

fn fetch_to_file(client: &reqwest::blocking::Client, url: &str, dest: &Path) -> Result<(), TransientError> {
    let response = client.get(url).send().map_err(|e| TransientError {
        url: url.to_string(),
        message: e.to_string(),
        transient: e.is_timeout() || e.is_connect(),
    })?;

    let status = response.status();
    if status.is_server_error() {
        return Err(TransientError {
            url: url.to_string(),
            message: format!("server error: {status}"),
            transient: true,
        });
    }
    if !status.is_success() {
        return Err(TransientError {
            url: url.to_string(),
            message: format!("unexpected status: {status}"),
            transient: false,
        });
    }

    let bytes = response.bytes().map_err(|e| TransientError {
        url: url.to_string(),
        message: e.to_string(),
        transient: true,
    })?;
    std::fs::write(dest, &bytes).map_err(|e| TransientError {
        url: url.to_string(),
        message: e.to_string(),
        transient: false,
    })?;
    Ok(())
}

fn remote_content_length(client: &reqwest::blocking::Client, url: &str) -> Result<u64, JobError> {
    let response = client.head(url).send().map_err(|e| JobError::Network {
        url: url.to_string(),
        message: e.to_string(),
        transient: e.is_timeout() || e.is_connect(),
    })?;
    response
        .content_length()
        .ok_or_else(|| JobError::Network {
            url: url.to_string(),
            message: "no Content-Length header".to_string(),
            transient: false,
        })
}

/// Builds the coordinate map for a single `(init_time, step, parameter)`
/// fragment over the full spatial grid `expected` describes, per spec.md
/// §4.4 step 5 (the fragment's coordinates must be a subset of
/// `expected_coordinates` along every dimension present).
pub fn fragment_coords(expected: &Coords, it: NaiveDateTime, step: u32, param: Parameter) -> Coords {
    Coords {
        init_time: vec![it],
        step: vec![step],
        variable: vec![param],
        ensemble_stat: expected.ensemble_stat.clone(),
        ensemble_member: expected.ensemble_member.clone(),
        spatial: match &expected.spatial {
            Spatial::LatLon { latitude, longitude } => Spatial::LatLon {
                latitude: latitude.clone(),
                longitude: longitude.clone(),
            },
            Spatial::ProjectedYX { y, x, projection } => Spatial::ProjectedYX {
                y: y.clone(),
                x: x.clone(),
                projection: projection.clone(),
            },
        },
    }
}

/// Builds a `reqwest` client honoring [`crate::constants::DEFAULT_CONNECT_TIMEOUT`].
pub fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(
            crate::constants::DEFAULT_CONNECT_TIMEOUT.as_secs(),
        ))
        .build()
        .expect("building the shared HTTP client must not fail")
}
