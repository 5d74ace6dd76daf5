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

//! Process configuration (spec.md §6): providers are selected and
//! configured entirely from environment variables at process start, so this
//! module reads `RAWDIR`/`STOREDIR`/`MODEL` and resolves `MODEL` against the
//! reference adaptors' `available_models` tables. Validation keeps the same
//! `check_bounds` shape other config structs in this codebase use, applied
//! to an env-sourced struct rather than a deserialized file.

use crate::errors::ConfigError;
use crate::repo::metadata::ModelRepositoryMetadata;
use crate::repo::providers::{ceda_archive, noaa_gfs, Decoder};
use crate::repo::RawRepository;
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// The three global environment variables spec.md §6 defines; per-provider
/// `required_env`/`optional_env` are validated by each adaptor's own
/// `authenticate()`, not here.
#[derive(Debug, Clone)]
pub struct Config {
    pub rawdir: PathBuf,
    pub storedir: PathBuf,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let config = Config {
            rawdir: PathBuf::from(env_or_default("RAWDIR", "./raw")),
            storedir: PathBuf::from(env_or_default("STOREDIR", "./store")),
            model: env_or_default("MODEL", "default"),
        };
        config.check_bounds()?;
        Ok(config)
    }

    fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidEnv {
                name: "MODEL".to_string(),
                value: self.model.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// All model keys known across the reference adaptors, merged for `info
/// --model` and for resolving `MODEL` (spec.md §6).
pub fn available_models(init_time: NaiveDateTime) -> std::collections::HashMap<&'static str, ModelRepositoryMetadata> {
    let mut all = noaa_gfs::available_models(init_time);
    all.extend(ceda_archive::available_models(init_time));
    all
}

/// Resolves `config.model` ("default" picks NOAA GFS, a public no-auth
/// source) against the merged model table and builds the matching adaptor.
pub fn build_repository(
    config: &Config,
    init_time: NaiveDateTime,
    decode: Decoder,
) -> Result<Box<dyn RawRepository>, ConfigError> {
    let resolved = if config.model == "default" { "noaa-gfs" } else { config.model.as_str() };

    let noaa = noaa_gfs::available_models(init_time);
    if let Some(metadata) = noaa.get(resolved) {
        return Ok(Box::new(noaa_gfs::NoaaGfs::new(config.rawdir.clone(), metadata.clone(), decode)));
    }

    let ceda = ceda_archive::available_models(init_time);
    if let Some(metadata) = ceda.get(resolved) {
        return Ok(Box::new(ceda_archive::CedaArchive::new(config.rawdir.clone(), metadata.clone(), decode)));
    }

    let mut available: Vec<String> = noaa.keys().chain(ceda.keys()).map(|k| k.to_string()).collect();
    available.sort();
    Err(ConfigError::UnknownModel(resolved.to_string(), available))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn build_repository_resolves_default_to_noaa_gfs() {
        let config = Config {
            rawdir: PathBuf::from("/tmp/raw"),
            storedir: PathBuf::from("/tmp/store"),
            model: "default".to_string(),
        };
        let repo = build_repository(&config, dt(), std::sync::Arc::new(|_: &std::path::Path| Ok(Default::default()))).unwrap();
        assert_eq!(repo.metadata().name, "noaa-gfs");
    }

    #[test]
    fn build_repository_rejects_an_unknown_model() {
        let config = Config {
            rawdir: PathBuf::from("/tmp/raw"),
            storedir: PathBuf::from("/tmp/store"),
            model: "not-a-model".to_string(),
        };
        let err = build_repository(&config, dt(), std::sync::Arc::new(|_: &std::path::Path| Ok(Default::default()))).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(_, _)));
    }
}
