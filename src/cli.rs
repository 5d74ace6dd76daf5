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

//! CLI surface (spec.md §6, collaborator): `consume`, `archive`, `info`.
//! Each subcommand is a thin wrapper around the engine/config modules,
//! mapping its `Result` to a process exit code.

use crate::config::{self, Config};
use crate::errors::ConsumerError;
use crate::notify::StdoutNotifier;
use crate::registry;
use crate::{cap_sampler, engine};
use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nwpc", about = "Numerical weather prediction consumer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, decode, and region-write one init-time.
    Consume {
        /// `YYYY-MM-DDTHH`; defaults to the provider's latest available init-time.
        #[arg(long = "init-time")]
        init_time: Option<String>,
    },
    /// Backfill a full calendar month into one shared archive store.
    Archive {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Print metadata without fetching anything.
    Info {
        #[arg(long)]
        model: bool,
        #[arg(long)]
        parameters: bool,
    },
}

/// Runs the parsed command to completion, returning the process exit code
/// (spec.md §6: 0 on success, 1 on failure).
pub fn run(cli: Cli) -> i32 {
    match run_inner(cli) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e}");
            1
        }
    }
}

fn run_inner(cli: Cli) -> Result<(), ConsumerError> {
    match cli.command {
        Command::Consume { init_time } => run_consume(init_time),
        Command::Archive { year, month } => run_archive(year, month),
        Command::Info { model, parameters } => run_info(model, parameters),
    }
}

fn parse_init_time(raw: &str) -> Result<NaiveDateTime, ConsumerError> {
    NaiveDateTime::parse_from_str(&format!("{raw}:00:00"), "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| ConsumerError::Config(crate::errors::ConfigError::InvalidEnv {
            name: "--init-time".to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        }))
}

fn run_consume(init_time: Option<String>) -> Result<(), ConsumerError> {
    let config = Config::from_env()?;
    let it = init_time.as_deref().map(parse_init_time).transpose()?;
    let probe_time = it.unwrap_or_else(|| Utc::now().naive_utc());

    let repo = config::build_repository(&config, probe_time, crate::stub_decoder())?;
    let path = engine::consume::consume(repo.as_ref(), &config.storedir, it, &StdoutNotifier, cap_sampler())?;
    println!("{}", path.display());
    Ok(())
}

fn run_archive(year: i32, month: u32) -> Result<(), ConsumerError> {
    let config = Config::from_env()?;
    let probe_time = chrono::NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ConsumerError::Config(crate::errors::ConfigError::InvalidEnv {
            name: "--year/--month".to_string(),
            value: format!("{year}-{month:02}"),
            reason: "not a valid calendar month".to_string(),
        }))?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time");

    let repo = config::build_repository(&config, probe_time, crate::stub_decoder())?;
    let path = engine::archive::archive(repo.as_ref(), &config.storedir, year, month, &StdoutNotifier, cap_sampler())?;
    println!("{}", path.display());
    Ok(())
}

fn run_info(model: bool, parameters: bool) -> Result<(), ConsumerError> {
    let config = Config::from_env()?;

    if parameters {
        for param in registry::all() {
            let data = param.data();
            println!("{:<45} {:>10} [{} .. {}]", data.name, data.unit, data.limits.lower, data.limits.upper);
        }
    }

    if model || !parameters {
        let models = config::available_models(Utc::now().naive_utc());
        let mut names: Vec<&'static str> = models.keys().copied().collect();
        names.sort();
        for name in names {
            println!("{}", models[name]);
        }
        log::debug!("selected model: {}", config.model);
    }

    Ok(())
}
