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

//! Archive engine (C8): enumerates a month's init-times, initializes one
//! shared monthly store, and replays the consume engine's fetch/write loop
//! per init-time, recording per-time failures as store metadata instead of
//! failing the whole run.

use super::{build_worker_pool, run_jobs};
use crate::errors::{ArchiveError, StoreError};
use crate::notify::{NotificationMessage, NotificationRepository};
use crate::perf::PerformanceMonitor;
use crate::repo::RawRepository;
use crate::store::TensorStore;
use chrono::{NaiveDate, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// `archive(year, month) -> Result<path>` (spec.md §4.6).
pub fn archive(
    repo: &dyn RawRepository,
    storedir: &Path,
    year: i32,
    month: u32,
    notifier: &dyn NotificationRepository,
    sample_bytes: impl Fn() -> usize + Send + 'static,
) -> Result<PathBuf, ArchiveError> {
    let monitor = PerformanceMonitor::start(sample_bytes);
    let metadata = repo.metadata();

    let init_times = month_init_times(year, month, &metadata.running_hours);
    log::info!("archive: {} over {year}-{month:02}, {} init-times", metadata.name, init_times.len());
    let coords = metadata.expected_coordinates.with_init_times(init_times);

    let mut store = match TensorStore::initialize_empty(
        storedir,
        &metadata.name,
        coords,
        false,
        &metadata.chunk_count_overrides,
    ) {
        Ok(store) => store,
        Err(StoreError::StoreExists(dir)) => {
            log::info!("archive store already exists at {}, resuming", dir.display());
            TensorStore::open(&dir)?
        }
        Err(e) => return Err(ArchiveError::StoreInit(e)),
    };

    let mut missing = store.missing_times()?;
    missing.sort();
    log::debug!("{} init-times remain missing", missing.len());

    let mut failed_times: HashSet<NaiveDateTime> = store.attrs.failed_times.iter().copied().collect();
    let pool = build_worker_pool(metadata.max_connections);

    let bar = ProgressBar::new(missing.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    bar.set_prefix(format!("{year}-{month:02}"));

    for it in missing {
        repo.authenticate().map_err(|source| ArchiveError::Auth { it, source })?;

        let jobs = repo.fetch_init_data(it);
        let mut it_failed = false;
        run_jobs(&pool, jobs, |result| match result {
            Ok(fragments) => {
                for fragment in fragments {
                    if let Err(e) = store.write_to_region(&fragment.coords, &fragment.data, None) {
                        log::error!("write failed for {it}: {e}");
                        it_failed = true;
                    }
                }
            }
            Err(e) => {
                log::warn!("job failed for {it}: {e}");
                it_failed = true;
            }
        });

        if it_failed {
            failed_times.insert(it);
        } else {
            failed_times.remove(&it);
        }
        bar.inc(1);
    }
    bar.finish_with_message("done");

    let failed_times: Vec<NaiveDateTime> = failed_times.into_iter().collect();
    let failed_count = failed_times.len();
    store
        .update_attrs(|a| {
            a.failed_times = failed_times;
            a.failed_times = a.failed_times_descending();
        })
        .map_err(ArchiveError::Attrs)?;

    let perf = monitor.stop();
    let message = NotificationMessage::StoreAppended {
        filename: store.path.display().to_string(),
        size_mb: store.attrs.size_mb.round() as i64,
        performance: perf,
    };
    if let Err(e) = notifier.notify(&message) {
        log::warn!("notification delivery failed: {e}");
    }
    if failed_count > 0 {
        log::warn!("{failed_count} init-times recorded as failed in this archive run");
    }

    Ok(store.path.clone())
}

fn month_init_times(year: i32, month: u32, running_hours: &[u8]) -> Vec<NaiveDateTime> {
    let mut hours = running_hours.to_vec();
    hours.sort_unstable();

    let days = days_in_month(year, month);
    let mut out = Vec::with_capacity(days as usize * hours.len());
    for day in 1..=days {
        let date = NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar day");
        for &hour in &hours {
            out.push(date.and_hms_opt(hour as u32, 0, 0).expect("valid running hour"));
        }
    }
    out
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid calendar month");
    let first_of_this = NaiveDate::from_ymd_opt(year, month, 1).expect("valid calendar month");
    (first_of_next - first_of_this).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_init_times_covers_every_running_hour_of_every_day() {
        let times = month_init_times(2021, 1, &[0, 6, 12, 18]);
        assert_eq!(times.len(), 31 * 4);
        assert_eq!(times[0], NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(times.last().unwrap(), &NaiveDate::from_ymd_opt(2021, 1, 31).unwrap().and_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn days_in_month_handles_december() {
        assert_eq!(days_in_month(2021, 12), 31);
        assert_eq!(days_in_month(2020, 2), 29);
    }
}
