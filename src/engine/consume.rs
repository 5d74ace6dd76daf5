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

//! Consume engine (C7): orchestrates one init-time end to end.

use super::{build_worker_pool, run_jobs};
use crate::errors::ConsumeError;
use crate::notify::{NotificationMessage, NotificationRepository};
use crate::perf::PerformanceMonitor;
use crate::repo::RawRepository;
use crate::store::{ArchiveCadence, TensorStore};
use chrono::{NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// `consume(it?) -> Result<path>` (spec.md §4.5). If `it` is absent, the
/// repository's own `latest_init_time_at` picks it.
pub fn consume(
    repo: &dyn RawRepository,
    storedir: &Path,
    it: Option<NaiveDateTime>,
    notifier: &dyn NotificationRepository,
    sample_bytes: impl Fn() -> usize + Send + 'static,
) -> Result<PathBuf, ConsumeError> {
    let monitor = PerformanceMonitor::start(sample_bytes);
    let metadata = repo.metadata();

    let it = it.unwrap_or_else(|| metadata.latest_init_time_at(Utc::now().naive_utc()));
    log::info!("consume: {} at init-time {it}", metadata.name);

    let coords = metadata.expected_coordinates.with_init_times(vec![it]);
    let mut store = TensorStore::initialize_empty(
        storedir,
        &metadata.name,
        coords,
        false,
        &metadata.chunk_count_overrides,
    )?;
    let store_dir = store.path.clone();

    repo.authenticate()?;

    let jobs = repo.fetch_init_data(it);
    log::debug!("dispatching {} fetch jobs for {it}", jobs.len());
    let pool = build_worker_pool(metadata.max_connections);

    let bar = ProgressBar::new(jobs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    bar.set_prefix(format!("{it}"));

    let mut failed = 0usize;
    run_jobs(&pool, jobs, |result| {
        match result {
            Ok(fragments) => {
                for fragment in fragments {
                    if let Err(e) = store.write_to_region(&fragment.coords, &fragment.data, None) {
                        log::error!("write failed for {it}: {e}");
                        failed += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("job failed for {it}: {e}");
                failed += 1;
            }
        }
        bar.inc(1);
    });
    bar.finish_with_message("done");

    if failed > 0 {
        return Err(ConsumeError::PartialFailure { count: failed });
    }

    let size_mb = store.attrs.size_mb;
    store
        .postprocess(storedir, &metadata.name, &metadata.postprocess_options)
        .map_err(ConsumeError::Postprocess)?;

    let result_path = match metadata.postprocess_options.append_to_archive {
        Some(ArchiveCadence::Monthly) => storedir.join(&metadata.name).join(format!("{}.store", it.format("%Y%m"))),
        Some(ArchiveCadence::Yearly) => storedir.join(&metadata.name).join(format!("{}.store", it.format("%Y"))),
        None => store_dir,
    };

    let perf = monitor.stop();
    let message = NotificationMessage::StoreCreated {
        filename: result_path.display().to_string(),
        size_mb: size_mb.round() as i64,
        performance: perf,
    };
    if let Err(e) = notifier.notify(&message) {
        log::warn!("notification delivery failed: {e}");
    }

    Ok(result_path)
}
