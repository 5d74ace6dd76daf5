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

//! Integration tests for the consume/archive engines, with access to every
//! private module. A real provider is a whole HTTP+decode stack, which is
//! tedious to stand up per test, so this exercises the engines against a
//! small in-memory [`RawRepository`] instead.

use crate::coords::{CoordIndexes, Coords};
use crate::engine::{archive, consume};
use crate::errors::{AuthError, JobError, NotificationError};
use crate::notify::{NotificationMessage, NotificationRepository};
use crate::repo::metadata::ModelRepositoryMetadata;
use crate::repo::{fragment_coords, Fragment, Job, RawRepository};
use crate::store::PostprocessOptions;
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

fn small_metadata(steps: Vec<u32>, running_hours: Vec<u8>, max_connections: usize) -> ModelRepositoryMetadata {
    let coords = Coords::from_indexes(CoordIndexes {
        init_time: vec![dt(2021, 1, 1, 0)],
        step: steps,
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

    ModelRepositoryMetadata {
        name: "fake-model".to_string(),
        is_archive: false,
        is_order_based: false,
        running_hours,
        delay_minutes: 0,
        required_env: Vec::new(),
        optional_env: Default::default(),
        max_connections,
        expected_coordinates: coords,
        chunk_count_overrides: Default::default(),
        postprocess_options: PostprocessOptions::default(),
    }
}

/// A `RawRepository` that fetches nothing over the network: each job just
/// fills its fragment with the step number, after an optional sleep (to
/// create overlap for the concurrency-bound test) and an optional synthetic
/// failure on the first step of chosen init-times (to create a partial
/// failure without ever fully missing that init-time).
struct FakeRepository {
    metadata: ModelRepositoryMetadata,
    fail_first_step_of: HashSet<NaiveDateTime>,
    job_sleep: Duration,
    concurrent: Arc<AtomicUsize>,
    max_observed: Arc<AtomicUsize>,
}

impl FakeRepository {
    fn new(metadata: ModelRepositoryMetadata) -> FakeRepository {
        FakeRepository {
            metadata,
            fail_first_step_of: HashSet::new(),
            job_sleep: Duration::from_millis(0),
            concurrent: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing_at(mut self, its: impl IntoIterator<Item = NaiveDateTime>) -> FakeRepository {
        self.fail_first_step_of.extend(its);
        self
    }

    fn with_job_sleep(mut self, sleep: Duration) -> FakeRepository {
        self.job_sleep = sleep;
        self
    }
}

impl RawRepository for FakeRepository {
    fn metadata(&self) -> &ModelRepositoryMetadata {
        &self.metadata
    }

    fn authenticate(&self) -> Result<(), AuthError> {
        Ok(())
    }

    fn fetch_init_data(&self, it: NaiveDateTime) -> Vec<Job> {
        let expected = self.metadata.expected_coordinates.clone();
        let param = expected.variable[0];
        let first_step = expected.step[0];
        let should_fail = self.fail_first_step_of.contains(&it);

        expected
            .step
            .iter()
            .copied()
            .map(|step| {
                let expected = expected.clone();
                let concurrent = self.concurrent.clone();
                let max_observed = self.max_observed.clone();
                let sleep = self.job_sleep;
                let fail_this_one = should_fail && step == first_step;

                Job::new(format!("{it}-step{step}"), move || {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(sleep);
                    concurrent.fetch_sub(1, Ordering::SeqCst);

                    if fail_this_one {
                        return Err(JobError::Decode("synthetic failure".to_string()));
                    }

                    let coords = fragment_coords(&expected, it, step, param);
                    let shape: Vec<usize> = coords.dims().iter().map(|d| coords.shape()[*d]).collect();
                    let data = ArrayD::from_elem(IxDyn(&shape), step as f64);
                    Ok(vec![Fragment { coords, data }])
                })
            })
            .collect()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl NotificationRepository for RecordingNotifier {
    fn notify(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Property S1: a clean run fetches every job, writes every region, and
/// notifies exactly once.
#[test]
fn consume_happy_path_writes_and_notifies() {
    let storedir = tempfile::tempdir().unwrap();
    let repo = FakeRepository::new(small_metadata(vec![0, 1, 2], vec![0], 4));
    let notifier = RecordingNotifier::default();
    let it = dt(2021, 6, 1, 0);

    let path = consume::consume(&repo, storedir.path(), Some(it), &notifier, || 0).unwrap();
    assert!(path.exists());
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    assert!(matches!(notifier.sent.lock().unwrap()[0], NotificationMessage::StoreCreated { .. }));
}

/// Property S2: one failing job fails the whole init-time, and no
/// notification is sent for a run that didn't fully succeed.
#[test]
fn consume_reports_partial_failure_and_skips_notification() {
    let storedir = tempfile::tempdir().unwrap();
    let it = dt(2021, 6, 1, 0);
    let repo = FakeRepository::new(small_metadata(vec![0, 1, 2], vec![0], 4)).failing_at([it]);
    let notifier = RecordingNotifier::default();

    let err = consume::consume(&repo, storedir.path(), Some(it), &notifier, || 0).unwrap_err();
    assert!(matches!(err, crate::errors::ConsumeError::PartialFailure { count: 1 }));
    assert!(notifier.sent.lock().unwrap().is_empty());
}

/// Property S6: the engine never runs more jobs concurrently than
/// `max_connections - 1` (one slot reserved for the writer thread).
#[test]
fn consume_respects_the_configured_concurrency_bound() {
    let storedir = tempfile::tempdir().unwrap();
    let max_connections = 3;
    let repo = FakeRepository::new(small_metadata(vec![0, 1, 2, 3, 4, 5], vec![0], max_connections))
        .with_job_sleep(Duration::from_millis(15));
    let max_observed = repo.max_observed.clone();
    let notifier = RecordingNotifier::default();

    consume::consume(&repo, storedir.path(), Some(dt(2021, 6, 1, 0)), &notifier, || 0).unwrap();
    assert!(max_observed.load(Ordering::SeqCst) <= max_connections - 1);
}

/// Property S3: an init-time with a partial write (one chunk failed, the
/// rest succeeded) is not fully missing, so a second archive run leaves it
/// untouched rather than re-fetching or re-failing it. Also asserts the
/// persisted `failed_times` attribute is kept in descending order.
#[test]
fn archive_resume_is_idempotent_after_a_partial_failure() {
    let storedir = tempfile::tempdir().unwrap();
    let earlier_flaky_it = dt(2021, 1, 5, 0);
    let later_flaky_it = dt(2021, 1, 20, 0);
    let repo = FakeRepository::new(small_metadata(vec![0, 1], vec![0], 4))
        .failing_at([earlier_flaky_it, later_flaky_it]);
    let notifier = RecordingNotifier::default();

    let path = archive::archive(&repo, storedir.path(), 2021, 1, &notifier, || 0).unwrap();
    let first_failed = crate::store::TensorStore::open(&path).unwrap().attrs.failed_times;
    assert_eq!(first_failed, vec![later_flaky_it, earlier_flaky_it]);

    let path_again = archive::archive(&repo, storedir.path(), 2021, 1, &notifier, || 0).unwrap();
    assert_eq!(path_again, path);
    let second_failed = crate::store::TensorStore::open(&path_again).unwrap().attrs.failed_times;
    assert_eq!(second_failed, vec![later_flaky_it, earlier_flaky_it]);
}
