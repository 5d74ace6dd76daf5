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

//! Notification repository port (C6): the engine hands off one structured
//! message when a run completes successfully; delivery itself is an external
//! collaborator (spec.md §1), so this module only fixes the message shape
//! and supplies the one concrete transport the core ships with.

use crate::errors::NotificationError;
use serde::Serialize;

/// Process/memory figures sampled by [`crate::perf::PerformanceMonitor`]
/// over the lifetime of a run, per spec.md §3's `perf` record.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Performance {
    pub duration_seconds: u64,
    pub memory_mb: f64,
}

/// One of `StoreCreated`/`StoreAppended` (spec.md §3, §6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NotificationMessage {
    StoreCreated {
        filename: String,
        size_mb: i64,
        performance: Performance,
    },
    StoreAppended {
        filename: String,
        size_mb: i64,
        performance: Performance,
    },
}

/// Sink for a completed run's notification. Kept as a trait so the engine
/// never depends on a concrete transport, mirroring how [`crate::repo::RawRepository`]
/// decouples the engine from any one provider.
pub trait NotificationRepository: Send + Sync {
    fn notify(&self, message: &NotificationMessage) -> Result<(), NotificationError>;
}

/// Prints the message as a single line of JSON on stdout, backed by
/// `println!`/`log` rather than a dedicated network client.
pub struct StdoutNotifier;

impl NotificationRepository for StdoutNotifier {
    fn notify(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let line = serde_json::to_string(message)
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;
        println!("{line}");
        log::info!("notification sent: {line}");
        Ok(())
    }
}
