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

//! Error definitions for every component of the consumer.
//!
//! Every fallible boundary returns one of these enums rather than panicking;
//! workers convert whatever an adaptor throws into a `JobError` before
//! handing a result back to the engine. None of this propagates a
//! panic/abort from decoders or network clients.

use thiserror::Error;

/// Errors raised while looking parameters up in the [`crate::registry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown parameter short name: {0}")]
    UnknownParameter(String),
}

/// Errors raised while constructing or validating a [`crate::coords::Coords`] map.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordsError {
    #[error("missing required dimension: {0}")]
    MissingDimension(&'static str),

    #[error("no spatial dimension pair present: need (latitude, longitude) or (y, x)")]
    MissingSpatialDims,

    #[error("dimension {0} is not strictly monotonic")]
    NotMonotonic(&'static str),

    #[error("duplicate variable in coordinate map: {0}")]
    DuplicateVariable(String),

    #[error("unknown parameter in coordinate map: {0}")]
    UnknownParameter(#[from] RegistryError),

    #[error("crop leaves no coordinates in dimension {0}")]
    EmptyCrop(&'static str),

    #[error("unknown named region {0:?}")]
    UnknownRegion(String),
}

/// §3 region algebra failures, raised by [`crate::coords::region::determine_region`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    #[error("mismatched dimensions between inner and outer coordinate maps: {details}")]
    MismatchedDims { details: String },

    #[error("dimension {dim}: inner coordinate values are not a subset of the outer map ({details})")]
    NotSubset { dim: String, details: String },

    #[error("dimension {dim}: inner coordinate values are not a contiguous run in the outer map ({details})")]
    NonContiguous { dim: String, details: String },
}

/// Errors raised by the tensor store (C4).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store already exists at {0} and overwrite was not requested")]
    StoreExists(std::path::PathBuf),

    #[error("init_time coordinate must be non-empty to initialize a store")]
    EmptyInitTimes,

    #[error("failed deriving write region: {0}")]
    Region(#[from] RegionError),

    #[error("I/O error in store at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize store metadata: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised by a raw repository adaptor (C5) while authenticating.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("credentials rejected by provider: {0}")]
    Rejected(String),
}

/// Errors raised while configuring the process (ambient, §6).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },

    #[error("unknown model {0:?} requested, available: {1:?}")]
    UnknownModel(String, Vec<String>),
}

/// Per-job failure. These are values, never exceptions: a job failing never
/// cancels its peers (spec.md §5, §7).
#[derive(Error, Debug)]
pub enum JobError {
    #[error("network error fetching {url}: {message} (transient={transient})")]
    Network {
        url: String,
        message: String,
        transient: bool,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("region derivation failed: {0}")]
    Region(#[from] RegionError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}

/// Top level error for the consume engine (C7).
#[derive(Error, Debug)]
pub enum ConsumeError {
    #[error("store initialization failed: {0}")]
    StoreInit(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{count} of the init time's fetch/write jobs failed")]
    PartialFailure { count: usize },

    #[error("post-processing failed: {0}")]
    Postprocess(StoreError),
}

/// Top level error for the archive engine (C8).
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("store initialization failed: {0}")]
    StoreInit(#[from] StoreError),

    #[error("authentication failed for init time {it}: {source}")]
    Auth {
        it: chrono::NaiveDateTime,
        #[source]
        source: AuthError,
    },

    #[error("failed to update store attributes: {0}")]
    Attrs(StoreError),
}

/// Errors raised sending a completion notification (C6).
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}

/// Root error returned by the CLI surface, wrapping whichever concern
/// actually failed (spec.md §7's "the engine logs each failure... CLI exit
/// code 0 on clean success, 1 otherwise").
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Consume(#[from] ConsumeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
