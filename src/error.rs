// SPDX-License-Identifier: MPL-2.0

//! Error types for every layer of the dashboard.
//!
//! Only [`ImportFormatError`] and [`SettingsError`] ever reach a caller of the
//! core. Data source failures end up in the widget's `error` field and
//! persistence failures are absorbed by the store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the binary and file-level helpers.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds reported by a weather data source.
///
/// The `Display` text is what ends up in a widget's `error` field, so it is
/// written for the person looking at the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("City not found")]
    NotFound,

    #[error("Invalid API key")]
    Unauthorized,

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Unknown(String),
}

/// Failures of the key-value persistence provider.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read saved state: {0}")]
    ReadFailed(String),

    #[error("Failed to save state: {0}")]
    WriteFailed(String),
}

/// Reasons an import document is rejected. State is never touched when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportFormatError {
    #[error("Invalid file format: missing {0}")]
    MissingFields(String),

    #[error("Invalid file format: {0}")]
    ParseFailed(String),

    #[error("Invalid file format: widget id '{0}' appears more than once")]
    DuplicateId(String),
}

/// Rejected widget settings edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("City must not be empty")]
    EmptyCity,
}

/// Top-level errors surfaced by the command-line front end.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Import(#[from] ImportFormatError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("No widget with id '{0}'")]
    UnknownWidget(String),

    #[error("Cannot read import file {path}: {reason}")]
    ImportFile { path: PathBuf, reason: String },

    #[error("Refresh task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
