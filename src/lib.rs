// SPDX-License-Identifier: MPL-2.0

//! Weather Dashboard core
//!
//! Keeps a set of weather widgets consistent across remote refreshes, user
//! edits, reordering, write-through persistence and import/export. Rendering
//! is left to whatever subscribes to [`DashboardEvent`]s.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod game;
pub mod widget;

pub use config::Config;
pub use dashboard::{Dashboard, RefreshHandle};
pub use error::{DataSourceError, Error, ImportFormatError, PersistenceError, SettingsError};
pub use widget::{DashboardEvent, RefreshOutcome};
