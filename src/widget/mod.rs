// SPDX-License-Identifier: MPL-2.0

//! Widget state, persistence and synchronization

pub mod events;
pub mod model;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod weather;

pub use events::{DashboardEvent, EventBus, RefreshOutcome};
pub use model::{
    AvailableWidgetRecord, DashboardSnapshot, PersistedDocument, SettingsUpdate, Units,
    WeatherSnapshot, WidgetKind, WidgetRecord, WidgetSettings,
};
pub use storage::{JsonFileStore, MemoryStore, PersistenceAdapter};
pub use store::{SharedStore, WidgetStore};
pub use sync::WidgetSyncEngine;
pub use weather::{OpenWeatherMapSource, ScriptedSource, WeatherReport, WeatherSource};
