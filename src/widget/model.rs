// SPDX-License-Identifier: MPL-2.0

//! # Widget Data Model
//!
//! Records kept by the [`WidgetStore`](super::store::WidgetStore) and the
//! documents they are persisted and exported as.
//!
//! ## Two Collections
//!
//! - **Placed** widgets ([`WidgetRecord`]) are on the dashboard. They carry a
//!   `position` and the transient refresh state (`data`, `is_loading`,
//!   `error`).
//! - **Available** widgets ([`AvailableWidgetRecord`]) sit in the selection
//!   pool and only carry identity, title and settings.
//!
//! ## JSON Shape
//!
//! Field names are camelCase on the wire (`dashboardWidgets`, `isLoading`,
//! `feelsLike`, ...) so saved state and exported files stay compatible with
//! documents written by earlier versions of the dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SettingsError;

/// Format version written into persisted and exported documents.
pub const FORMAT_VERSION: &str = "2.0";

// ============================================================================
// Settings
// ============================================================================

/// Measurement system requested from the weather provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Celsius, metres per second
    #[default]
    Metric,
    /// Fahrenheit, miles per hour
    Imperial,
    /// Kelvin, metres per second
    Standard,
}

impl Units {
    /// Value of the provider's `units` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    /// Suffix shown after a temperature.
    pub fn temperature_symbol(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    /// Unit of the wind speed reported by the provider.
    pub fn speed_unit(self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            other => Err(format!(
                "unknown units '{other}' (expected metric, imperial or standard)"
            )),
        }
    }
}

/// Location and measurement system of a weather widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSettings {
    /// City query sent to the provider. Never empty.
    pub city: String,
    pub units: Units,
}

impl WidgetSettings {
    pub fn new(city: impl Into<String>, units: Units) -> Self {
        Self {
            city: city.into(),
            units,
        }
    }
}

/// A settings edit submitted from the settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub title: String,
    pub city: String,
    pub units: Units,
}

impl SettingsUpdate {
    pub fn new(title: impl Into<String>, city: impl Into<String>, units: Units) -> Self {
        Self {
            title: title.into(),
            city: city.into(),
            units,
        }
    }

    /// Trim the city and reject an empty one.
    pub(crate) fn validated(self) -> Result<Self, SettingsError> {
        let city = self.city.trim().to_string();
        if city.is_empty() {
            return Err(SettingsError::EmptyCity);
        }
        Ok(Self { city, ..self })
    }
}

// ============================================================================
// Weather Snapshot
// ============================================================================

/// Latest successfully fetched conditions for one widget.
///
/// Replaced wholesale by every successful refresh, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub feels_like: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Pressure in hPa
    pub pressure: f64,
    pub wind_speed: f64,
    pub description: String,
    /// Provider icon code, e.g. "10d"
    pub icon: String,
}

// ============================================================================
// Widget Records
// ============================================================================

/// Widget type tag. Weather is the only kind there is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    #[default]
    Weather,
}

/// A widget placed on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: WidgetKind,
    pub title: String,
    /// Display slot; dense `0..N-1` across the placed collection
    #[serde(default)]
    pub position: usize,
    pub settings: WidgetSettings,
    #[serde(default)]
    pub data: Option<WeatherSnapshot>,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl WidgetRecord {
    /// Promote a pool entry onto the dashboard at `position` with a clean
    /// transient state.
    pub fn from_available(available: AvailableWidgetRecord, position: usize) -> Self {
        Self {
            id: available.id,
            kind: available.kind,
            title: available.title,
            position,
            settings: available.settings,
            data: None,
            is_loading: false,
            error: None,
        }
    }

    /// Strip position and transient fields for the selection pool.
    pub fn to_available(&self) -> AvailableWidgetRecord {
        AvailableWidgetRecord {
            id: self.id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// A widget template waiting in the selection pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableWidgetRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: WidgetKind,
    pub title: String,
    pub settings: WidgetSettings,
}

impl AvailableWidgetRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, settings: WidgetSettings) -> Self {
        Self {
            id: id.into(),
            kind: WidgetKind::Weather,
            title: title.into(),
            settings,
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Full application state as handed to the persistence provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    #[serde(default)]
    pub dashboard_widgets: Vec<WidgetRecord>,
    #[serde(default)]
    pub available_widgets: Vec<AvailableWidgetRecord>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// Read-only copy of both collections handed to event subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub placed: Vec<WidgetRecord>,
    pub available: Vec<AvailableWidgetRecord>,
}

impl DashboardSnapshot {
    /// Placed widgets sorted by display position.
    pub fn placed_in_order(&self) -> Vec<&WidgetRecord> {
        let mut ordered: Vec<&WidgetRecord> = self.placed.iter().collect();
        ordered.sort_by_key(|w| w.position);
        ordered
    }
}

// ============================================================================
// Defaults and Helpers
// ============================================================================

/// Title used for a weather widget showing `city`.
pub fn weather_title(city: &str) -> String {
    format!("Weather in {city}")
}

/// Placed widgets seeded on first run.
pub fn default_placed() -> Vec<WidgetRecord> {
    [("weather_1", "Moscow"), ("weather_2", "London")]
        .into_iter()
        .enumerate()
        .map(|(position, (id, city))| {
            WidgetRecord::from_available(
                AvailableWidgetRecord::new(id, weather_title(city), WidgetSettings::new(city, Units::Metric)),
                position,
            )
        })
        .collect()
}

/// Selection pool seeded on first run.
pub fn default_available() -> Vec<AvailableWidgetRecord> {
    [("weather_3", "New York"), ("weather_4", "Tokyo"), ("weather_5", "Paris")]
        .into_iter()
        .map(|(id, city)| {
            AvailableWidgetRecord::new(id, weather_title(city), WidgetSettings::new(city, Units::Metric))
        })
        .collect()
}

/// Placeholder template for a freshly created draft widget.
pub fn draft_widget(id: impl Into<String>) -> AvailableWidgetRecord {
    AvailableWidgetRecord::new(id, "New widget", WidgetSettings::new("Moscow", Units::Metric))
}

/// True when the positions of `placed` are exactly `0..len`.
pub fn positions_are_dense(placed: &[WidgetRecord]) -> bool {
    let mut seen = vec![false; placed.len()];
    for widget in placed {
        match seen.get_mut(widget.position) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Reassign positions to `0..len`, keeping the current display order.
///
/// Ties (duplicate positions) keep collection order. The collection itself
/// is not reordered.
pub fn densify_positions(placed: &mut [WidgetRecord]) {
    let mut order: Vec<usize> = (0..placed.len()).collect();
    order.sort_by_key(|&i| (placed[i].position, i));
    for (position, index) in order.into_iter().enumerate() {
        placed[index].position = position;
    }
}
