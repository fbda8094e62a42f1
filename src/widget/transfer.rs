// SPDX-License-Identifier: MPL-2.0

//! # Import and Export
//!
//! Moves the whole dashboard in and out of a portable JSON document:
//!
//! ```json
//! {
//!   "dashboardWidgets": [...],
//!   "availableWidgets": [...],
//!   "version": "2.0",
//!   "exportDate": "2026-10-18T09:30:00.000Z"
//! }
//! ```
//!
//! Import only requires the two arrays. `version` and `exportDate` may be
//! missing or carry anything. A document is validated completely before the
//! store is touched, so a rejected import never leaves a partial state.
//!
//! Import is destructive. Asking the user first is the caller's job.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, ImportFormatError};

use super::model::{AvailableWidgetRecord, WidgetRecord, FORMAT_VERSION};
use super::store::WidgetStore;

const PLACED_FIELD: &str = "dashboardWidgets";
const AVAILABLE_FIELD: &str = "availableWidgets";

/// Exported dashboard document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub dashboard_widgets: Vec<WidgetRecord>,
    pub available_widgets: Vec<AvailableWidgetRecord>,
    pub version: String,
    #[serde(serialize_with = "serialize_iso")]
    pub export_date: DateTime<Utc>,
}

fn serialize_iso<S: serde::Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// A validated import, ready to replace the store's collections.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDocument {
    pub dashboard_widgets: Vec<WidgetRecord>,
    pub available_widgets: Vec<AvailableWidgetRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportShape {
    dashboard_widgets: Vec<WidgetRecord>,
    available_widgets: Vec<AvailableWidgetRecord>,
}

// ============================================================================
// Export
// ============================================================================

/// Snapshot both collections into an export document.
pub fn export_state(store: &WidgetStore) -> ExportDocument {
    ExportDocument {
        dashboard_widgets: store.placed().to_vec(),
        available_widgets: store.available().to_vec(),
        version: FORMAT_VERSION.to_string(),
        export_date: Utc::now(),
    }
}

/// Pretty-printed JSON for an export document.
pub fn to_json(document: &ExportDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

/// File name used for an export taken at `date`.
pub fn export_file_name(date: DateTime<Utc>) -> String {
    format!("weather-dashboard-{}.json", date.format("%Y-%m-%d"))
}

/// Write `document` into `dir` and return the file path.
pub fn export_to_dir(document: &ExportDocument, dir: &Path) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(document.export_date));
    fs::write(&path, to_json(document)?)?;
    log::info!("Exported dashboard to {:?}", path);
    Ok(path)
}

// ============================================================================
// Import
// ============================================================================

/// Parse and validate import text.
pub fn parse_import(text: &str) -> Result<ImportDocument, ImportFormatError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ImportFormatError::ParseFailed(e.to_string()))?;
    parse_import_value(value)
}

/// Validate an already parsed JSON value.
pub fn parse_import_value(value: Value) -> Result<ImportDocument, ImportFormatError> {
    let Some(object) = value.as_object() else {
        return Err(ImportFormatError::ParseFailed("expected a JSON object".into()));
    };

    let missing: Vec<&str> = [PLACED_FIELD, AVAILABLE_FIELD]
        .into_iter()
        .filter(|field| !object.get(*field).is_some_and(Value::is_array))
        .collect();
    if !missing.is_empty() {
        return Err(ImportFormatError::MissingFields(missing.join(", ")));
    }

    let shape: ImportShape =
        serde_json::from_value(value).map_err(|e| ImportFormatError::ParseFailed(e.to_string()))?;

    let mut seen = HashSet::new();
    let ids = shape
        .dashboard_widgets
        .iter()
        .map(|w| &w.id)
        .chain(shape.available_widgets.iter().map(|w| &w.id));
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(ImportFormatError::DuplicateId(id.clone()));
        }
    }

    Ok(ImportDocument {
        dashboard_widgets: shape.dashboard_widgets,
        available_widgets: shape.available_widgets,
    })
}

/// Read and validate an import file.
pub fn read_import_file(path: &Path) -> Result<ImportDocument, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::ImportFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(parse_import(&text)?)
}

/// Replace the store's collections with `document`.
///
/// Returns the ids of the placed widgets, in display order, so the caller
/// can refresh them.
pub fn import_state(store: &mut WidgetStore, document: ImportDocument) -> Vec<String> {
    store.replace_all(document.dashboard_widgets, document.available_widgets);
    store.placed_in_order().into_iter().map(|w| w.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::events::EventBus;
    use crate::widget::model::{SettingsUpdate, Units};
    use crate::widget::storage::MemoryStore;
    use crate::widget::weather::sample_report;

    fn seeded_store() -> (WidgetStore, MemoryStore) {
        let backing = MemoryStore::new();
        let mut store = WidgetStore::new(Box::new(backing.clone()), EventBus::new());
        store.initialize();
        (store, backing)
    }

    #[test]
    fn test_export_then_import_round_trips() {
        let (mut store, _) = seeded_store();
        store.begin_refresh("weather_1");
        store.finish_refresh("weather_1", Some(Ok(sample_report("Moscow", 2.5))));
        store.reorder_by_position_swap("weather_1", "weather_2");
        store.add_widget("weather_4");
        store
            .update_settings("weather_4", SettingsUpdate::new("Tokyo HQ", "Tokyo", Units::Imperial))
            .unwrap();
        let before = store.snapshot();

        let json = to_json(&export_state(&store)).unwrap();
        let (mut other, _) = seeded_store();
        other.remove_widget("weather_1");
        import_state(&mut other, parse_import(&json).unwrap());

        assert_eq!(other.snapshot(), before);
    }

    #[test]
    fn test_export_document_shape() {
        let (store, _) = seeded_store();
        let json: Value = serde_json::from_str(&to_json(&export_state(&store)).unwrap()).unwrap();

        assert_eq!(json["version"], "2.0");
        assert!(json["dashboardWidgets"].is_array());
        assert!(json["availableWidgets"].is_array());
        let date = json["exportDate"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(date).is_ok());
        assert!(date.ends_with('Z'));
    }

    #[test]
    fn test_missing_available_field_is_rejected() {
        let err = parse_import(r#"{"dashboardWidgets": []}"#).unwrap_err();
        assert_eq!(err, ImportFormatError::MissingFields("availableWidgets".into()));

        let err = parse_import(r#"{"dashboardWidgets": [], "availableWidgets": null}"#).unwrap_err();
        assert!(matches!(err, ImportFormatError::MissingFields(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_failure() {
        assert!(matches!(parse_import("not json"), Err(ImportFormatError::ParseFailed(_))));
        assert!(matches!(parse_import("[]"), Err(ImportFormatError::ParseFailed(_))));
    }

    #[test]
    fn test_malformed_record_rejects_whole_document() {
        let text = r#"{"dashboardWidgets": [{"id": "x"}], "availableWidgets": []}"#;
        assert!(matches!(parse_import(text), Err(ImportFormatError::ParseFailed(_))));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let text = r#"{
            "dashboardWidgets": [{"id": "a", "title": "A", "position": 0,
                                  "settings": {"city": "Oslo", "units": "metric"}}],
            "availableWidgets": [{"id": "a", "title": "A",
                                  "settings": {"city": "Oslo", "units": "metric"}}]
        }"#;
        assert_eq!(
            parse_import(text),
            Err(ImportFormatError::DuplicateId("a".into()))
        );
    }

    #[test]
    fn test_version_and_date_are_optional() {
        let text = r#"{"dashboardWidgets": [], "availableWidgets": [], "version": "9", "extra": 1}"#;
        let document = parse_import(text).unwrap();
        assert!(document.dashboard_widgets.is_empty());
    }

    #[test]
    fn test_import_normalizes_positions_and_returns_ids() {
        let text = r#"{
            "dashboardWidgets": [
                {"id": "a", "title": "A", "position": 7, "settings": {"city": "Oslo", "units": "metric"}},
                {"id": "b", "title": "B", "position": 3, "settings": {"city": "Rome", "units": "metric"}}
            ],
            "availableWidgets": []
        }"#;
        let (mut store, backing) = seeded_store();

        let ids = import_state(&mut store, parse_import(text).unwrap());

        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(store.get("b").unwrap().position, 0);
        assert_eq!(store.get("a").unwrap().position, 1);
        assert_eq!(backing.document().unwrap(), store.to_document());
    }

    #[test]
    fn test_export_to_dir_uses_dated_name() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = seeded_store();
        let document = export_state(&store);

        let path = export_to_dir(&document, dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            export_file_name(document.export_date)
        );
        let imported = read_import_file(&path).unwrap();
        assert_eq!(imported.dashboard_widgets, document.dashboard_widgets);
    }

    #[test]
    fn test_export_file_name_format() {
        let date = DateTime::parse_from_rfc3339("2026-03-09T23:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(export_file_name(date), "weather-dashboard-2026-03-09.json");
    }
}
