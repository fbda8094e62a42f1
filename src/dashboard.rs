// SPDX-License-Identifier: MPL-2.0

//! Dashboard facade.
//!
//! A front end holds one [`Dashboard`]. It owns the shared store, the sync
//! engine and the event bus, and it decides which operations are followed by
//! a refresh: placing a widget, editing a placed widget's settings,
//! importing, and startup for widgets that have no data yet.
//!
//! Refreshes are spawned on the current tokio runtime; the returned handles
//! can be awaited or dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{Error, ImportFormatError, SettingsError};
use crate::widget::events::{DashboardEvent, EventBus, RefreshOutcome};
use crate::widget::model::{DashboardSnapshot, SettingsUpdate};
use crate::widget::storage::PersistenceAdapter;
use crate::widget::store::{lock_store, SharedStore, WidgetStore};
use crate::widget::sync::WidgetSyncEngine;
use crate::widget::transfer::{self, ExportDocument, ImportDocument};
use crate::widget::weather::WeatherSource;

/// Join handle of a spawned refresh.
pub type RefreshHandle = JoinHandle<Option<RefreshOutcome>>;

pub struct Dashboard<S> {
    store: SharedStore,
    engine: WidgetSyncEngine<S>,
    events: EventBus,
}

impl<S> Dashboard<S>
where
    S: WeatherSource + Sync + 'static,
{
    /// Build a dashboard around the given providers. Nothing is loaded until
    /// [`start`](Self::start) or [`initialize`](Self::initialize).
    pub fn new(persistence: Box<dyn PersistenceAdapter>, source: S) -> Self {
        let events = EventBus::new();
        let store = WidgetStore::new(persistence, events.clone()).into_shared();
        let engine = WidgetSyncEngine::new(Arc::clone(&store), Arc::new(source));
        Self {
            store,
            engine,
            events,
        }
    }

    /// Receive every [`DashboardEvent`] published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    /// Load saved state without refreshing anything.
    pub fn initialize(&self) {
        lock_store(&self.store).initialize();
    }

    /// Load saved state and refresh every placed widget that has no data.
    pub fn start(&self) -> Vec<RefreshHandle> {
        let stale: Vec<String> = {
            let mut store = lock_store(&self.store);
            store.initialize();
            store
                .placed_in_order()
                .into_iter()
                .filter(|w| w.data.is_none())
                .map(|w| w.id.clone())
                .collect()
        };
        log::info!("Dashboard started, {} widgets need data", stale.len());
        self.engine.spawn_many(stale)
    }

    /// Final save before the process exits.
    pub fn shutdown(&self) {
        lock_store(&self.store).shutdown();
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        lock_store(&self.store).snapshot()
    }

    /// Direct access to the shared store, e.g. for a custom front end.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    // ========================================================================
    // Widget Operations
    // ========================================================================

    /// Place an available widget and start fetching its weather.
    pub fn add_widget(&self, available_id: &str) -> Option<RefreshHandle> {
        let added = lock_store(&self.store).add_widget(available_id);
        added.then(|| self.engine.spawn_refresh(available_id))
    }

    /// Return a placed widget to the pool. `false` if it is not placed.
    pub fn remove_widget(&self, placed_id: &str) -> bool {
        lock_store(&self.store).remove_widget(placed_id)
    }

    /// Swap the display positions of two placed widgets.
    pub fn swap_positions(&self, id_a: &str, id_b: &str) -> bool {
        lock_store(&self.store).reorder_by_position_swap(id_a, id_b)
    }

    /// Edit a widget's settings. A placed widget is refreshed with the new
    /// settings; a widget in the pool is only updated.
    pub fn update_settings(
        &self,
        id: &str,
        update: SettingsUpdate,
    ) -> Result<Option<RefreshHandle>, Error> {
        let placed = {
            let mut store = lock_store(&self.store);
            if store.update_settings(id, update.clone())? {
                true
            } else if store.configure_available(id, update)? {
                false
            } else {
                return Err(Error::UnknownWidget(id.to_string()));
            }
        };
        Ok(placed.then(|| self.engine.spawn_refresh(id)))
    }

    /// Create a draft widget in the pool, optionally configured right away.
    pub fn create_widget(&self, settings: Option<SettingsUpdate>) -> Result<String, SettingsError> {
        let mut store = lock_store(&self.store);
        if let Some(update) = &settings {
            // Validate first so a bad form never leaves a stray draft behind
            update.clone().validated()?;
        }
        let id = store.create_draft_widget();
        if let Some(update) = settings {
            store.configure_available(&id, update)?;
        }
        Ok(id)
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Manual refresh or retry of one widget.
    pub fn refresh(&self, id: &str) -> RefreshHandle {
        self.engine.spawn_refresh(id)
    }

    /// Refresh every placed widget.
    pub fn refresh_all(&self) -> Vec<RefreshHandle> {
        self.engine.spawn_refresh_all()
    }

    // ========================================================================
    // Import / Export
    // ========================================================================

    /// Snapshot the dashboard as an export document.
    pub fn export_state(&self) -> ExportDocument {
        transfer::export_state(&lock_store(&self.store))
    }

    /// Export into `dir` as `weather-dashboard-YYYY-MM-DD.json`.
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf, Error> {
        transfer::export_to_dir(&self.export_state(), dir)
    }

    /// Replace the whole dashboard with `document` and refresh every placed
    /// widget. Callers confirm with the user before calling this.
    pub fn import_state(&self, document: ImportDocument) -> Vec<RefreshHandle> {
        let ids = transfer::import_state(&mut lock_store(&self.store), document);
        self.engine.spawn_many(ids)
    }

    /// Parse and import JSON text. On error the dashboard is unchanged.
    pub fn import_json(&self, text: &str) -> Result<Vec<RefreshHandle>, ImportFormatError> {
        let document = transfer::parse_import(text)?;
        Ok(self.import_state(document))
    }
}
