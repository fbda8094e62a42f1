// SPDX-License-Identifier: MPL-2.0

//! # Widget Store
//!
//! Owns the two widget collections and every operation that mutates them.
//!
//! ## Invariants
//!
//! - Ids are unique across placed and available combined and never change.
//! - Placed positions are always exactly `0..N-1`.
//! - A widget lives in exactly one collection.
//!
//! ## Write-Through
//!
//! Every mutation saves the full document through the
//! [`PersistenceAdapter`] before returning, then publishes
//! [`DashboardEvent::StateChanged`]. A failed save is logged and published as
//! [`DashboardEvent::PersistenceFailed`]; the in-memory change stands.
//!
//! ## Sharing
//!
//! The store is shared with in-flight refreshes as a [`SharedStore`]. Every
//! caller holds the lock for one synchronous operation only, so nobody ever
//! observes a half-applied mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{DataSourceError, SettingsError};

use super::events::{DashboardEvent, EventBus, RefreshOutcome};
use super::model::{
    default_available, default_placed, densify_positions, draft_widget, positions_are_dense,
    weather_title, AvailableWidgetRecord, DashboardSnapshot, PersistedDocument, SettingsUpdate,
    WidgetRecord, WidgetSettings, FORMAT_VERSION,
};
use super::storage::PersistenceAdapter;
use super::weather::WeatherReport;

/// Store handle shared between the dashboard and refresh tasks.
pub type SharedStore = Arc<Mutex<WidgetStore>>;

/// Lock a shared store, recovering from a poisoned lock.
///
/// Every mutation leaves the collections consistent before it can panic, so
/// the data behind a poisoned lock is still usable.
pub fn lock_store(store: &Mutex<WidgetStore>) -> MutexGuard<'_, WidgetStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop loading flags that outlived the refresh that set them, e.g. one
/// saved mid-refresh by a process that was then killed.
fn clear_loading(placed: &mut [WidgetRecord]) {
    for widget in placed.iter_mut().filter(|w| w.is_loading) {
        log::debug!("Clearing stale loading flag on {}", widget.id);
        widget.is_loading = false;
    }
}

pub struct WidgetStore {
    /// Widgets on the dashboard
    placed: Vec<WidgetRecord>,
    /// Widgets in the selection pool
    available: Vec<AvailableWidgetRecord>,
    persistence: Box<dyn PersistenceAdapter>,
    events: EventBus,
}

impl WidgetStore {
    /// Create an empty store. Call [`initialize`](Self::initialize) before use.
    pub fn new(persistence: Box<dyn PersistenceAdapter>, events: EventBus) -> Self {
        Self {
            placed: Vec::new(),
            available: Vec::new(),
            persistence,
            events,
        }
    }

    /// Wrap the store for sharing with refresh tasks.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load saved state, or seed the built-in defaults.
    ///
    /// Fails open: an unreadable or corrupt document is logged and replaced
    /// by the defaults.
    pub fn initialize(&mut self) {
        match self.persistence.load() {
            Ok(Some(document)) => {
                log::info!(
                    "Loaded {} placed and {} available widgets (format {})",
                    document.dashboard_widgets.len(),
                    document.available_widgets.len(),
                    document.version
                );
                self.placed = document.dashboard_widgets;
                self.available = document.available_widgets;
                clear_loading(&mut self.placed);
                if !positions_are_dense(&self.placed) {
                    log::warn!("Saved widget positions had gaps, renumbering");
                    densify_positions(&mut self.placed);
                }
            }
            Ok(None) => {
                log::info!("No saved dashboard, using defaults");
                self.seed_defaults();
            }
            Err(e) => {
                log::warn!("{}; falling back to defaults", e);
                self.seed_defaults();
            }
        }
        self.notify();
    }

    fn seed_defaults(&mut self) {
        self.placed = default_placed();
        self.available = default_available();
    }

    /// Flush the current state one last time.
    pub fn shutdown(&mut self) {
        log::info!("Saving dashboard before exit");
        self.persist();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Widgets on the dashboard, in collection order.
    pub fn placed(&self) -> &[WidgetRecord] {
        &self.placed
    }

    /// Widgets in the selection pool.
    pub fn available(&self) -> &[AvailableWidgetRecord] {
        &self.available
    }

    /// Placed widgets sorted by position.
    pub fn placed_in_order(&self) -> Vec<&WidgetRecord> {
        let mut ordered: Vec<&WidgetRecord> = self.placed.iter().collect();
        ordered.sort_by_key(|w| w.position);
        ordered
    }

    /// Look up a placed widget.
    pub fn get(&self, id: &str) -> Option<&WidgetRecord> {
        self.placed.iter().find(|w| w.id == id)
    }

    /// Look up an available widget.
    pub fn get_available(&self, id: &str) -> Option<&AvailableWidgetRecord> {
        self.available.iter().find(|w| w.id == id)
    }

    /// True if either collection holds `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some() || self.get_available(id).is_some()
    }

    /// Owned copy of both collections.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            placed: self.placed.clone(),
            available: self.available.clone(),
        }
    }

    /// The document handed to the persistence provider.
    pub fn to_document(&self) -> PersistedDocument {
        PersistedDocument {
            dashboard_widgets: self.placed.clone(),
            available_widgets: self.available.clone(),
            version: FORMAT_VERSION.to_string(),
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Move an available widget onto the end of the dashboard.
    ///
    /// Returns `false` (and changes nothing) if `available_id` is unknown.
    pub fn add_widget(&mut self, available_id: &str) -> bool {
        let Some(index) = self.available.iter().position(|w| w.id == available_id) else {
            log::debug!("add_widget: no available widget {}", available_id);
            return false;
        };

        let template = self.available.remove(index);
        let position = self.placed.len();
        self.placed.push(WidgetRecord::from_available(template, position));

        log::info!("Placed widget {} at position {}", available_id, position);
        self.commit();
        true
    }

    /// Take a widget off the dashboard and return it to the pool.
    ///
    /// Remaining widgets close the gap keeping their display order. Settings
    /// survive; weather data and refresh state are dropped.
    pub fn remove_widget(&mut self, placed_id: &str) -> bool {
        let Some(index) = self.placed.iter().position(|w| w.id == placed_id) else {
            log::debug!("remove_widget: no placed widget {}", placed_id);
            return false;
        };

        let removed = self.placed.remove(index);
        densify_positions(&mut self.placed);
        self.available.push(removed.to_available());

        log::info!("Removed widget {} from the dashboard", placed_id);
        self.commit();
        true
    }

    /// Exchange the positions of two placed widgets.
    ///
    /// Collection order is left alone; only the two `position` values move.
    pub fn reorder_by_position_swap(&mut self, id_a: &str, id_b: &str) -> bool {
        if id_a == id_b {
            return false;
        }
        let index_a = self.placed.iter().position(|w| w.id == id_a);
        let index_b = self.placed.iter().position(|w| w.id == id_b);
        let (Some(a), Some(b)) = (index_a, index_b) else {
            log::debug!("reorder: {} or {} is not placed", id_a, id_b);
            return false;
        };

        let position_a = self.placed[a].position;
        self.placed[a].position = self.placed[b].position;
        self.placed[b].position = position_a;

        log::debug!("Swapped positions of {} and {}", id_a, id_b);
        self.commit();
        true
    }

    /// Overwrite title, city and units of a placed widget.
    ///
    /// Position, data and error are untouched. `Ok(false)` if the widget is
    /// not placed.
    pub fn update_settings(
        &mut self,
        placed_id: &str,
        update: SettingsUpdate,
    ) -> Result<bool, SettingsError> {
        let update = update.validated()?;
        let Some(widget) = self.placed.iter_mut().find(|w| w.id == placed_id) else {
            return Ok(false);
        };

        widget.title = update.title;
        widget.settings = WidgetSettings::new(update.city, update.units);

        log::info!("Updated settings of {}", placed_id);
        self.commit();
        Ok(true)
    }

    /// Same as [`update_settings`](Self::update_settings) for a widget still
    /// in the pool, typically a freshly created draft.
    pub fn configure_available(
        &mut self,
        available_id: &str,
        update: SettingsUpdate,
    ) -> Result<bool, SettingsError> {
        let update = update.validated()?;
        let Some(widget) = self.available.iter_mut().find(|w| w.id == available_id) else {
            return Ok(false);
        };

        widget.title = update.title;
        widget.settings = WidgetSettings::new(update.city, update.units);

        log::info!("Configured available widget {}", available_id);
        self.commit();
        Ok(true)
    }

    /// Add a placeholder widget to the pool and return its id.
    pub fn create_draft_widget(&mut self) -> String {
        let mut stamp = chrono::Utc::now().timestamp_millis();
        let mut id = format!("weather_{stamp}");
        while self.contains_id(&id) {
            stamp += 1;
            id = format!("weather_{stamp}");
        }

        self.available.push(draft_widget(id.clone()));

        log::info!("Created draft widget {}", id);
        self.commit();
        id
    }

    /// Swap in both collections wholesale. Used by import; validation is the
    /// caller's job.
    pub(crate) fn replace_all(
        &mut self,
        mut placed: Vec<WidgetRecord>,
        available: Vec<AvailableWidgetRecord>,
    ) {
        clear_loading(&mut placed);
        if !positions_are_dense(&placed) {
            densify_positions(&mut placed);
        }
        self.placed = placed;
        self.available = available;

        log::info!(
            "Replaced dashboard: {} placed, {} available",
            self.placed.len(),
            self.available.len()
        );
        self.commit();
    }

    // ========================================================================
    // Refresh Transitions
    // ========================================================================

    /// Mark a widget as loading and return the settings to fetch with.
    ///
    /// `None` if the widget is not placed. Data is left in place so the last
    /// good snapshot stays visible while loading.
    pub(crate) fn begin_refresh(&mut self, id: &str) -> Option<WidgetSettings> {
        let widget = self.placed.iter_mut().find(|w| w.id == id)?;
        widget.is_loading = true;
        widget.error = None;
        let settings = widget.settings.clone();

        self.notify();
        self.events.emit(DashboardEvent::RefreshStarted { id: id.to_string() });
        Some(settings)
    }

    /// Apply a refresh result and clear the loading flag.
    ///
    /// `result` is `None` when the refresh ended without an answer. A widget
    /// that was removed in the meantime is left alone.
    pub(crate) fn finish_refresh(
        &mut self,
        id: &str,
        result: Option<Result<WeatherReport, DataSourceError>>,
    ) -> RefreshOutcome {
        let Some(widget) = self.placed.iter_mut().find(|w| w.id == id) else {
            log::debug!("Widget {} is gone, dropping refresh result", id);
            let outcome = RefreshOutcome::Discarded;
            self.events.emit(DashboardEvent::RefreshFinished {
                id: id.to_string(),
                outcome: outcome.clone(),
            });
            return outcome;
        };

        let outcome = match result {
            Some(Ok(report)) => {
                widget.data = Some(report.snapshot);
                if let Some(location) = report.location {
                    widget.title = weather_title(&location);
                }
                widget.error = None;
                RefreshOutcome::Updated
            }
            Some(Err(e)) => {
                log::error!("Failed to refresh {} ({}): {}", id, widget.settings.city, e);
                let message = e.to_string();
                widget.error = Some(message.clone());
                RefreshOutcome::Failed(message)
            }
            None => {
                log::warn!("Refresh of {} ended without a result", id);
                RefreshOutcome::Aborted
            }
        };
        widget.is_loading = false;

        self.commit();
        self.events.emit(DashboardEvent::RefreshFinished {
            id: id.to_string(),
            outcome: outcome.clone(),
        });
        outcome
    }

    // ========================================================================
    // Persistence and Notification
    // ========================================================================

    fn commit(&mut self) {
        self.persist();
        self.notify();
    }

    fn persist(&mut self) {
        let document = self.to_document();
        if let Err(e) = self.persistence.save(&document) {
            log::error!("{}", e);
            self.events.emit(DashboardEvent::PersistenceFailed {
                message: e.to_string(),
            });
        }
    }

    fn notify(&self) {
        self.events.emit(DashboardEvent::StateChanged(self.snapshot()));
    }
}
