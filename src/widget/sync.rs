// SPDX-License-Identifier: MPL-2.0

//! # Widget Sync Engine
//!
//! Refreshes placed widgets from a [`WeatherSource`], one task per refresh.
//!
//! ## Refresh Cycle
//!
//! 1. Under the store lock: mark the widget loading, clear its error
//! 2. Without the lock: await the data source
//! 3. Under the store lock: store the snapshot or the error message, clear
//!    the loading flag, persist, notify
//!
//! Step 3 is owned by a [`RefreshGuard`] and runs from its `Drop` if the
//! task never gets there, e.g. when the refresh task is aborted. A widget
//! that was removed during step 2 is left alone.
//!
//! ## Concurrency
//!
//! Refreshes of different widgets are independent. Two refreshes of the same
//! widget may overlap; whichever finishes last wins.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;

use crate::error::DataSourceError;

use super::events::RefreshOutcome;
use super::store::{lock_store, SharedStore};
use super::weather::{WeatherReport, WeatherSource};

/// Drives per-widget refreshes against a shared store.
pub struct WidgetSyncEngine<S> {
    store: SharedStore,
    source: Arc<S>,
}

impl<S> Clone for WidgetSyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S> WidgetSyncEngine<S>
where
    S: WeatherSource + Sync + 'static,
{
    pub fn new(store: SharedStore, source: Arc<S>) -> Self {
        Self { store, source }
    }

    /// Refresh one placed widget and wait for the result.
    ///
    /// `None` if `id` is not on the dashboard.
    pub async fn refresh(&self, id: &str) -> Option<RefreshOutcome> {
        let settings = {
            let mut store = lock_store(&self.store);
            store.begin_refresh(id)
        }?;

        let guard = RefreshGuard::new(Arc::clone(&self.store), id.to_string());
        log::debug!("Refreshing {} for {} ({})", id, settings.city, settings.units);
        let result = self.source.fetch_weather(&settings.city, settings.units).await;
        Some(guard.finish(result))
    }

    /// Run [`refresh`](Self::refresh) as its own task.
    pub fn spawn_refresh(&self, id: impl Into<String>) -> JoinHandle<Option<RefreshOutcome>> {
        let engine = self.clone();
        let id = id.into();
        tokio::spawn(async move { engine.refresh(&id).await })
    }

    /// Spawn a refresh for every placed widget.
    pub fn spawn_refresh_all(&self) -> Vec<JoinHandle<Option<RefreshOutcome>>> {
        let ids: Vec<String> = lock_store(&self.store)
            .placed_in_order()
            .into_iter()
            .map(|w| w.id.clone())
            .collect();
        self.spawn_many(ids)
    }

    /// Spawn one refresh per id.
    pub fn spawn_many(&self, ids: Vec<String>) -> Vec<JoinHandle<Option<RefreshOutcome>>> {
        ids.into_iter().map(|id| self.spawn_refresh(id)).collect()
    }
}

/// Wait for a batch of spawned refreshes, dropping panicked tasks.
pub async fn join_refreshes(
    handles: Vec<JoinHandle<Option<RefreshOutcome>>>,
) -> Vec<Option<RefreshOutcome>> {
    join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("Refresh task failed: {}", e);
                None
            }
        })
        .collect()
}

// ============================================================================
// Finalization Guard
// ============================================================================

/// Guarantees the end-of-refresh bookkeeping runs exactly once.
struct RefreshGuard {
    store: SharedStore,
    id: String,
    finished: bool,
}

impl RefreshGuard {
    fn new(store: SharedStore, id: String) -> Self {
        Self {
            store,
            id,
            finished: false,
        }
    }

    fn finish(mut self, result: Result<WeatherReport, DataSourceError>) -> RefreshOutcome {
        self.finished = true;
        lock_store(&self.store).finish_refresh(&self.id, Some(result))
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.finished {
            lock_store(&self.store).finish_refresh(&self.id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::events::{DashboardEvent, EventBus};
    use crate::widget::model::{AvailableWidgetRecord, PersistedDocument, Units, WidgetRecord, WidgetSettings};
    use crate::widget::storage::MemoryStore;
    use crate::widget::store::WidgetStore;
    use crate::widget::weather::{sample_report, ScriptedSource};

    fn placed(id: &str, city: &str, position: usize) -> WidgetRecord {
        WidgetRecord::from_available(
            AvailableWidgetRecord::new(id, city, WidgetSettings::new(city, Units::Metric)),
            position,
        )
    }

    fn setup(source: ScriptedSource) -> (WidgetSyncEngine<ScriptedSource>, SharedStore, Arc<ScriptedSource>, EventBus) {
        let backing = MemoryStore::with_document(&PersistedDocument {
            dashboard_widgets: vec![placed("w1", "Moscow", 0), placed("w2", "London", 1)],
            available_widgets: Vec::new(),
            version: "2.0".into(),
        });
        let events = EventBus::new();
        let mut store = WidgetStore::new(Box::new(backing), events.clone());
        store.initialize();
        let store = store.into_shared();
        let source = Arc::new(source);
        (WidgetSyncEngine::new(Arc::clone(&store), Arc::clone(&source)), store, source, events)
    }

    #[tokio::test]
    async fn test_refresh_success_stores_snapshot() {
        let source = ScriptedSource::new();
        source.respond("Moscow", Ok(sample_report("Moscow", -3.0)));
        let (engine, store, _, _) = setup(source);

        let outcome = engine.refresh("w1").await;

        assert_eq!(outcome, Some(RefreshOutcome::Updated));
        let store = lock_store(&store);
        let widget = store.get("w1").unwrap();
        assert_eq!(widget.data.as_ref().unwrap().temperature, -3.0);
        assert_eq!(widget.title, "Weather in Moscow");
        assert!(!widget.is_loading);
        assert!(widget.error.is_none());
    }

    #[tokio::test]
    async fn test_refresh_unknown_widget_is_noop() {
        let (engine, _, source, _) = setup(ScriptedSource::new());
        assert_eq!(engine.refresh("missing").await, None);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let source = ScriptedSource::new();
        source
            .respond("London", Ok(sample_report("London", 14.0)))
            .respond("London", Err(DataSourceError::Transport("timed out".into())));
        let (engine, store, _, _) = setup(source);

        engine.refresh("w2").await;
        let good = lock_store(&store).get("w2").unwrap().data.clone();
        let outcome = engine.refresh("w2").await;

        assert!(matches!(outcome, Some(RefreshOutcome::Failed(_))));
        let store = lock_store(&store);
        let widget = store.get("w2").unwrap();
        assert_eq!(widget.data, good);
        assert_eq!(widget.error.as_deref(), Some("Network error: timed out"));
        assert!(!widget.is_loading);
    }

    #[tokio::test]
    async fn test_events_follow_refresh_cycle() {
        let source = ScriptedSource::new();
        source.respond("Moscow", Err(DataSourceError::Unauthorized));
        let (engine, _, _, events) = setup(source);
        let mut rx = events.subscribe();

        engine.refresh("w1").await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                DashboardEvent::StateChanged(_) => "changed",
                DashboardEvent::RefreshStarted { .. } => "started",
                DashboardEvent::RefreshFinished { .. } => "finished",
                DashboardEvent::PersistenceFailed { .. } => "persist-failed",
            });
        }
        assert_eq!(kinds, vec!["changed", "started", "changed", "finished"]);
    }

    #[tokio::test]
    async fn test_loading_flag_visible_while_in_flight() {
        let source = ScriptedSource::held();
        source.respond("Moscow", Ok(sample_report("Moscow", 5.0)));
        let (engine, store, source, _) = setup(source);

        let handle = engine.spawn_refresh("w1");
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(lock_store(&store).get("w1").unwrap().is_loading);

        source.release(1);
        assert_eq!(handle.await.unwrap(), Some(RefreshOutcome::Updated));
        assert!(!lock_store(&store).get("w1").unwrap().is_loading);
    }

    #[tokio::test]
    async fn test_removed_while_in_flight_is_discarded() {
        let source = ScriptedSource::held();
        source.respond("Moscow", Ok(sample_report("Moscow", 5.0)));
        let (engine, store, source, _) = setup(source);

        let handle = engine.spawn_refresh("w1");
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        lock_store(&store).remove_widget("w1");
        source.release(1);

        assert_eq!(handle.await.unwrap(), Some(RefreshOutcome::Discarded));
        let store = lock_store(&store);
        assert!(store.get("w1").is_none());
        assert!(store.get_available("w1").is_some());
    }

    #[tokio::test]
    async fn test_aborted_refresh_still_clears_loading() {
        let (engine, store, source, _) = setup(ScriptedSource::held());

        let handle = engine.spawn_refresh("w2");
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let store = lock_store(&store);
        let widget = store.get("w2").unwrap();
        assert!(!widget.is_loading);
        assert!(widget.error.is_none());
    }

    #[tokio::test]
    async fn test_independent_widgets_refresh_concurrently() {
        let source = ScriptedSource::new();
        source
            .respond("Moscow", Ok(sample_report("Moscow", 1.0)))
            .respond("London", Err(DataSourceError::NotFound));
        let (engine, store, _, _) = setup(source);

        let outcomes = join_refreshes(engine.spawn_refresh_all()).await;

        assert_eq!(outcomes.len(), 2);
        let store = lock_store(&store);
        assert!(store.get("w1").unwrap().data.is_some());
        assert_eq!(store.get("w2").unwrap().error.as_deref(), Some("City not found"));
    }

    #[tokio::test]
    async fn test_same_widget_last_completion_wins() {
        let source = ScriptedSource::held();
        source
            .respond("Moscow", Ok(sample_report("Moscow", 1.0)))
            .respond("Moscow", Ok(sample_report("Moscow", 2.0)));
        let (engine, store, source, _) = setup(source);

        let first = engine.spawn_refresh("w1");
        let second = engine.spawn_refresh("w1");
        while source.calls() < 2 {
            tokio::task::yield_now().await;
        }
        source.release(2);
        first.await.unwrap();
        second.await.unwrap();

        let store = lock_store(&store);
        let widget = store.get("w1").unwrap();
        assert_eq!(widget.data.as_ref().unwrap().temperature, 2.0);
        assert!(!widget.is_loading);
    }
}
