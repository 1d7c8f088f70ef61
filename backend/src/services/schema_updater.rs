//! Schema updater service: polls the store's schema version and republishes
//! a keyspace's schema when it changes.
//!
//! One background task per managed keyspace. A failed rebuild leaves the
//! previous snapshot published and the observed version untouched, so the
//! next tick retries. Stopping interrupts the wait between ticks but lets a
//! rebuild that is already running finish.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::manager::{Service, ServiceHealth};
use crate::services::schema_manager::SchemaManager;

/// Source of poll ticks.
#[async_trait]
pub trait Ticker: Send + 'static {
    async fn tick(&mut self);
}

/// Production ticker; the first tick completes immediately.
pub struct IntervalTicker(Interval);

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(interval)
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdaterState {
    Initializing,
    Serving,
    Refreshing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Unchanged,
    Rebuilt,
    Failed(String),
}

/// Shared between the service handle and its background task.
struct UpdaterShared {
    keyspace: String,
    manager: Arc<SchemaManager>,
    state: RwLock<UpdaterState>,
    last_error: RwLock<Option<String>>,
}

impl UpdaterShared {
    async fn poll(&self) -> RefreshOutcome {
        let current = match self.manager.provider().schema_version().await {
            Ok(version) => version,
            Err(e) => return self.failed(e.to_string()),
        };
        if self.manager.published_version(&self.keyspace).as_ref() == Some(&current) {
            debug!(keyspace = %self.keyspace, version = %current, "Schema unchanged");
            return RefreshOutcome::Unchanged;
        }

        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, UpdaterState::Refreshing)
        };
        let outcome = match self.manager.refresh(&self.keyspace).await {
            Ok(schema) => {
                info!(keyspace = %self.keyspace, version = %schema.version, "Schema rebuilt");
                *self.last_error.write() = None;
                RefreshOutcome::Rebuilt
            }
            Err(e) => self.failed(e.to_string()),
        };
        let next = match (&outcome, previous) {
            (RefreshOutcome::Rebuilt, _) => UpdaterState::Serving,
            // Nothing was ever published; keep trying.
            (_, UpdaterState::Initializing) => UpdaterState::Initializing,
            _ => UpdaterState::Serving,
        };
        *self.state.write() = next;
        outcome
    }

    fn failed(&self, error: String) -> RefreshOutcome {
        warn!(keyspace = %self.keyspace, error = %error, "Schema refresh failed, keeping previous schema");
        *self.last_error.write() = Some(error.clone());
        RefreshOutcome::Failed(error)
    }

    async fn run(self: Arc<Self>, mut ticker: impl Ticker, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // Not raced against the token: a rebuild in flight completes.
            self.poll().await;
        }
        *self.state.write() = UpdaterState::Stopped;
        info!(keyspace = %self.keyspace, "Schema updater stopped");
    }
}

/// Keeps one keyspace's published schema in step with the store.
pub struct SchemaUpdater {
    shared: Arc<UpdaterShared>,
    name: String,
    interval: Duration,
    cancel: RwLock<Option<CancellationToken>>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl SchemaUpdater {
    pub fn new(manager: Arc<SchemaManager>, keyspace: impl Into<String>, interval: Duration) -> Self {
        let keyspace = keyspace.into();
        Self {
            name: format!("schema-updater:{}", keyspace),
            shared: Arc::new(UpdaterShared {
                keyspace,
                manager,
                state: RwLock::new(UpdaterState::Initializing),
                last_error: RwLock::new(None),
            }),
            interval,
            cancel: RwLock::new(None),
            handle: RwLock::new(None),
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.shared.keyspace
    }

    pub fn state(&self) -> UpdaterState {
        *self.shared.state.read()
    }

    /// Run one poll now.
    pub async fn poll(&self) -> RefreshOutcome {
        self.shared.poll().await
    }

    /// Start the loop with a custom ticker.
    pub fn spawn_with(&self, ticker: impl Ticker) {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.shared.clone().run(ticker, token.clone()));
        *self.cancel.write() = Some(token);
        *self.handle.write() = Some(task);
    }

    /// Signal the loop to stop and wait for it.
    pub async fn shutdown(&self) {
        if let Some(token) = self.cancel.write().take() {
            token.cancel();
        }
        let handle = self.handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.shared.state.write() = UpdaterState::Stopped;
    }
}

#[async_trait]
impl Service for SchemaUpdater {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if self.handle.read().is_some() {
            return Ok(());
        }
        *self.shared.state.write() = match self.shared.manager.published(&self.shared.keyspace) {
            Some(_) => UpdaterState::Serving,
            None => UpdaterState::Initializing,
        };
        info!(
            service = %self.name,
            keyspace = %self.shared.keyspace,
            interval_secs = self.interval.as_secs(),
            "Schema updater starting"
        );
        self.spawn_with(IntervalTicker::new(self.interval));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown().await;
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let error = self.shared.last_error.read().clone();
        Ok(match (self.state(), error) {
            (UpdaterState::Stopped, _) => ServiceHealth::unhealthy("updater stopped"),
            (UpdaterState::Initializing, Some(e)) => {
                ServiceHealth::unhealthy(format!("keyspace never built: {}", e))
            }
            (_, Some(e)) => ServiceHealth::degraded(format!("serving previous schema: {}", e)),
            _ => ServiceHealth::healthy(),
        })
    }
}
