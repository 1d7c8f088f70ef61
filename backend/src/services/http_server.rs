//! HTTP server service: binds the Axum app and runs it in a background task.
//!
//! Depends on every schema updater so the first published schemas exist before
//! the listener opens. Start order is ensured by the service manager.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::app::{AppState, build_app};
use crate::config::Config;
use crate::graphql::AdminSchema;
use crate::services::SchemaManager;
use crate::services::manager::{Service, ServiceHealth, ServicesManager};

/// HTTP server service: binds and serves the Axum app in a background task.
pub struct HttpServerService {
    /// Held weakly; the manager owns this service.
    services: Weak<ServicesManager>,
    config: Arc<Config>,
    schemas: Arc<SchemaManager>,
    admin: AdminSchema,
    dependencies: Vec<String>,
    /// JoinHandle for the server task; set in start(), taken in stop().
    join_handle: parking_lot::RwLock<Option<tokio::task::JoinHandle<Result<()>>>>,
    /// Send to trigger server shutdown; set in start(), taken in stop().
    shutdown_tx: parking_lot::RwLock<Option<broadcast::Sender<()>>>,
}

impl HttpServerService {
    pub fn new(
        services: Weak<ServicesManager>,
        config: Arc<Config>,
        schemas: Arc<SchemaManager>,
        admin: AdminSchema,
    ) -> Self {
        Self {
            services,
            config,
            schemas,
            admin,
            dependencies: Vec::new(),
            join_handle: parking_lot::RwLock::new(None),
            shutdown_tx: parking_lot::RwLock::new(None),
        }
    }

    /// Services that must be running before the listener opens.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[async_trait]
impl Service for HttpServerService {
    fn name(&self) -> &str {
        "http"
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn start(&self) -> Result<()> {
        if self.join_handle.read().is_some() {
            return Ok(());
        }
        info!(service = "http", "HTTP server service starting");

        let services = self
            .services
            .upgrade()
            .ok_or_else(|| anyhow!("services manager dropped"))?;
        let state = AppState {
            config: self.config.clone(),
            schemas: self.schemas.clone(),
            admin: self.admin.clone(),
            services,
        };

        let app = build_app(state);
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("HTTP server: bind failed")?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        let serve_fut = axum::serve(listener, app);
        let join = tokio::spawn(async move {
            tokio::select! {
                result = serve_fut => result.context("axum::serve"),
                _ = shutdown_rx.recv() => Ok(()),
            }
        });

        *self.join_handle.write() = Some(join);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        let host = self.config.host.as_deref().unwrap_or("localhost");
        info!(
            service = "http",
            "Listening on http://{}; GraphQL: http://{}:{}/graphql/{{keyspace}}",
            addr,
            host,
            self.config.port
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let tx = self.shutdown_tx.write().take();
        let handle = self.join_handle.write().take();
        drop(tx); // dropping the sender unblocks the server task's recv
        if let Some(h) = handle {
            let _ = h.await;
        }
        info!(service = "http", "HTTP server service stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        match self.join_handle.read().as_ref() {
            Some(h) if !h.is_finished() => Ok(ServiceHealth::healthy()),
            Some(_) => Ok(ServiceHealth::unhealthy("server task exited")),
            None => Ok(ServiceHealth::unhealthy("server task not running")),
        }
    }
}
