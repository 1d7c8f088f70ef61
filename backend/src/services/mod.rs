//! Long-running services and the schema lifecycle

pub mod http_server;
pub mod manager;
pub mod schema_manager;
pub mod schema_updater;

pub use http_server::HttpServerService;
pub use manager::{HealthStatus, Service, ServiceHealth, ServicesManager, ServicesManagerBuilder};
pub use schema_manager::SchemaManager;
pub use schema_updater::{
    IntervalTicker, RefreshOutcome, SchemaUpdater, Ticker, UpdaterState,
};
