//! cqlgate: a GraphQL gateway generated from live wide-column store schemas.
//!
//! Each managed keyspace is served by its own schema, rebuilt in the
//! background whenever the store's schema version changes.

pub mod api;
pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod graphql;
pub mod query;
pub mod services;
pub mod store;

pub use app::{AppState, build_app};
pub use config::Config;
