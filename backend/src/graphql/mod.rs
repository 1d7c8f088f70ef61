//! GraphQL surface generated from store metadata.
//!
//! Every keyspace gets its own dynamic schema: [naming] assigns names,
//! [types] derives the type graph, [schema] materializes it and [resolvers]
//! turn field arguments into statements. The static [admin] schema covers
//! introspection and DDL.

pub mod admin;
pub mod naming;
pub mod resolvers;
pub mod schema;
pub mod types;

pub use admin::{AdminSchema, build_admin_schema};
pub use naming::{NameCase, NamingConfig, NamingContext};
pub use resolvers::{ExecutionDefaults, ExecutionEnv, RequestContext};
pub use schema::{KeyspaceSchema, build_keyspace_schema};
pub use types::TypeGraph;
