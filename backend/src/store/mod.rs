//! The store-facing side: native types, values, schema metadata and the
//! executor seam, plus the in-process memory store.

pub mod executor;
pub mod memory;
pub mod metadata;
pub mod types;
pub mod value;

pub use executor::{
    APPLIED_COLUMN, Consistency, ExecutionRequest, PageState, ResultSet, Row, SerialConsistency,
    StatementExecutor,
};
pub use memory::MemoryStore;
pub use metadata::{
    ClusteringOrder, ColumnKind, ColumnMetadata, KeyspaceMetadata, MetadataProvider,
    SchemaVersion, TableMetadata, is_system_keyspace,
};
pub use types::NativeType;
pub use value::StorageValue;
