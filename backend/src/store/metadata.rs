//! Read-only schema snapshot model and the provider that supplies it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;

use super::types::NativeType;
use crate::error::SchemaError;

/// Role of a column in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    PartitionKey,
    ClusteringKey,
    Regular,
    Static,
}

impl ColumnKind {
    pub fn is_primary_key(self) -> bool {
        matches!(self, ColumnKind::PartitionKey | ColumnKind::ClusteringKey)
    }
}

/// On-disk order of a clustering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

impl ClusteringOrder {
    pub fn as_cql(self) -> &'static str {
        match self {
            ClusteringOrder::Asc => "ASC",
            ClusteringOrder::Desc => "DESC",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            ClusteringOrder::Asc => ClusteringOrder::Desc,
            ClusteringOrder::Desc => ClusteringOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: ColumnKind,
    pub native_type: NativeType,
    /// Only meaningful for clustering columns
    pub clustering_order: ClusteringOrder,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, kind: ColumnKind, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            kind,
            native_type,
            clustering_order: ClusteringOrder::Asc,
        }
    }

    /// Build a column from the type text a metadata source reports. Fails
    /// fast on types the gateway cannot represent.
    pub fn parse(
        name: impl Into<String>,
        kind: ColumnKind,
        type_text: &str,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let native_type = type_text
            .parse::<NativeType>()
            .map_err(|_| SchemaError::UnsupportedType {
                column: name.clone(),
                type_name: type_text.trim().to_string(),
            })?;
        Ok(Self::new(name, kind, native_type))
    }

    pub fn with_order(mut self, order: ClusteringOrder) -> Self {
        self.clustering_order = order;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub name: String,
    pub columns: HashMap<String, ColumnMetadata>,
    /// Partition key column names in component order
    pub partition_key: Vec<String>,
    /// Clustering column names in component order
    pub clustering_key: Vec<String>,
}

impl TableMetadata {
    /// Assemble a table from its columns; key lists follow the order in which
    /// key columns are given.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMetadata>) -> Self {
        let mut partition_key = Vec::new();
        let mut clustering_key = Vec::new();
        let mut by_name = HashMap::with_capacity(columns.len());
        for column in columns {
            match column.kind {
                ColumnKind::PartitionKey => partition_key.push(column.name.clone()),
                ColumnKind::ClusteringKey => clustering_key.push(column.name.clone()),
                ColumnKind::Regular | ColumnKind::Static => {}
            }
            by_name.insert(column.name.clone(), column);
        }
        Self {
            name: name.into(),
            columns: by_name,
            partition_key,
            clustering_key,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.get(name)
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.columns
            .get(name)
            .is_some_and(|c| c.kind.is_primary_key())
    }

    /// Columns in a stable order: partition key, clustering key, then the
    /// remaining columns by name.
    pub fn ordered_columns(&self) -> Vec<&ColumnMetadata> {
        let mut out: Vec<&ColumnMetadata> = self
            .partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .filter_map(|name| self.columns.get(name))
            .collect();
        let mut rest: Vec<&ColumnMetadata> = self
            .columns
            .values()
            .filter(|c| !c.kind.is_primary_key())
            .collect();
        rest.sort_by(|a, b| a.name.cmp(&b.name));
        out.extend(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub tables: HashMap<String, TableMetadata>,
    pub replication: BTreeMap<String, String>,
}

impl KeyspaceMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
            replication: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.get(name)
    }

    /// Table names in byte order.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Opaque, comparable schema version token issued by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaVersion(pub String);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of schema snapshots.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch a keyspace, or `KeyspaceNotFound`.
    async fn keyspace(&self, name: &str) -> Result<KeyspaceMetadata, SchemaError>;

    /// All keyspace names, in byte order.
    async fn keyspace_names(&self) -> Result<Vec<String>, SchemaError>;

    /// Current schema version token. Changes whenever any schema changes.
    async fn schema_version(&self) -> Result<SchemaVersion, SchemaError>;
}

/// Keyspaces owned by the store itself; never exposed.
pub const SYSTEM_KEYSPACES: &[&str] = &[
    "system",
    "system_auth",
    "system_schema",
    "system_distributed",
    "system_traces",
    "system_views",
    "system_virtual_schema",
];

pub fn is_system_keyspace(name: &str) -> bool {
    SYSTEM_KEYSPACES.contains(&name)
}
