//! YAML seed data for the memory store.
//!
//! ```yaml
//! keyspaces:
//!   - name: library
//!     replication: { class: SimpleStrategy, replication_factor: "1" }
//!     tables:
//!       - name: books
//!         columns:
//!           - { name: shelf, type: int, kind: partition_key }
//!           - { name: isbn, type: text, kind: clustering_key, order: desc }
//!           - { name: tags, type: "set<text>" }
//!         rows:
//!           - { shelf: 1, isbn: "978-0441013593", tags: ["sf"] }
//! ```
//!
//! Row values use the wire representation and go through the codec, so map
//! columns are written as lists of `{key, value}` objects.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::MemoryStore;
use crate::codec::{self, WireValue};
use crate::query::{Insert, TableRef, compile_insert};
use crate::store::{
    ClusteringOrder, ColumnKind, ColumnMetadata, ExecutionRequest, StatementExecutor,
    TableMetadata,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub keyspaces: Vec<SeedKeyspace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedKeyspace {
    pub name: String,
    #[serde(default)]
    pub replication: BTreeMap<String, String>,
    #[serde(default)]
    pub tables: Vec<SeedTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTable {
    pub name: String,
    pub columns: Vec<SeedColumn>,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub kind: SeedColumnKind,
    #[serde(default)]
    pub order: SeedOrder,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedColumnKind {
    PartitionKey,
    ClusteringKey,
    #[default]
    Regular,
    Static,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOrder {
    #[default]
    Asc,
    Desc,
}

/// Result of applying a seed.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub tables_seeded: Vec<String>,
    pub rows_inserted: usize,
    pub errors: Vec<String>,
}

impl Seed {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse seed YAML")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::from_yaml(&text)
    }
}

impl SeedTable {
    fn metadata(&self) -> Result<TableMetadata> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let kind = match c.kind {
                    SeedColumnKind::PartitionKey => ColumnKind::PartitionKey,
                    SeedColumnKind::ClusteringKey => ColumnKind::ClusteringKey,
                    SeedColumnKind::Regular => ColumnKind::Regular,
                    SeedColumnKind::Static => ColumnKind::Static,
                };
                let order = match c.order {
                    SeedOrder::Asc => ClusteringOrder::Asc,
                    SeedOrder::Desc => ClusteringOrder::Desc,
                };
                Ok(ColumnMetadata::parse(&c.name, kind, &c.type_name)?.with_order(order))
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid column definition in table {}", self.name))?;
        let table = TableMetadata::new(&self.name, columns);
        if table.partition_key.is_empty() {
            anyhow::bail!("Table {} has no partition key column", self.name);
        }
        Ok(table)
    }
}

impl MemoryStore {
    /// Create the seed's keyspaces and tables, then insert its rows. Row
    /// failures are collected rather than aborting the seed.
    pub async fn apply_seed(&self, seed: &Seed) -> Result<SeedResult> {
        let mut result = SeedResult::default();
        for keyspace in &seed.keyspaces {
            if self.create_keyspace(&keyspace.name, keyspace.replication.clone()) {
                info!(keyspace = %keyspace.name, "Created keyspace from seed");
            }
            for table in &keyspace.tables {
                let metadata = table.metadata()?;
                self.put_table(&keyspace.name, metadata.clone())
                    .with_context(|| format!("Failed to create table {}", table.name))?;
                result
                    .tables_seeded
                    .push(format!("{}.{}", keyspace.name, table.name));

                for (index, row) in table.rows.iter().enumerate() {
                    match self.seed_row(&keyspace.name, &metadata, row).await {
                        Ok(()) => result.rows_inserted += 1,
                        Err(e) => {
                            warn!(
                                keyspace = %keyspace.name,
                                table = %table.name,
                                row = index,
                                error = %e,
                                "Failed to seed row"
                            );
                            result
                                .errors
                                .push(format!("{}.{}[{}]: {}", keyspace.name, table.name, index, e));
                        }
                    }
                }
                debug!(keyspace = %keyspace.name, table = %table.name, rows = table.rows.len(), "Seeded table");
            }
        }
        Ok(result)
    }

    async fn seed_row(
        &self,
        keyspace: &str,
        table: &TableMetadata,
        row: &BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let mut insert = Insert::new(TableRef::new(keyspace, &table.name));
        for (name, json) in row {
            let column = table
                .column(name)
                .with_context(|| format!("Unknown column {}", name))?;
            let wire = WireValue::from_json(json).map_err(anyhow::Error::msg)?;
            let value = codec::decode(&column.native_type, &wire).map_err(|e| e.within(name))?;
            insert.columns.push(name.clone());
            insert.values.push(value);
        }
        let statement = compile_insert(&insert)?;
        self.execute(ExecutionRequest::new(statement)).await?;
        Ok(())
    }

    /// Build a store from a seed file.
    pub async fn from_seed_file(path: &Path) -> Result<Self> {
        let seed = Seed::load(path).await?;
        let store = Self::new();
        let result = store.apply_seed(&seed).await?;
        info!(
            tables = result.tables_seeded.len(),
            rows = result.rows_inserted,
            errors = result.errors.len(),
            "Memory store seeded"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetadataProvider, NativeType, StorageValue};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SEED: &str = r#"
keyspaces:
  - name: library
    replication: { class: SimpleStrategy, replication_factor: "1" }
    tables:
      - name: books
        columns:
          - { name: shelf, type: int, kind: partition_key }
          - { name: isbn, type: text, kind: clustering_key, order: desc }
          - { name: ratings, type: "map<text, int>" }
        rows:
          - { shelf: 1, isbn: "a", ratings: [{ key: "x", value: 5 }] }
          - { shelf: 1, isbn: "b", ratings: "not a list" }
"#;

    #[tokio::test]
    async fn test_apply_seed_creates_schema_and_rows() {
        let store = MemoryStore::new();
        let result = store.apply_seed(&Seed::from_yaml(SEED).unwrap()).await.unwrap();
        assert_eq!(result.tables_seeded, vec!["library.books".to_string()]);
        assert_eq!(result.rows_inserted, 1);
        assert_eq!(result.errors.len(), 1);

        let keyspace = store.keyspace("library").await.unwrap();
        assert_eq!(keyspace.replication["class"], "SimpleStrategy");
        let books = keyspace.table("books").unwrap();
        assert_eq!(
            books.column("ratings").unwrap().native_type,
            NativeType::map(NativeType::Text, NativeType::Int)
        );
        assert_eq!(books.column("isbn").unwrap().clustering_order, ClusteringOrder::Desc);
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();
        let store = MemoryStore::from_seed_file(file.path()).await.unwrap();
        assert_eq!(store.keyspace_names().await.unwrap(), vec!["library".to_string()]);

        let select = crate::query::compile_select(&crate::query::Select::new(TableRef::new(
            "library", "books",
        )))
        .unwrap();
        let rows = store.execute(ExecutionRequest::new(select)).await.unwrap().rows;
        assert_eq!(
            rows[0].get("ratings"),
            Some(&StorageValue::Map(vec![(
                StorageValue::Text("x".into()),
                StorageValue::Int(5)
            )]))
        );
    }

    #[test]
    fn test_rejects_unknown_types() {
        let seed = Seed::from_yaml(
            "keyspaces: [{ name: k, tables: [{ name: t, columns: [{ name: d, type: duration, kind: partition_key }] }] }]",
        )
        .unwrap();
        assert!(seed.keyspaces[0].tables[0].metadata().is_err());
    }
}
