//! Static admin schema: keyspace introspection and table DDL.
//!
//! Served at `/graphql-schema`. Names given to the DDL mutations are API
//! names; they go through the keyspace's naming context, so tables and
//! columns that do not exist yet get the snake case fallback.

use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, ErrorExtensions, InputObject, Object, Result, Schema,
    SimpleObject,
};
use tracing::{info, warn};

use crate::error::{ResolveError, SchemaError};
use crate::query::ddl::{
    AlterTable, ColumnDef, CreateTable, compile_alter_table, compile_create_table,
    compile_drop_table,
};
use crate::query::{CompiledStatement, TableRef};
use crate::services::SchemaManager;
use crate::store::{
    ClusteringOrder, ColumnKind, ExecutionRequest, KeyspaceMetadata, NativeType, TableMetadata,
};

use super::naming::NamingContext;
use super::resolvers::RequestContext;

pub type AdminSchema = Schema<AdminQuery, AdminMutation, EmptySubscription>;

pub fn build_admin_schema(manager: Arc<SchemaManager>) -> AdminSchema {
    Schema::build(AdminQuery, AdminMutation, EmptySubscription)
        .data(manager)
        .extension(async_graphql::extensions::Tracing)
        .finish()
}

// ============================================================================
// Types
// ============================================================================

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ColumnKindValue {
    PartitionKey,
    ClusteringKey,
    Regular,
    Static,
}

impl From<ColumnKind> for ColumnKindValue {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::PartitionKey => ColumnKindValue::PartitionKey,
            ColumnKind::ClusteringKey => ColumnKindValue::ClusteringKey,
            ColumnKind::Regular => ColumnKindValue::Regular,
            ColumnKind::Static => ColumnKindValue::Static,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ClusteringOrderValue {
    #[default]
    Asc,
    Desc,
}

impl From<ClusteringOrderValue> for ClusteringOrder {
    fn from(order: ClusteringOrderValue) -> Self {
        match order {
            ClusteringOrderValue::Asc => ClusteringOrder::Asc,
            ClusteringOrderValue::Desc => ClusteringOrder::Desc,
        }
    }
}

impl From<ClusteringOrder> for ClusteringOrderValue {
    fn from(order: ClusteringOrder) -> Self {
        match order {
            ClusteringOrder::Asc => ClusteringOrderValue::Asc,
            ClusteringOrder::Desc => ClusteringOrderValue::Desc,
        }
    }
}

#[derive(SimpleObject, Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    /// Field name in the keyspace's generated schema
    pub field_name: Option<String>,
    pub kind: ColumnKindValue,
    /// CQL type text
    #[graphql(name = "type")]
    pub type_name: String,
    pub clustering_order: Option<ClusteringOrderValue>,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    /// Type name in the keyspace's generated schema
    pub type_name: Option<String>,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
    pub columns: Vec<ColumnInfo>,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct ReplicationOption {
    pub key: String,
    pub value: String,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct KeyspaceInfo {
    pub name: String,
    pub replication: Vec<ReplicationOption>,
    pub tables: Vec<TableInfo>,
}

#[derive(InputObject, Debug, Clone)]
pub struct ColumnInput {
    pub name: String,
    /// CQL type text, e.g. `text` or `map<text, int>`
    #[graphql(name = "type")]
    pub type_name: String,
}

#[derive(InputObject, Debug, Clone)]
pub struct ClusteringKeyInput {
    pub name: String,
    #[graphql(name = "type")]
    pub type_name: String,
    #[graphql(default)]
    pub order: ClusteringOrderValue,
}

fn table_info(table: &TableMetadata, naming: Option<&NamingContext>) -> TableInfo {
    let names = naming.and_then(|n| n.table(&table.name));
    TableInfo {
        name: table.name.clone(),
        type_name: names.map(|n| n.type_name.clone()),
        partition_key: table.partition_key.clone(),
        clustering_key: table.clustering_key.clone(),
        columns: table
            .ordered_columns()
            .into_iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                field_name: names.and_then(|n| n.field(&c.name)).map(str::to_string),
                kind: c.kind.into(),
                type_name: c.native_type.to_string(),
                clustering_order: (c.kind == ColumnKind::ClusteringKey)
                    .then(|| c.clustering_order.into()),
            })
            .collect(),
    }
}

fn keyspace_info(metadata: &KeyspaceMetadata, naming: Option<&NamingContext>) -> KeyspaceInfo {
    KeyspaceInfo {
        name: metadata.name.clone(),
        replication: metadata
            .replication
            .iter()
            .map(|(key, value)| ReplicationOption {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
        tables: metadata
            .table_names()
            .into_iter()
            .filter_map(|name| metadata.table(name))
            .map(|t| table_info(t, naming))
            .collect(),
    }
}

fn bad_request(message: impl Into<String>) -> async_graphql::Error {
    ResolveError::BadRequest(message.into()).extend()
}

fn parse_type(type_name: &str) -> Result<NativeType> {
    type_name
        .parse::<NativeType>()
        .map_err(|e| bad_request(e.to_string()))
}

// ============================================================================
// Query Root
// ============================================================================

pub struct AdminQuery;

#[Object]
impl AdminQuery {
    /// All managed keyspaces
    async fn keyspaces(&self, ctx: &Context<'_>) -> Result<Vec<KeyspaceInfo>> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        let mut out = Vec::new();
        for name in manager.managed_keyspaces().await? {
            let metadata = manager.provider().keyspace(&name).await?;
            let published = manager.published(&name);
            out.push(keyspace_info(&metadata, published.as_ref().map(|s| &s.naming)));
        }
        Ok(out)
    }

    async fn keyspace(&self, ctx: &Context<'_>, name: String) -> Result<Option<KeyspaceInfo>> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        if !manager.is_managed(&name) {
            return Ok(None);
        }
        let metadata = match manager.provider().keyspace(&name).await {
            Ok(metadata) => metadata,
            Err(SchemaError::KeyspaceNotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let published = manager.published(&name);
        Ok(Some(keyspace_info(
            &metadata,
            published.as_ref().map(|s| &s.naming),
        )))
    }
}

// ============================================================================
// Mutation Root
// ============================================================================

pub struct AdminMutation;

async fn run_ddl(
    ctx: &Context<'_>,
    manager: &SchemaManager,
    keyspace: &str,
    statement: CompiledStatement,
) -> Result<bool> {
    info!(keyspace = %keyspace, cql = %statement.text, "Executing DDL");
    let mut request = ExecutionRequest::new(statement);
    request.acting_as = ctx
        .data_opt::<RequestContext>()
        .and_then(|r| r.acting_as.clone());
    manager
        .env()
        .execute(request)
        .await
        .map_err(|e| ResolveError::from(e).extend())?;

    // The updater converges anyway; this only makes the change visible sooner.
    if let Err(e) = manager.refresh(keyspace).await {
        warn!(keyspace = %keyspace, error = %e, "Refresh after DDL failed");
    }
    Ok(true)
}

#[Object]
impl AdminMutation {
    #[allow(clippy::too_many_arguments)]
    async fn create_table(
        &self,
        ctx: &Context<'_>,
        keyspace: String,
        name: String,
        partition_keys: Vec<ColumnInput>,
        #[graphql(default)] clustering_keys: Vec<ClusteringKeyInput>,
        #[graphql(default)] values: Vec<ColumnInput>,
        #[graphql(default)] if_not_exists: bool,
    ) -> Result<bool> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        let schema = manager.get(&keyspace).await?;
        let table = schema.naming.to_storage_table(&name);
        let column = |name: &str, type_name: &str| -> Result<ColumnDef> {
            Ok(ColumnDef::new(
                schema.naming.to_storage_column(&table, name),
                parse_type(type_name)?,
            ))
        };
        let create = CreateTable {
            table: TableRef::new(&keyspace, &table),
            partition_key: partition_keys
                .iter()
                .map(|c| column(&c.name, &c.type_name))
                .collect::<Result<_>>()?,
            clustering_key: clustering_keys
                .iter()
                .map(|c| -> Result<(ColumnDef, ClusteringOrder)> {
                    Ok((column(&c.name, &c.type_name)?, c.order.into()))
                })
                .collect::<Result<_>>()?,
            columns: values
                .iter()
                .map(|c| column(&c.name, &c.type_name))
                .collect::<Result<_>>()?,
            if_not_exists,
        };
        let statement = compile_create_table(&create).map_err(|e| ResolveError::from(e).extend())?;
        run_ddl(ctx, manager, &keyspace, statement).await
    }

    async fn alter_table_add(
        &self,
        ctx: &Context<'_>,
        keyspace: String,
        table: String,
        to_add: Vec<ColumnInput>,
    ) -> Result<bool> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        let schema = manager.get(&keyspace).await?;
        let table = schema.naming.to_storage_table(&table);
        let columns = to_add
            .iter()
            .map(|c| -> Result<ColumnDef> {
                Ok(ColumnDef::new(
                    schema.naming.to_storage_column(&table, &c.name),
                    parse_type(&c.type_name)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let statement = compile_alter_table(&TableRef::new(&keyspace, &table), &AlterTable::Add(columns))
            .map_err(|e| ResolveError::from(e).extend())?;
        run_ddl(ctx, manager, &keyspace, statement).await
    }

    async fn alter_table_drop(
        &self,
        ctx: &Context<'_>,
        keyspace: String,
        table: String,
        to_drop: Vec<String>,
    ) -> Result<bool> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        let schema = manager.get(&keyspace).await?;
        let table = schema.naming.to_storage_table(&table);
        let columns = to_drop
            .iter()
            .map(|c| schema.naming.to_storage_column(&table, c))
            .collect();
        let statement = compile_alter_table(&TableRef::new(&keyspace, &table), &AlterTable::Drop(columns))
            .map_err(|e| ResolveError::from(e).extend())?;
        run_ddl(ctx, manager, &keyspace, statement).await
    }

    async fn drop_table(
        &self,
        ctx: &Context<'_>,
        keyspace: String,
        table: String,
        #[graphql(default)] if_exists: bool,
    ) -> Result<bool> {
        let manager = ctx.data::<Arc<SchemaManager>>()?;
        let table = manager.get(&keyspace).await?.naming.to_storage_table(&table);
        let statement = compile_drop_table(&TableRef::new(&keyspace, &table), if_exists);
        run_ddl(ctx, manager, &keyspace, statement).await
    }
}
