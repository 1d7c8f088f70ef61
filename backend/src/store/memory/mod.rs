//! In-process store implementing both the metadata provider and the
//! statement executor.
//!
//! It interprets the statements the compilers emit, with the semantics the
//! gateway relies on: upserts, conditional writes that report `[applied]`,
//! clustering order, paging, row TTLs, static columns shared by a partition,
//! and a schema version that changes on every DDL.

mod parser;
pub mod seed;

pub use parser::{Conditional, Statement, parse};
pub use seed::{Seed, SeedResult};

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::executor::{APPLIED_COLUMN, ExecutionRequest, PageState, ResultSet, Row, StatementExecutor};
use super::metadata::{
    ClusteringOrder, ColumnKind, ColumnMetadata, KeyspaceMetadata, MetadataProvider,
    SchemaVersion, TableMetadata, is_system_keyspace,
};
use super::value::StorageValue;
use crate::error::{ExecutionError, SchemaError};
use crate::query::ddl::{AlterTable, CreateTable};
use crate::query::{Operator, OrderBy, Predicate, TableRef};

/// Page state tokens are base64 of `cursor:{offset}`.
pub fn encode_page_state(offset: usize) -> PageState {
    PageState(BASE64.encode(format!("cursor:{}", offset)))
}

pub fn decode_page_state(state: &PageState) -> Result<usize, ExecutionError> {
    let bad = || ExecutionError::Invalid("invalid page state".to_string());
    let decoded = BASE64.decode(state.as_str()).map_err(|_| bad())?;
    let text = String::from_utf8(decoded).map_err(|_| bad())?;
    text.strip_prefix("cursor:")
        .and_then(|offset| offset.parse().ok())
        .ok_or_else(bad)
}

fn invalid(message: impl Into<String>) -> ExecutionError {
    ExecutionError::Invalid(message.into())
}

#[derive(Debug, Clone)]
struct StoredRow {
    values: HashMap<String, StorageValue>,
    expires_at: Option<Instant>,
}

impl StoredRow {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn get(&self, column: &str) -> &StorageValue {
        self.values.get(column).unwrap_or(&StorageValue::Null)
    }

    fn matches(&self, predicates: &[Predicate]) -> bool {
        predicates.iter().all(|p| predicate_holds(p, self.get(&p.column)))
    }

    fn to_row(&self, table: &TableMetadata) -> Row {
        table
            .ordered_columns()
            .into_iter()
            .map(|c| (c.name.clone(), self.get(&c.name).clone()))
            .collect()
    }
}

fn predicate_holds(predicate: &Predicate, value: &StorageValue) -> bool {
    let ordering = value.compare(&predicate.value);
    match predicate.op {
        Operator::Eq => ordering == Some(Ordering::Equal),
        Operator::NotEq => ordering != Some(Ordering::Equal),
        Operator::Gt => ordering == Some(Ordering::Greater),
        Operator::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => ordering == Some(Ordering::Less),
        Operator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Operator::In => match &predicate.value {
            StorageValue::List(items) | StorageValue::Set(items) => items
                .iter()
                .any(|item| value.compare(item) == Some(Ordering::Equal)),
            _ => false,
        },
    }
}

/// Sets hold sorted distinct elements and maps sorted distinct keys.
fn normalize(value: StorageValue) -> StorageValue {
    let order = |a: &StorageValue, b: &StorageValue| a.compare(b).unwrap_or(Ordering::Equal);
    match value {
        StorageValue::Set(items) => {
            let mut items: Vec<StorageValue> = items.into_iter().map(normalize).collect();
            items.sort_by(order);
            items.dedup_by(|a, b| order(a, b) == Ordering::Equal);
            StorageValue::Set(items)
        }
        StorageValue::Map(entries) => {
            let mut entries: Vec<(StorageValue, StorageValue)> = entries
                .into_iter()
                .map(|(k, v)| (normalize(k), normalize(v)))
                .collect();
            entries.sort_by(|(a, _), (b, _)| order(a, b));
            entries.dedup_by(|(a, _), (b, _)| order(a, b) == Ordering::Equal);
            StorageValue::Map(entries)
        }
        StorageValue::List(items) => StorageValue::List(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

fn expiry(ttl: Option<i32>, now: Instant) -> Option<Instant> {
    ttl.filter(|t| *t > 0)
        .map(|t| now + Duration::from_secs(t as u64))
}

fn applied_row(applied: bool, current: Option<(&StoredRow, &TableMetadata)>) -> ResultSet {
    let mut columns = vec![(APPLIED_COLUMN.to_string(), StorageValue::Boolean(applied))];
    if let Some((row, table)) = current {
        columns.extend(row.to_row(table).iter().map(|(n, v)| (n.to_string(), v.clone())));
    }
    ResultSet {
        rows: vec![Row::new(columns)],
        page_state: None,
    }
}

fn same_partition(a: &[StorageValue], b: &[StorageValue]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.compare(y) == Some(Ordering::Equal))
}

/// Rows of one table plus the static cells of each partition.
#[derive(Default)]
struct TableData {
    rows: Vec<StoredRow>,
    statics: Vec<(Vec<StorageValue>, HashMap<String, StorageValue>)>,
}

impl TableData {
    fn partition_key(table: &TableMetadata, values: &HashMap<String, StorageValue>) -> Vec<StorageValue> {
        table
            .partition_key
            .iter()
            .map(|name| values.get(name).cloned().unwrap_or(StorageValue::Null))
            .collect()
    }

    fn statics_mut(&mut self, partition: Vec<StorageValue>) -> &mut HashMap<String, StorageValue> {
        let index = match self.statics.iter().position(|(k, _)| same_partition(k, &partition)) {
            Some(index) => index,
            None => {
                self.statics.push((partition, HashMap::new()));
                self.statics.len() - 1
            }
        };
        &mut self.statics[index].1
    }

    fn drop_statics(&mut self, partition: &[StorageValue]) {
        self.statics.retain(|(k, _)| !same_partition(k, partition));
    }

    /// A row as readers see it: its own cells plus its partition's statics.
    fn materialize(&self, table: &TableMetadata, row: &StoredRow) -> StoredRow {
        let mut merged = row.clone();
        let partition = Self::partition_key(table, &row.values);
        if let Some((_, cells)) = self.statics.iter().find(|(k, _)| same_partition(k, &partition)) {
            merged
                .values
                .extend(cells.iter().map(|(n, v)| (n.clone(), v.clone())));
        }
        merged
    }

    /// Split written cells into row cells and static cells; the statics go
    /// straight to the partition.
    fn write_statics(
        &mut self,
        table: &TableMetadata,
        partition: Vec<StorageValue>,
        cells: Vec<(String, StorageValue)>,
    ) -> Vec<(String, StorageValue)> {
        let (statics, regular): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .partition(|(name, _)| table.column(name).is_some_and(|c| c.kind == ColumnKind::Static));
        if !statics.is_empty() {
            self.statics_mut(partition).extend(statics);
        }
        regular
    }
}

struct KeyspaceData {
    metadata: KeyspaceMetadata,
    tables: HashMap<String, TableData>,
}

struct StoreState {
    keyspaces: BTreeMap<String, KeyspaceData>,
    version: SchemaVersion,
}

impl StoreState {
    fn bump_version(&mut self) {
        self.version = SchemaVersion(Uuid::new_v4().to_string());
    }

    fn keyspace_mut(&mut self, table: &TableRef) -> Result<&mut KeyspaceData, ExecutionError> {
        let name = table
            .keyspace
            .as_deref()
            .ok_or_else(|| invalid("No keyspace has been specified"))?;
        self.keyspaces
            .get_mut(name)
            .ok_or_else(|| invalid(format!("Keyspace {} does not exist", name)))
    }

    fn table_mut(
        &mut self,
        table: &TableRef,
    ) -> Result<(&TableMetadata, &mut TableData), ExecutionError> {
        let keyspace = self.keyspace_mut(table)?;
        let metadata = keyspace
            .metadata
            .tables
            .get(&table.table)
            .ok_or_else(|| invalid(format!("unconfigured table {}", table.table)))?;
        let data = keyspace.tables.entry(table.table.clone()).or_default();
        Ok((metadata, data))
    }
}

fn column<'a>(table: &'a TableMetadata, name: &str) -> Result<&'a ColumnMetadata, ExecutionError> {
    table
        .column(name)
        .ok_or_else(|| invalid(format!("Undefined column name {}", name)))
}

fn check_value(column: &ColumnMetadata, value: &StorageValue) -> Result<(), ExecutionError> {
    if value.conforms_to(&column.native_type) {
        Ok(())
    } else {
        Err(invalid(format!(
            "Invalid value for column {} of type {}",
            column.name, column.native_type
        )))
    }
}

fn check_predicates(table: &TableMetadata, predicates: &[Predicate]) -> Result<(), ExecutionError> {
    for predicate in predicates {
        let column = column(table, &predicate.column)?;
        match (&predicate.op, &predicate.value) {
            (Operator::In, StorageValue::List(items)) => {
                for item in items {
                    check_value(column, item)?;
                }
            }
            (_, value) => check_value(column, value)?,
        }
    }
    Ok(())
}

/// Equality predicates over key columns, as `column -> value`. With
/// `full_key` every primary key column must be present, otherwise at least
/// the whole partition key.
fn key_restriction(
    table: &TableMetadata,
    predicates: &[Predicate],
    full_key: bool,
) -> Result<HashMap<String, StorageValue>, ExecutionError> {
    check_predicates(table, predicates)?;
    let mut key = HashMap::new();
    for predicate in predicates {
        if !table.is_key_column(&predicate.column) {
            return Err(invalid(format!(
                "Non PRIMARY KEY column {} found in where clause",
                predicate.column
            )));
        }
        if predicate.op != Operator::Eq {
            return Err(invalid(format!(
                "Only equality is supported on {} here",
                predicate.column
            )));
        }
        key.insert(predicate.column.clone(), predicate.value.clone());
    }
    let required: Vec<&String> = if full_key {
        table.partition_key.iter().chain(table.clustering_key.iter()).collect()
    } else {
        table.partition_key.iter().collect()
    };
    for name in required {
        if !key.contains_key(name) {
            return Err(invalid(format!("Missing mandatory PRIMARY KEY part {}", name)));
        }
    }
    Ok(key)
}

fn key_matches(row: &StoredRow, key: &HashMap<String, StorageValue>) -> bool {
    key.iter()
        .all(|(column, value)| row.get(column).compare(value) == Some(Ordering::Equal))
}

fn compare_rows(table: &TableMetadata, a: &StoredRow, b: &StoredRow, reverse: bool) -> Ordering {
    let cmp = |column: &str| {
        let (x, y) = (a.get(column), b.get(column));
        x.compare(y).unwrap_or_else(|| x.is_null().cmp(&y.is_null()).reverse())
    };
    for column in &table.partition_key {
        match cmp(column) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    for name in &table.clustering_key {
        let mut ordering = cmp(name);
        if table
            .column(name)
            .is_some_and(|c| c.clustering_order == ClusteringOrder::Desc)
        {
            ordering = ordering.reverse();
        }
        if reverse {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Whether ORDER BY flips the natural clustering order.
fn reverses_clustering(table: &TableMetadata, order_by: &[OrderBy]) -> Result<bool, ExecutionError> {
    if order_by.is_empty() {
        return Ok(false);
    }
    let mut reverse = None;
    for (order, name) in order_by.iter().zip(table.clustering_key.iter()) {
        if &order.column != name {
            return Err(invalid(
                "Order by is currently only supported on the clustered columns of the PRIMARY KEY",
            ));
        }
        let declared = column(table, name)?.clustering_order;
        let flips = order.order != declared;
        if *reverse.get_or_insert(flips) != flips {
            return Err(invalid("Unsupported order by relation"));
        }
    }
    if order_by.len() > table.clustering_key.len() {
        return Err(invalid(format!(
            "Order by on unknown column {}",
            order_by[table.clustering_key.len()].column
        )));
    }
    Ok(reverse.unwrap_or(false))
}

/// Reference store living entirely in memory.
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                keyspaces: BTreeMap::new(),
                version: SchemaVersion(Uuid::new_v4().to_string()),
            }),
        }
    }

    /// Create a keyspace. Returns false if it already exists.
    pub fn create_keyspace(&self, name: &str, replication: BTreeMap<String, String>) -> bool {
        let mut state = self.state.write();
        if state.keyspaces.contains_key(name) {
            return false;
        }
        let mut metadata = KeyspaceMetadata::new(name);
        metadata.replication = replication;
        state.keyspaces.insert(
            name.to_string(),
            KeyspaceData {
                metadata,
                tables: HashMap::new(),
            },
        );
        state.bump_version();
        true
    }

    /// Add or replace a table definition directly, bypassing DDL.
    pub fn put_table(&self, keyspace: &str, table: TableMetadata) -> Result<(), ExecutionError> {
        let mut state = self.state.write();
        let data = state
            .keyspaces
            .get_mut(keyspace)
            .ok_or_else(|| invalid(format!("Keyspace {} does not exist", keyspace)))?;
        data.tables.remove(&table.name);
        data.metadata.tables.insert(table.name.clone(), table);
        state.bump_version();
        Ok(())
    }

    fn run(&self, statement: Statement, request: &ExecutionRequest) -> Result<ResultSet, ExecutionError> {
        let now = Instant::now();
        let mut state = self.state.write();
        match statement {
            Statement::Select {
                table,
                predicates,
                order_by,
                limit,
            } => {
                let (metadata, data) = state.table_mut(&table)?;
                check_predicates(metadata, &predicates)?;
                let reverse = reverses_clustering(metadata, &order_by)?;
                data.rows.retain(|r| r.live(now));
                let merged: Vec<StoredRow> = data
                    .rows
                    .iter()
                    .map(|r| data.materialize(metadata, r))
                    .collect();
                let mut matched: Vec<&StoredRow> =
                    merged.iter().filter(|r| r.matches(&predicates)).collect();
                matched.sort_by(|a, b| compare_rows(metadata, a, b, reverse));
                if let Some(limit) = limit.filter(|l| *l > 0) {
                    matched.truncate(limit as usize);
                }

                let offset = match &request.page_state {
                    Some(token) => decode_page_state(token)?,
                    None => 0,
                };
                let remaining = matched.get(offset..).unwrap_or_default();
                let (page, page_state) = match request.page_size.filter(|s| *s > 0) {
                    Some(size) if remaining.len() > size as usize => (
                        &remaining[..size as usize],
                        Some(encode_page_state(offset + size as usize)),
                    ),
                    _ => (remaining, None),
                };
                Ok(ResultSet {
                    rows: page.iter().map(|r| r.to_row(metadata)).collect(),
                    page_state,
                })
            }
            Statement::Insert {
                table,
                values,
                conditional,
                ttl,
            } => {
                let (metadata, data) = state.table_mut(&table)?;
                let mut row_values = HashMap::new();
                for (name, value) in values {
                    check_value(column(metadata, &name)?, &value)?;
                    row_values.insert(name, normalize(value));
                }
                let mut key = HashMap::new();
                for name in metadata.partition_key.iter().chain(metadata.clustering_key.iter()) {
                    match row_values.get(name) {
                        Some(value) if !value.is_null() => {
                            key.insert(name.clone(), value.clone());
                        }
                        _ => {
                            return Err(invalid(format!(
                                "Missing mandatory PRIMARY KEY part {}",
                                name
                            )));
                        }
                    }
                }
                data.rows.retain(|r| r.live(now));
                let existing = data.rows.iter().position(|r| key_matches(r, &key));
                if conditional == Conditional::IfNotExists {
                    if let Some(index) = existing {
                        let current = data.materialize(metadata, &data.rows[index]);
                        return Ok(applied_row(false, Some((&current, metadata))));
                    }
                }
                let expires_at = expiry(ttl, now);
                let partition = TableData::partition_key(metadata, &key);
                let row_values: HashMap<String, StorageValue> = data
                    .write_statics(metadata, partition, row_values.into_iter().collect())
                    .into_iter()
                    .collect();
                match existing {
                    Some(index) => {
                        let row = &mut data.rows[index];
                        row.values.extend(row_values);
                        row.expires_at = expires_at;
                    }
                    None => data.rows.push(StoredRow {
                        values: row_values,
                        expires_at,
                    }),
                }
                Ok(match conditional {
                    Conditional::IfNotExists => applied_row(true, None),
                    _ => ResultSet::default(),
                })
            }
            Statement::Update {
                table,
                ttl,
                assignments,
                predicates,
                conditional,
            } => {
                let (metadata, data) = state.table_mut(&table)?;
                let key = key_restriction(metadata, &predicates, true)?;
                for (name, value) in &assignments {
                    let column = column(metadata, name)?;
                    if column.kind.is_primary_key() {
                        return Err(invalid(format!(
                            "PRIMARY KEY part {} found in SET part",
                            name
                        )));
                    }
                    check_value(column, value)?;
                }
                data.rows.retain(|r| r.live(now));
                let existing = data.rows.iter().position(|r| key_matches(r, &key));
                let current = existing.map(|i| data.materialize(metadata, &data.rows[i]));
                if let Some(result) = check_conditional(metadata, current.as_ref(), &conditional)? {
                    return Ok(result);
                }
                let expires_at = expiry(ttl, now);
                let partition = TableData::partition_key(metadata, &key);
                let assignments = data.write_statics(
                    metadata,
                    partition,
                    assignments
                        .into_iter()
                        .map(|(name, value)| (name, normalize(value)))
                        .collect(),
                );
                let index = match existing {
                    Some(index) => index,
                    None => {
                        data.rows.push(StoredRow {
                            values: key,
                            expires_at: None,
                        });
                        data.rows.len() - 1
                    }
                };
                let row = &mut data.rows[index];
                row.values.extend(assignments);
                row.expires_at = expires_at;
                Ok(match conditional {
                    Conditional::None => ResultSet::default(),
                    _ => applied_row(true, None),
                })
            }
            Statement::Delete {
                table,
                predicates,
                conditional,
            } => {
                let (metadata, data) = state.table_mut(&table)?;
                let full_key = conditional != Conditional::None;
                let key = key_restriction(metadata, &predicates, full_key)?;
                data.rows.retain(|r| r.live(now));
                let existing = data.rows.iter().position(|r| key_matches(r, &key));
                let current = existing.map(|i| data.materialize(metadata, &data.rows[i]));
                if let Some(result) = check_conditional(metadata, current.as_ref(), &conditional)? {
                    return Ok(result);
                }
                data.rows.retain(|r| !key_matches(r, &key));
                // Deleting a whole partition takes its static cells along.
                if metadata.clustering_key.iter().all(|c| !key.contains_key(c)) {
                    data.drop_statics(&TableData::partition_key(metadata, &key));
                }
                Ok(match conditional {
                    Conditional::None => ResultSet::default(),
                    _ => applied_row(true, None),
                })
            }
            Statement::CreateTable(create) => {
                let keyspace = state.keyspace_mut(&create.table)?;
                if keyspace.metadata.tables.contains_key(&create.table.table) {
                    if create.if_not_exists {
                        return Ok(ResultSet::default());
                    }
                    return Err(invalid(format!(
                        "Table {} already exists",
                        create.table.table
                    )));
                }
                let table = table_from_ddl(&create)?;
                keyspace.metadata.tables.insert(table.name.clone(), table);
                state.bump_version();
                Ok(ResultSet::default())
            }
            Statement::AlterTable { table, alter } => {
                let keyspace = state.keyspace_mut(&table)?;
                let metadata = keyspace
                    .metadata
                    .tables
                    .get_mut(&table.table)
                    .ok_or_else(|| invalid(format!("unconfigured table {}", table.table)))?;
                match alter {
                    AlterTable::Add(columns) => {
                        for def in &columns {
                            if metadata.columns.contains_key(&def.name) {
                                return Err(invalid(format!(
                                    "Column {} already exists",
                                    def.name
                                )));
                            }
                        }
                        for def in columns {
                            metadata.columns.insert(
                                def.name.clone(),
                                ColumnMetadata::new(def.name, ColumnKind::Regular, def.native_type),
                            );
                        }
                    }
                    AlterTable::Drop(columns) => {
                        for name in &columns {
                            let column = column(metadata, name)?;
                            if column.kind.is_primary_key() {
                                return Err(invalid(format!(
                                    "Cannot drop PRIMARY KEY part {}",
                                    name
                                )));
                            }
                        }
                        for name in &columns {
                            metadata.columns.remove(name);
                        }
                        if let Some(data) = keyspace.tables.get_mut(&table.table) {
                            let cells = data
                                .rows
                                .iter_mut()
                                .map(|r| &mut r.values)
                                .chain(data.statics.iter_mut().map(|(_, cells)| cells));
                            for values in cells {
                                for name in &columns {
                                    values.remove(name);
                                }
                            }
                        }
                    }
                }
                state.bump_version();
                Ok(ResultSet::default())
            }
            Statement::DropTable { table, if_exists } => {
                let keyspace = state.keyspace_mut(&table)?;
                if keyspace.metadata.tables.remove(&table.table).is_none() {
                    if if_exists {
                        return Ok(ResultSet::default());
                    }
                    return Err(invalid(format!("Table {} does not exist", table.table)));
                }
                keyspace.tables.remove(&table.table);
                state.bump_version();
                Ok(ResultSet::default())
            }
        }
    }
}

/// Evaluate a conditional clause against the current row. `Some` is the
/// not-applied result; `None` means the write goes ahead.
fn check_conditional(
    table: &TableMetadata,
    current: Option<&StoredRow>,
    conditional: &Conditional,
) -> Result<Option<ResultSet>, ExecutionError> {
    match (conditional, current) {
        (Conditional::None, _) => Ok(None),
        (Conditional::IfNotExists, Some(row)) => Ok(Some(applied_row(false, Some((row, table))))),
        (Conditional::IfNotExists, None) => Ok(None),
        (Conditional::IfExists, Some(_)) => Ok(None),
        (Conditional::IfExists, None) => Ok(Some(applied_row(false, None))),
        (Conditional::If(predicates), row) => {
            check_predicates(table, predicates)?;
            match row {
                Some(row) if row.matches(predicates) => Ok(None),
                Some(row) => Ok(Some(applied_row(false, Some((row, table))))),
                None => Ok(Some(applied_row(false, None))),
            }
        }
    }
}

fn table_from_ddl(create: &CreateTable) -> Result<TableMetadata, ExecutionError> {
    let mut columns = Vec::new();
    for def in &create.partition_key {
        columns.push(ColumnMetadata::new(
            def.name.clone(),
            ColumnKind::PartitionKey,
            def.native_type.clone(),
        ));
    }
    for (def, order) in &create.clustering_key {
        columns.push(
            ColumnMetadata::new(def.name.clone(), ColumnKind::ClusteringKey, def.native_type.clone())
                .with_order(*order),
        );
    }
    for def in &create.columns {
        columns.push(ColumnMetadata::new(
            def.name.clone(),
            ColumnKind::Regular,
            def.native_type.clone(),
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(invalid(format!("Multiple definition of identifier {}", column.name)));
        }
    }
    Ok(TableMetadata::new(create.table.table.clone(), columns))
}

#[async_trait]
impl StatementExecutor for MemoryStore {
    async fn execute(&self, request: ExecutionRequest) -> Result<ResultSet, ExecutionError> {
        debug!(
            cql = %request.statement.text,
            params = request.statement.params.len(),
            consistency = %request.consistency,
            acting_as = request.acting_as.as_deref().unwrap_or(""),
            "Memory store executing statement"
        );
        let statement = parse(&request.statement.text, request.statement.params.clone())?;
        self.run(statement, &request)
    }
}

#[async_trait]
impl MetadataProvider for MemoryStore {
    async fn keyspace(&self, name: &str) -> Result<KeyspaceMetadata, SchemaError> {
        self.state
            .read()
            .keyspaces
            .get(name)
            .map(|k| k.metadata.clone())
            .ok_or_else(|| SchemaError::KeyspaceNotFound(name.to_string()))
    }

    async fn keyspace_names(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .state
            .read()
            .keyspaces
            .keys()
            .filter(|name| !is_system_keyspace(name))
            .cloned()
            .collect())
    }

    async fn schema_version(&self) -> Result<SchemaVersion, SchemaError> {
        Ok(self.state.read().version.clone())
    }
}
