//! Generated-field resolution: decode GraphQL arguments through the codec,
//! compile the intent, execute it and re-encode the rows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::Value as ConstValue;
use tracing::debug;

use crate::codec::{self, WireValue};
use crate::error::{CodecError, ExecutionError, ResolveError};
use crate::query::{
    Delete, Insert, Operator, OrderBy, Predicate, Select, TableRef, Update, compile_delete,
    compile_insert, compile_select, compile_update,
};
use crate::store::{
    APPLIED_COLUMN, Consistency, ExecutionRequest, PageState, ResultSet, Row, SerialConsistency,
    StatementExecutor, StorageValue, TableMetadata,
};

use super::types::TableTypes;

/// Defaults applied when a request leaves an option out.
#[derive(Debug, Clone)]
pub struct ExecutionDefaults {
    pub consistency: Consistency,
    pub serial_consistency: SerialConsistency,
    pub page_size: i32,
    pub timeout: Duration,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            consistency: Consistency::LocalQuorum,
            serial_consistency: SerialConsistency::Serial,
            page_size: 100,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Schema-wide data every generated resolver executes through.
#[derive(Clone)]
pub struct ExecutionEnv {
    pub executor: Arc<dyn StatementExecutor>,
    pub defaults: ExecutionDefaults,
}

impl ExecutionEnv {
    pub fn new(executor: Arc<dyn StatementExecutor>, defaults: ExecutionDefaults) -> Self {
        Self { executor, defaults }
    }

    /// Run one statement, bounded by the request timeout. Dropping the
    /// returned future drops the execution.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ResultSet, ExecutionError> {
        let timeout = self.defaults.timeout;
        match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

/// Per-request data attached by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub acting_as: Option<String>,
}

/// Everything a table's resolvers need, shared by its generated fields.
#[derive(Debug)]
pub struct TableContext {
    pub keyspace: String,
    pub types: TableTypes,
    pub metadata: TableMetadata,
}

impl TableContext {
    fn table_ref(&self) -> TableRef {
        TableRef::new(&self.keyspace, &self.metadata.name)
    }
}

// ============================================================================
// Output values
// ============================================================================

/// One row as wire values, keyed by storage column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValue(pub HashMap<String, WireValue>);

impl RowValue {
    fn from_row(row: &Row) -> Self {
        Self(
            row.iter()
                .filter(|(name, _)| *name != APPLIED_COLUMN)
                .map(|(name, value)| (name.to_string(), codec::encode(value)))
                .collect(),
        )
    }

    pub fn get(&self, column: &str) -> &WireValue {
        static NULL: WireValue = WireValue::Null;
        self.0.get(column).unwrap_or(&NULL)
    }
}

/// One `{key, value}` element of an encoded map.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryValue {
    pub key: WireValue,
    pub value: WireValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectPage {
    pub values: Vec<RowValue>,
    pub page_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub applied: bool,
    pub value: Option<RowValue>,
}

/// Convert a wire value to a GraphQL output value.
pub fn to_const(value: &WireValue) -> ConstValue {
    ConstValue::from_json(value.to_json()).unwrap_or(ConstValue::Null)
}

/// Convert a GraphQL input value to a wire value. Enum values arrive as
/// strings; `{key, value}` objects become pairs.
pub fn from_const(value: &ConstValue) -> Result<WireValue, CodecError> {
    let json = value
        .clone()
        .into_json()
        .map_err(|e| CodecError::malformed("input", e.to_string()))?;
    WireValue::from_json(&json).map_err(|detail| CodecError::malformed("input", detail))
}

// ============================================================================
// Arguments
// ============================================================================

/// Arguments of a table's query field. `None` also stands for explicit null.
#[derive(Debug, Clone, Default)]
pub struct SelectArgs {
    pub value: Option<ConstValue>,
    pub filter: Option<ConstValue>,
    pub order_by: Option<ConstValue>,
    pub options: Option<ConstValue>,
}

#[derive(Debug, Clone, Default)]
pub struct MutationArgs {
    pub value: Option<ConstValue>,
    pub if_not_exists: bool,
    pub if_exists: bool,
    pub if_condition: Option<ConstValue>,
    pub options: Option<ConstValue>,
}

#[derive(Debug, Default)]
struct Options {
    consistency: Option<Consistency>,
    serial_consistency: Option<SerialConsistency>,
    limit: Option<i32>,
    page_size: Option<i32>,
    page_state: Option<String>,
    ttl: Option<i32>,
}

fn bad_request(message: impl Into<String>) -> ResolveError {
    ResolveError::BadRequest(message.into())
}

fn object<'a>(
    value: &'a ConstValue,
    argument: &str,
) -> Result<Vec<(&'a str, &'a ConstValue)>, ResolveError> {
    match value {
        ConstValue::Object(map) => Ok(map
            .iter()
            .filter(|(_, v)| !matches!(v, ConstValue::Null))
            .map(|(k, v)| (k.as_str(), v))
            .collect()),
        _ => Err(bad_request(format!("'{}' must be an input object", argument))),
    }
}

fn int_option(value: &ConstValue, name: &str) -> Result<i32, ResolveError> {
    match value {
        ConstValue::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| bad_request(format!("'{}' must be a 32-bit integer", name))),
        _ => Err(bad_request(format!("'{}' must be an integer", name))),
    }
}

fn enum_option(value: &ConstValue) -> Option<&str> {
    match value {
        ConstValue::Enum(name) => Some(name.as_str()),
        ConstValue::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn parse_options(options: Option<&ConstValue>) -> Result<Options, ResolveError> {
    let mut parsed = Options::default();
    let Some(options) = options else {
        return Ok(parsed);
    };
    for (name, value) in object(options, "options")? {
        match name {
            "consistency" => {
                let level = enum_option(value)
                    .ok_or_else(|| bad_request("'consistency' must be an enum value"))?;
                parsed.consistency = Some(level.parse().map_err(bad_request)?);
            }
            "serialConsistency" => {
                let level = enum_option(value)
                    .ok_or_else(|| bad_request("'serialConsistency' must be an enum value"))?;
                parsed.serial_consistency = Some(level.parse().map_err(bad_request)?);
            }
            "limit" => parsed.limit = Some(int_option(value, name)?),
            "pageSize" => parsed.page_size = Some(int_option(value, name)?),
            "ttl" => parsed.ttl = Some(int_option(value, name)?),
            "pageState" => match value {
                ConstValue::String(s) => parsed.page_state = Some(s.clone()),
                _ => return Err(bad_request("'pageState' must be a string")),
            },
            other => return Err(bad_request(format!("Unknown option '{}'", other))),
        }
    }
    Ok(parsed)
}

/// Decode a table input object into `(column, value)` pairs, in the order the
/// client wrote the fields. Explicit nulls are kept only when `keep_nulls`.
fn decode_values(
    table: &TableContext,
    input: &ConstValue,
    argument: &str,
    keep_nulls: bool,
) -> Result<Vec<(String, StorageValue)>, ResolveError> {
    let ConstValue::Object(map) = input else {
        return Err(bad_request(format!("'{}' must be an input object", argument)));
    };
    let mut decoded = Vec::with_capacity(map.len());
    for (field_name, value) in map {
        if !keep_nulls && matches!(value, ConstValue::Null) {
            continue;
        }
        let field = table
            .types
            .field(field_name.as_str())
            .ok_or_else(|| bad_request(format!("Unknown field '{}'", field_name)))?;
        let wire = from_const(value).map_err(|e| e.within(field_name).within(argument))?;
        let value = codec::decode(&field.native_type, &wire)
            .map_err(|e| e.within(field_name).within(argument))?;
        decoded.push((field.column.clone(), value));
    }
    Ok(decoded)
}

/// Decode a filter input object into predicates: fields in client order,
/// operators in client order within each field.
fn decode_filter(
    table: &TableContext,
    filter: &ConstValue,
    argument: &str,
) -> Result<Vec<Predicate>, ResolveError> {
    let mut predicates = Vec::new();
    for (field_name, ops) in object(filter, argument)? {
        let field = table
            .types
            .field(field_name)
            .ok_or_else(|| bad_request(format!("Unknown field '{}'", field_name)))?;
        for (op_name, operand) in object(ops, field_name)? {
            let op = Operator::from_field_name(op_name)
                .ok_or_else(|| bad_request(format!("Unknown operator '{}'", op_name)))?;
            let scope = |e: CodecError| e.within(op_name).within(field_name).within(argument);
            let value = if op == Operator::In {
                let ConstValue::List(items) = operand else {
                    return Err(bad_request(format!("'{}.in' must be a list", field_name)));
                };
                let decoded = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        from_const(item)
                            .and_then(|wire| codec::decode(&field.native_type, &wire))
                            .map_err(|e| scope(e.within(i)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                StorageValue::List(decoded)
            } else {
                let wire = from_const(operand).map_err(scope)?;
                codec::decode(&field.native_type, &wire).map_err(scope)?
            };
            predicates.push(Predicate::new(field.column.clone(), op, value));
        }
    }
    Ok(predicates)
}

fn decode_order(table: &TableContext, order_by: &ConstValue) -> Result<Vec<OrderBy>, ResolveError> {
    let items = match order_by {
        ConstValue::List(items) => items.iter().collect(),
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| {
            let name = enum_option(item).ok_or_else(|| bad_request("'orderBy' takes enum values"))?;
            let order = table
                .types
                .order_value(name)
                .ok_or_else(|| bad_request(format!("Unknown order '{}'", name)))?;
            Ok(OrderBy::new(order.column.clone(), order.order))
        })
        .collect()
}

fn execution_request(
    env: &ExecutionEnv,
    ctx: Option<&RequestContext>,
    statement: crate::query::CompiledStatement,
    options: &Options,
    conditional: bool,
) -> ExecutionRequest {
    let mut request = ExecutionRequest::new(statement);
    request.consistency = options.consistency.unwrap_or(env.defaults.consistency);
    if conditional {
        request.serial_consistency = Some(
            options
                .serial_consistency
                .unwrap_or(env.defaults.serial_consistency),
        );
    }
    request.acting_as = ctx.and_then(|c| c.acting_as.clone());
    request
}

// ============================================================================
// Resolvers
// ============================================================================

/// Resolve a table's query field.
pub async fn select(
    table: &TableContext,
    env: &ExecutionEnv,
    ctx: Option<&RequestContext>,
    args: SelectArgs,
) -> Result<SelectPage, ResolveError> {
    let options = parse_options(args.options.as_ref())?;
    let mut select = Select::new(table.table_ref());
    if let Some(value) = &args.value {
        select.predicates = decode_values(table, value, "value", false)?
            .into_iter()
            .map(|(column, value)| Predicate::eq(column, value))
            .collect();
    }
    if let Some(filter) = &args.filter {
        select.predicates.extend(decode_filter(table, filter, "filter")?);
    }
    if let Some(order_by) = &args.order_by {
        select.order_by = decode_order(table, order_by)?;
    }
    select.limit = options.limit;

    let statement = compile_select(&select)?;
    debug!(keyspace = %table.keyspace, table = %table.metadata.name, cql = %statement.text, "Resolving select");
    let mut request = execution_request(env, ctx, statement, &options, false);
    request.page_size = Some(options.page_size.unwrap_or(env.defaults.page_size));
    request.page_state = options.page_state.clone().map(PageState);

    let result = env.execute(request).await?;
    Ok(SelectPage {
        values: result.rows.iter().map(RowValue::from_row).collect(),
        page_state: result.page_state.map(|p| p.0),
    })
}

/// Outcome of a statement: conditional statements report `[applied]`, and
/// when not applied their row carries the current state of the target row.
fn outcome(result: ResultSet, written: &[(String, StorageValue)]) -> MutationOutcome {
    let echo = || {
        RowValue(
            written
                .iter()
                .map(|(column, value)| (column.clone(), codec::encode(value)))
                .collect(),
        )
    };
    match result.rows.first() {
        Some(row) => match row.applied() {
            Some(false) => {
                let current = RowValue::from_row(row);
                MutationOutcome {
                    applied: false,
                    value: (!current.0.is_empty()).then_some(current),
                }
            }
            _ => MutationOutcome {
                applied: true,
                value: Some(echo()),
            },
        },
        None => MutationOutcome {
            applied: true,
            value: Some(echo()),
        },
    }
}

fn required_value(args: &MutationArgs) -> Result<&ConstValue, ResolveError> {
    args.value
        .as_ref()
        .ok_or_else(|| bad_request("'value' is required"))
}

pub async fn insert(
    table: &TableContext,
    env: &ExecutionEnv,
    ctx: Option<&RequestContext>,
    args: MutationArgs,
) -> Result<MutationOutcome, ResolveError> {
    let options = parse_options(args.options.as_ref())?;
    let values = decode_values(table, required_value(&args)?, "value", true)?;
    let mut insert = Insert::new(table.table_ref());
    for (column, value) in &values {
        insert.columns.push(column.clone());
        insert.values.push(value.clone());
    }
    insert.if_not_exists = args.if_not_exists;
    insert.ttl = options.ttl;

    let statement = compile_insert(&insert)?;
    debug!(keyspace = %table.keyspace, table = %table.metadata.name, cql = %statement.text, "Resolving insert");
    let request = execution_request(env, ctx, statement, &options, insert.if_not_exists);
    let result = env.execute(request).await?;
    Ok(outcome(result, &values))
}

pub async fn update(
    table: &TableContext,
    env: &ExecutionEnv,
    ctx: Option<&RequestContext>,
    args: MutationArgs,
) -> Result<MutationOutcome, ResolveError> {
    let options = parse_options(args.options.as_ref())?;
    let values = decode_values(table, required_value(&args)?, "value", true)?;
    let mut update = Update::new(table.table_ref(), &table.metadata);
    for (column, value) in &values {
        update.columns.push(column.clone());
        update.values.push(value.clone());
    }
    update.if_exists = args.if_exists;
    if let Some(condition) = &args.if_condition {
        update.if_condition = decode_filter(table, condition, "ifCondition")?;
    }
    update.ttl = options.ttl;

    let statement = compile_update(&update)?;
    debug!(keyspace = %table.keyspace, table = %table.metadata.name, cql = %statement.text, "Resolving update");
    let conditional = update.if_exists || !update.if_condition.is_empty();
    let request = execution_request(env, ctx, statement, &options, conditional);
    let result = env.execute(request).await?;
    Ok(outcome(result, &values))
}

pub async fn delete(
    table: &TableContext,
    env: &ExecutionEnv,
    ctx: Option<&RequestContext>,
    args: MutationArgs,
) -> Result<MutationOutcome, ResolveError> {
    let options = parse_options(args.options.as_ref())?;
    let values = decode_values(table, required_value(&args)?, "value", false)?;
    let mut delete = Delete::new(table.table_ref());
    for (column, value) in &values {
        if !table.metadata.is_key_column(column) {
            return Err(bad_request(format!(
                "Delete selects rows by primary key; '{}' is not a key column",
                column
            )));
        }
        delete.columns.push(column.clone());
        delete.values.push(value.clone());
    }
    delete.if_exists = args.if_exists;
    if let Some(condition) = &args.if_condition {
        delete.if_condition = decode_filter(table, condition, "ifCondition")?;
    }

    let statement = compile_delete(&delete)?;
    debug!(keyspace = %table.keyspace, table = %table.metadata.name, cql = %statement.text, "Resolving delete");
    let conditional = delete.if_exists || !delete.if_condition.is_empty();
    let request = execution_request(env, ctx, statement, &options, conditional);
    let result = env.execute(request).await?;
    Ok(outcome(result, &values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::naming::{NamingConfig, NamingContext};
    use crate::graphql::types::TypeGraph;
    use crate::store::{ColumnKind, ColumnMetadata, KeyspaceMetadata, MemoryStore, NativeType};
    use assert_matches::assert_matches;
    use async_graphql::Name;
    use pretty_assertions::assert_eq;

    fn books() -> TableMetadata {
        TableMetadata::new(
            "books",
            vec![
                ColumnMetadata::new("shelf", ColumnKind::PartitionKey, NativeType::Int),
                ColumnMetadata::new("position", ColumnKind::ClusteringKey, NativeType::Int),
                ColumnMetadata::new("title", ColumnKind::Regular, NativeType::Text),
                ColumnMetadata::new("tags", ColumnKind::Regular, NativeType::set(NativeType::Text)),
            ],
        )
    }

    fn table() -> TableContext {
        let metadata = KeyspaceMetadata::new("library").with_table(books());
        let naming = NamingContext::build(&metadata, NamingConfig::default()).unwrap();
        let graph = TypeGraph::build(&metadata, &naming).unwrap();
        TableContext {
            keyspace: "library".to_string(),
            types: graph.table("books").unwrap().clone(),
            metadata: books(),
        }
    }

    fn input(json: serde_json::Value) -> ConstValue {
        ConstValue::from_json(json).unwrap()
    }

    async fn env() -> (Arc<MemoryStore>, ExecutionEnv) {
        let store = Arc::new(MemoryStore::new());
        store.create_keyspace("library", Default::default());
        store.put_table("library", books()).unwrap();
        let env = ExecutionEnv::new(store.clone(), ExecutionDefaults::default());
        (store, env)
    }

    #[test]
    fn test_const_conversions() {
        let value = input(serde_json::json!([{"key": "a", "value": 1}]));
        assert_eq!(
            from_const(&value).unwrap(),
            WireValue::List(vec![WireValue::pair(
                WireValue::String("a".into()),
                WireValue::Number(1.into())
            )])
        );
        assert_eq!(
            from_const(&ConstValue::Enum(Name::new("ONE"))).unwrap(),
            WireValue::String("ONE".into())
        );
        assert_eq!(to_const(&WireValue::String("7".into())), ConstValue::String("7".into()));
    }

    #[test]
    fn test_filter_keeps_client_order_and_paths() {
        let table = table();
        let filter = input(serde_json::json!({
            "title": {"gt": "a", "lte": "m"},
            "shelf": {"in": [1, 2]},
        }));
        let predicates = decode_filter(&table, &filter, "filter").unwrap();
        assert_eq!(
            predicates,
            vec![
                Predicate::new("title", Operator::Gt, StorageValue::Text("a".into())),
                Predicate::new("title", Operator::Lte, StorageValue::Text("m".into())),
                Predicate::new(
                    "shelf",
                    Operator::In,
                    StorageValue::List(vec![StorageValue::Int(1), StorageValue::Int(2)])
                ),
            ]
        );

        let bad = input(serde_json::json!({"tags": {"in": [["ok"], [7]]}}));
        let err = decode_filter(&table, &bad, "filter").unwrap_err();
        assert_matches!(err, ResolveError::Codec(e) if e.path() == "filter.tags.in.1.0");
    }

    #[test]
    fn test_options_parse() {
        let options = input(serde_json::json!({"consistency": "ONE", "pageSize": 5, "pageState": "abc"}));
        let parsed = parse_options(Some(&options)).unwrap();
        assert_eq!(parsed.consistency, Some(Consistency::One));
        assert_eq!(parsed.page_size, Some(5));
        assert_eq!(parsed.page_state.as_deref(), Some("abc"));

        let bad = input(serde_json::json!({"serialConsistency": "QUORUM"}));
        assert_matches!(parse_options(Some(&bad)), Err(ResolveError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_insert_then_select_pages() {
        let table = table();
        let (_store, env) = env().await;
        for position in 1..=3 {
            let args = MutationArgs {
                value: Some(input(serde_json::json!({
                    "shelf": 1, "position": position, "title": format!("t{}", position)
                }))),
                ..Default::default()
            };
            let outcome = insert(&table, &env, None, args).await.unwrap();
            assert!(outcome.applied);
        }

        let args = SelectArgs {
            value: Some(input(serde_json::json!({"shelf": 1}))),
            order_by: Some(ConstValue::List(vec![ConstValue::Enum(Name::new("position_DESC"))])),
            options: Some(input(serde_json::json!({"pageSize": 2}))),
            ..Default::default()
        };
        let page = select(&table, &env, None, args.clone()).await.unwrap();
        let titles: Vec<&WireValue> = page.values.iter().map(|r| r.get("title")).collect();
        assert_eq!(
            titles,
            vec![&WireValue::String("t3".into()), &WireValue::String("t2".into())]
        );
        let state = page.page_state.expect("more rows");

        let mut next = args;
        next.options = Some(input(serde_json::json!({"pageSize": 2, "pageState": state})));
        let page = select(&table, &env, None, next).await.unwrap();
        assert_eq!(page.values.len(), 1);
        assert_eq!(page.page_state, None);
    }

    #[tokio::test]
    async fn test_conditional_delete_reads_back_current_row() {
        let table = table();
        let (_store, env) = env().await;
        let args = MutationArgs {
            value: Some(input(serde_json::json!({"shelf": 1, "position": 1, "title": "kept"}))),
            ..Default::default()
        };
        insert(&table, &env, None, args).await.unwrap();

        let args = MutationArgs {
            value: Some(input(serde_json::json!({"shelf": 1, "position": 1}))),
            if_condition: Some(input(serde_json::json!({"title": {"eq": "other"}}))),
            ..Default::default()
        };
        let outcome = delete(&table, &env, None, args).await.unwrap();
        assert!(!outcome.applied);
        let value = outcome.value.unwrap();
        assert_eq!(value.get("title"), &WireValue::String("kept".into()));
        assert_eq!(value.get("shelf"), &WireValue::Number(1.into()));
    }

    #[tokio::test]
    async fn test_delete_rejects_non_key_columns() {
        let table = table();
        let (_store, env) = env().await;
        let args = MutationArgs {
            value: Some(input(serde_json::json!({"title": "x"}))),
            ..Default::default()
        };
        assert_matches!(
            delete(&table, &env, None, args).await,
            Err(ResolveError::BadRequest(_))
        );
    }

    #[tokio::test]
    async fn test_decode_failure_names_field() {
        let table = table();
        let (_store, env) = env().await;
        let args = MutationArgs {
            value: Some(input(serde_json::json!({"shelf": "one", "position": 1}))),
            ..Default::default()
        };
        let err = insert(&table, &env, None, args).await.unwrap_err();
        assert_matches!(err, ResolveError::Codec(e) if e.path() == "value.shelf");
    }
}
