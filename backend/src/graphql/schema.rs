//! Materializes a keyspace's type graph into an executable dynamic schema.

use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Object,
    ResolverContext, Scalar, Schema, TypeRef,
};
use async_graphql::extensions::Tracing;
use async_graphql::{ErrorExtensions, Value as ConstValue};

use crate::codec::{WireScalar, WireType, WireValue};
use crate::error::SchemaError;
use crate::query::Operator;
use crate::store::{Consistency, KeyspaceMetadata, SchemaVersion};

use super::naming::{NamingConfig, NamingContext};
use super::resolvers::{
    self, EntryValue, ExecutionEnv, MutationArgs, MutationOutcome, RequestContext, RowValue,
    SelectArgs, SelectPage, TableContext, to_const,
};
use super::types::{
    CONSISTENCY_ENUM, KEYSPACE_PLACEHOLDER_FIELD, MUTATION_OPTIONS, MUTATION_TYPE, QUERY_OPTIONS,
    QUERY_TYPE, SERIAL_CONSISTENCY_ENUM, TableTypes, TypeGraph, entry_input_type_name,
    entry_type_name, filter_type_name,
};

/// One published snapshot of a keyspace: the metadata it was built from and
/// everything derived from it. Immutable once built.
pub struct KeyspaceSchema {
    pub keyspace: String,
    pub version: SchemaVersion,
    pub metadata: KeyspaceMetadata,
    pub naming: NamingContext,
    pub graph: TypeGraph,
    pub schema: Schema,
}

impl std::fmt::Debug for KeyspaceSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyspaceSchema")
            .field("keyspace", &self.keyspace)
            .field("version", &self.version)
            .field("tables", &self.graph.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build the complete snapshot for one keyspace.
pub fn build_keyspace_schema(
    metadata: KeyspaceMetadata,
    version: SchemaVersion,
    naming: NamingConfig,
    env: ExecutionEnv,
) -> Result<KeyspaceSchema, SchemaError> {
    let naming = NamingContext::build(&metadata, naming)?;
    let graph = TypeGraph::build(&metadata, &naming)?;
    let schema = materialize(&graph, &metadata, env)?;
    Ok(KeyspaceSchema {
        keyspace: metadata.name.clone(),
        version,
        metadata,
        naming,
        graph,
        schema,
    })
}

// ============================================================================
// Type references
// ============================================================================

fn output_type(wire: &WireType) -> TypeRef {
    match wire {
        WireType::Scalar(s) => TypeRef::named(s.name()),
        WireType::List(inner) => TypeRef::List(Box::new(output_type(inner))),
        WireType::Entry(k, v) => TypeRef::named(entry_type_name(k, v)),
    }
}

fn input_type(wire: &WireType) -> TypeRef {
    match wire {
        WireType::Scalar(s) => TypeRef::named(s.name()),
        WireType::List(inner) => TypeRef::List(Box::new(input_type(inner))),
        WireType::Entry(k, v) => TypeRef::named(entry_input_type_name(k, v)),
    }
}

/// Shape a wire value for output under its wire type.
fn field_value(value: &WireValue, wire: &WireType) -> FieldValue<'static> {
    match (value, wire) {
        (WireValue::Null, _) => FieldValue::NULL,
        (WireValue::List(items), WireType::List(inner)) => {
            FieldValue::list(items.iter().map(|item| field_value(item, inner)))
        }
        (WireValue::Pair(k, v), WireType::Entry(_, _)) => FieldValue::owned_any(EntryValue {
            key: (**k).clone(),
            value: (**v).clone(),
        }),
        (value, _) => FieldValue::value(to_const(value)),
    }
}

fn arg(ctx: &ResolverContext<'_>, name: &str) -> Option<ConstValue> {
    ctx.args
        .get(name)
        .map(|v| v.as_value().clone())
        .filter(|v| !matches!(v, ConstValue::Null))
}

fn flag(ctx: &ResolverContext<'_>, name: &str) -> bool {
    matches!(arg(ctx, name), Some(ConstValue::Boolean(true)))
}

// ============================================================================
// Shared types
// ============================================================================

fn scalars() -> Vec<Scalar> {
    WireScalar::ALL
        .into_iter()
        .filter(|s| !s.is_builtin())
        .map(|s| Scalar::new(s.name()).description(s.description()))
        .collect()
}

fn consistency_enums() -> [Enum; 2] {
    let consistency = Consistency::ALL_LEVELS
        .into_iter()
        .fold(Enum::new(CONSISTENCY_ENUM), |e, level| {
            e.item(EnumItem::new(level.as_str()))
        });
    let serial = Enum::new(SERIAL_CONSISTENCY_ENUM)
        .item(EnumItem::new("SERIAL"))
        .item(EnumItem::new("LOCAL_SERIAL"));
    [consistency, serial]
}

fn option_inputs() -> [InputObject; 2] {
    let query = InputObject::new(QUERY_OPTIONS)
        .field(InputValue::new("consistency", TypeRef::named(CONSISTENCY_ENUM)))
        .field(InputValue::new(
            "serialConsistency",
            TypeRef::named(SERIAL_CONSISTENCY_ENUM),
        ))
        .field(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
        .field(InputValue::new("pageSize", TypeRef::named(TypeRef::INT)))
        .field(InputValue::new("pageState", TypeRef::named(TypeRef::STRING)));
    let mutation = InputObject::new(MUTATION_OPTIONS)
        .field(InputValue::new("consistency", TypeRef::named(CONSISTENCY_ENUM)))
        .field(InputValue::new(
            "serialConsistency",
            TypeRef::named(SERIAL_CONSISTENCY_ENUM),
        ))
        .field(InputValue::new("ttl", TypeRef::named(TypeRef::INT)));
    [query, mutation]
}

/// Filter input shared by every column of one wire type.
fn filter_input(wire: &WireType) -> InputObject {
    Operator::ALL
        .into_iter()
        .fold(InputObject::new(filter_type_name(wire)), |input, op| {
            let ty = match op {
                Operator::In => TypeRef::List(Box::new(input_type(wire))),
                _ => input_type(wire),
            };
            input.field(InputValue::new(op.field_name(), ty))
        })
}

fn entry_object(key: &WireType, value: &WireType) -> Object {
    let key_type = key.clone();
    let value_type = value.clone();
    Object::new(entry_type_name(key, value))
        .field(Field::new("key", output_type(key), move |ctx| {
            let wire = key_type.clone();
            FieldFuture::new(async move {
                let entry = ctx.parent_value.try_downcast_ref::<EntryValue>()?;
                Ok(Some(field_value(&entry.key, &wire)))
            })
        }))
        .field(Field::new("value", output_type(value), move |ctx| {
            let wire = value_type.clone();
            FieldFuture::new(async move {
                let entry = ctx.parent_value.try_downcast_ref::<EntryValue>()?;
                Ok(Some(field_value(&entry.value, &wire)))
            })
        }))
}

fn entry_input(key: &WireType, value: &WireType) -> InputObject {
    InputObject::new(entry_input_type_name(key, value))
        .field(InputValue::new("key", input_type(key)))
        .field(InputValue::new("value", input_type(value)))
}

// ============================================================================
// Per-table types
// ============================================================================

fn value_object(types: &TableTypes) -> Object {
    types.fields.iter().fold(Object::new(&types.value_type), |object, f| {
        let column = f.column.clone();
        let wire = f.wire_type.clone();
        object.field(Field::new(&f.field, output_type(&f.wire_type), move |ctx| {
            let column = column.clone();
            let wire = wire.clone();
            FieldFuture::new(async move {
                let row = ctx.parent_value.try_downcast_ref::<RowValue>()?;
                Ok(Some(field_value(row.get(&column), &wire)))
            })
        }))
    })
}

fn scalar_input(types: &TableTypes) -> InputObject {
    types
        .fields
        .iter()
        .fold(InputObject::new(&types.input_type), |input, f| {
            input.field(InputValue::new(&f.field, input_type(&f.wire_type)))
        })
}

fn filter_object(types: &TableTypes) -> InputObject {
    types
        .fields
        .iter()
        .fold(InputObject::new(&types.filter_type), |input, f| {
            input.field(InputValue::new(
                &f.field,
                TypeRef::named(filter_type_name(&f.wire_type)),
            ))
        })
}

fn order_enum(types: &TableTypes) -> Enum {
    types
        .order_values
        .iter()
        .fold(Enum::new(&types.order_enum), |e, v| e.item(EnumItem::new(&v.name)))
}

fn result_object(types: &TableTypes) -> Object {
    Object::new(&types.result_type)
        .field(Field::new(
            "values",
            TypeRef::named_nn_list_nn(&types.value_type),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<SelectPage>()?;
                    Ok(Some(FieldValue::list(
                        page.values.iter().cloned().map(FieldValue::owned_any),
                    )))
                })
            },
        ))
        .field(Field::new(
            "pageState",
            TypeRef::named(TypeRef::STRING),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<SelectPage>()?;
                    Ok(page.page_state.clone().map(FieldValue::value))
                })
            },
        ))
}

fn mutation_result_object(types: &TableTypes) -> Object {
    Object::new(&types.mutation_result_type)
        .field(Field::new(
            "applied",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |ctx| {
                FieldFuture::new(async move {
                    let outcome = ctx.parent_value.try_downcast_ref::<MutationOutcome>()?;
                    Ok(Some(FieldValue::value(outcome.applied)))
                })
            },
        ))
        .field(Field::new(
            "value",
            TypeRef::named(&types.value_type),
            |ctx| {
                FieldFuture::new(async move {
                    let outcome = ctx.parent_value.try_downcast_ref::<MutationOutcome>()?;
                    Ok(outcome.value.clone().map(FieldValue::owned_any))
                })
            },
        ))
}

fn query_field(table: Arc<TableContext>) -> Field {
    let types = &table.types;
    Field::new(
        types.query_field.clone(),
        TypeRef::named(&types.result_type),
        {
            let table = table.clone();
            move |ctx| {
                let table = table.clone();
                FieldFuture::new(async move {
                    let env = ctx.data::<ExecutionEnv>()?;
                    let args = SelectArgs {
                        value: arg(&ctx, "value"),
                        filter: arg(&ctx, "filter"),
                        order_by: arg(&ctx, "orderBy"),
                        options: arg(&ctx, "options"),
                    };
                    let page = resolvers::select(&table, env, ctx.data_opt::<RequestContext>(), args)
                        .await
                        .map_err(|e| e.extend())?;
                    Ok(Some(FieldValue::owned_any(page)))
                })
            }
        },
    )
    .argument(InputValue::new("value", TypeRef::named(&types.input_type)))
    .argument(InputValue::new("filter", TypeRef::named(&types.filter_type)))
    .argument(InputValue::new(
        "orderBy",
        TypeRef::named_nn_list(&types.order_enum),
    ))
    .argument(InputValue::new("options", TypeRef::named(QUERY_OPTIONS)))
}

#[derive(Clone, Copy)]
enum MutationKind {
    Insert,
    Update,
    Delete,
}

fn mutation_field(table: Arc<TableContext>, kind: MutationKind) -> Field {
    let types = &table.types;
    let name = match kind {
        MutationKind::Insert => types.insert_field.clone(),
        MutationKind::Update => types.update_field.clone(),
        MutationKind::Delete => types.delete_field.clone(),
    };
    let field = Field::new(name, TypeRef::named(&types.mutation_result_type), {
        let table = table.clone();
        move |ctx| {
            let table = table.clone();
            FieldFuture::new(async move {
                let env = ctx.data::<ExecutionEnv>()?;
                let request = ctx.data_opt::<RequestContext>();
                let args = MutationArgs {
                    value: arg(&ctx, "value"),
                    if_not_exists: flag(&ctx, "ifNotExists"),
                    if_exists: flag(&ctx, "ifExists"),
                    if_condition: arg(&ctx, "ifCondition"),
                    options: arg(&ctx, "options"),
                };
                let outcome = match kind {
                    MutationKind::Insert => resolvers::insert(&table, env, request, args).await,
                    MutationKind::Update => resolvers::update(&table, env, request, args).await,
                    MutationKind::Delete => resolvers::delete(&table, env, request, args).await,
                }
                .map_err(|e| e.extend())?;
                Ok(Some(FieldValue::owned_any(outcome)))
            })
        }
    })
    .argument(InputValue::new("value", TypeRef::named_nn(&types.input_type)));

    let field = match kind {
        MutationKind::Insert => {
            field.argument(InputValue::new("ifNotExists", TypeRef::named(TypeRef::BOOLEAN)))
        }
        MutationKind::Update | MutationKind::Delete => field
            .argument(InputValue::new("ifExists", TypeRef::named(TypeRef::BOOLEAN)))
            .argument(InputValue::new(
                "ifCondition",
                TypeRef::named(&types.filter_type),
            )),
    };
    field.argument(InputValue::new("options", TypeRef::named(MUTATION_OPTIONS)))
}

// ============================================================================
// Assembly
// ============================================================================

/// Turn the graph into an executable schema. Name and type validation
/// happens here.
pub fn materialize(
    graph: &TypeGraph,
    metadata: &KeyspaceMetadata,
    env: ExecutionEnv,
) -> Result<Schema, SchemaError> {
    let mut query = Object::new(QUERY_TYPE);
    let mut mutation = Object::new(MUTATION_TYPE);
    let mut types: Vec<async_graphql::dynamic::Type> = Vec::new();

    for scalar in scalars() {
        types.push(scalar.into());
    }
    for e in consistency_enums() {
        types.push(e.into());
    }
    for input in option_inputs() {
        types.push(input.into());
    }
    for (key, value) in &graph.entry_types {
        types.push(entry_object(key, value).into());
        types.push(entry_input(key, value).into());
    }
    for wire in &graph.filter_types {
        types.push(filter_input(wire).into());
    }

    for (table_name, table_types) in &graph.tables {
        let table_metadata = metadata.table(table_name).ok_or_else(|| {
            SchemaError::Invalid(format!("table {} missing from metadata", table_name))
        })?;
        let table = Arc::new(TableContext {
            keyspace: graph.keyspace.clone(),
            types: table_types.clone(),
            metadata: table_metadata.clone(),
        });

        types.push(order_enum(table_types).into());
        types.push(value_object(table_types).into());
        types.push(scalar_input(table_types).into());
        types.push(filter_object(table_types).into());
        types.push(result_object(table_types).into());
        types.push(mutation_result_object(table_types).into());

        query = query.field(query_field(table.clone()));
        mutation = mutation
            .field(mutation_field(table.clone(), MutationKind::Insert))
            .field(mutation_field(table.clone(), MutationKind::Update))
            .field(mutation_field(table, MutationKind::Delete));
    }

    let has_mutations = !graph.is_empty();
    if graph.is_empty() {
        let keyspace = graph.keyspace.clone();
        query = query.field(Field::new(
            KEYSPACE_PLACEHOLDER_FIELD,
            TypeRef::named_nn(TypeRef::STRING),
            move |_| {
                let keyspace = keyspace.clone();
                FieldFuture::new(async move { Ok(Some(FieldValue::value(keyspace))) })
            },
        ));
    }

    let mut builder = Schema::build(
        QUERY_TYPE,
        has_mutations.then_some(MUTATION_TYPE),
        None,
    )
    .register(query);
    if has_mutations {
        builder = builder.register(mutation);
    }
    for ty in types {
        builder = builder.register(ty);
    }
    builder
        .data(env)
        .extension(Tracing)
        .finish()
        .map_err(|e| SchemaError::Invalid(e.to_string()))
}
