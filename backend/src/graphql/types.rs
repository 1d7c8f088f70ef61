//! The per-keyspace type graph: which types and root fields the generated
//! schema contains, before it is materialized into an executable schema.

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::{WireType, wire_type};
use crate::error::SchemaError;
use crate::store::{ClusteringOrder, ColumnKind, KeyspaceMetadata, NativeType, TableMetadata};

use super::naming::NamingContext;

pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";
pub const QUERY_OPTIONS: &str = "QueryOptions";
pub const MUTATION_OPTIONS: &str = "MutationOptions";
pub const CONSISTENCY_ENUM: &str = "Consistency";
pub const SERIAL_CONSISTENCY_ENUM: &str = "SerialConsistency";
/// Root field of a keyspace that has no tables yet.
pub const KEYSPACE_PLACEHOLDER_FIELD: &str = "_keyspace";

/// Shared filter input for one wire type.
pub fn filter_type_name(wire: &WireType) -> String {
    format!("{}FilterInput", wire.type_name())
}

pub fn entry_type_name(key: &WireType, value: &WireType) -> String {
    WireType::Entry(Box::new(key.clone()), Box::new(value.clone())).type_name()
}

pub fn entry_input_type_name(key: &WireType, value: &WireType) -> String {
    format!("{}Input", entry_type_name(key, value))
}

/// One column as a field of the generated types.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnField {
    pub column: String,
    pub field: String,
    pub kind: ColumnKind,
    pub native_type: NativeType,
    pub wire_type: WireType,
}

/// One entry of a table's order enum.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderValue {
    pub name: String,
    pub column: String,
    pub order: ClusteringOrder,
}

/// The six generated types of one table plus its root fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TableTypes {
    pub table: String,
    pub value_type: String,
    pub input_type: String,
    pub filter_type: String,
    pub order_enum: String,
    pub result_type: String,
    pub mutation_result_type: String,
    pub query_field: String,
    pub insert_field: String,
    pub update_field: String,
    pub delete_field: String,
    /// Partition key, clustering key, then the other columns by name
    pub fields: Vec<ColumnField>,
    pub order_values: Vec<OrderValue>,
}

impl TableTypes {
    pub fn field(&self, field: &str) -> Option<&ColumnField> {
        self.fields.iter().find(|f| f.field == field)
    }

    pub fn order_value(&self, name: &str) -> Option<&OrderValue> {
        self.order_values.iter().find(|o| o.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeGraph {
    pub keyspace: String,
    /// storage table -> its types
    pub tables: BTreeMap<String, TableTypes>,
    /// Wire types that need a shared filter input
    pub filter_types: BTreeSet<WireType>,
    /// `(key, value)` wire types of map entries
    pub entry_types: BTreeSet<(WireType, WireType)>,
}

impl TypeGraph {
    /// Derive the graph from a metadata snapshot and its naming context.
    pub fn build(metadata: &KeyspaceMetadata, naming: &NamingContext) -> Result<Self, SchemaError> {
        let mut graph = TypeGraph {
            keyspace: metadata.name.clone(),
            tables: BTreeMap::new(),
            filter_types: BTreeSet::new(),
            entry_types: BTreeSet::new(),
        };
        for table_name in metadata.table_names() {
            let Some(table) = metadata.table(table_name) else {
                continue;
            };
            let types = graph.table_types(table, naming)?;
            graph.tables.insert(table_name.to_string(), types);
        }
        Ok(graph)
    }

    fn table_types(
        &mut self,
        table: &TableMetadata,
        naming: &NamingContext,
    ) -> Result<TableTypes, SchemaError> {
        let names = naming
            .table(&table.name)
            .ok_or_else(|| SchemaError::Invalid(format!("no API name for table {}", table.name)))?;

        let mut fields = Vec::new();
        for column in table.ordered_columns() {
            let field = names.field(&column.name).ok_or_else(|| {
                SchemaError::Invalid(format!("no API name for column {}", column.name))
            })?;
            let wire = wire_type(&column.native_type);
            self.filter_types.insert(wire.clone());
            for (key, value) in wire.entries() {
                self.entry_types.insert((key.clone(), value.clone()));
            }
            fields.push(ColumnField {
                column: column.name.clone(),
                field: field.to_string(),
                kind: column.kind,
                native_type: column.native_type.clone(),
                wire_type: wire,
            });
        }

        // Order enum first: two values per column.
        let order_values = fields
            .iter()
            .flat_map(|f| {
                [ClusteringOrder::Asc, ClusteringOrder::Desc].map(|order| OrderValue {
                    name: format!("{}_{}", f.field, order.as_cql()),
                    column: f.column.clone(),
                    order,
                })
            })
            .collect();

        let type_name = &names.type_name;
        Ok(TableTypes {
            table: table.name.clone(),
            value_type: type_name.clone(),
            input_type: format!("{}Input", type_name),
            filter_type: format!("{}FilterInput", type_name),
            order_enum: format!("{}Order", type_name),
            result_type: format!("{}Result", type_name),
            mutation_result_type: format!("{}MutationResult", type_name),
            query_field: names.field_name.clone(),
            insert_field: format!("insert{}", type_name),
            update_field: format!("update{}", type_name),
            delete_field: format!("delete{}", type_name),
            fields,
            order_values,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, storage_table: &str) -> Option<&TableTypes> {
        self.tables.get(storage_table)
    }

    /// Names of every query-root field, in table order.
    pub fn query_fields(&self) -> Vec<&str> {
        if self.tables.is_empty() {
            return vec![KEYSPACE_PLACEHOLDER_FIELD];
        }
        self.tables.values().map(|t| t.query_field.as_str()).collect()
    }
}
