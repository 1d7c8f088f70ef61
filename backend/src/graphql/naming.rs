//! Bidirectional mapping between storage identifiers and API identifiers.
//!
//! Built once per metadata snapshot. Within a snapshot each direction is a
//! bijection: API type names are unique across the keyspace (together with
//! the names derived from them), field names are unique within their table.
//! Collisions get the smallest free numeric suffix starting at 2.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use convert_case::{Case, Casing};

use crate::codec::{WireScalar, WireType, wire_type};
use crate::error::SchemaError;
use crate::store::KeyspaceMetadata;

/// Upper bound on the suffix search for one name.
pub const MAX_NAME_ATTEMPTS: usize = 1000;

/// Names the generated schema defines independently of any table.
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    "Query",
    "Mutation",
    "Subscription",
    "QueryOptions",
    "MutationOptions",
    "Consistency",
    "SerialConsistency",
    "ID",
];

/// Suffixes of the per-table types derived from a table's type name.
pub const DERIVED_SUFFIXES: &[&str] = &["Input", "FilterInput", "Order", "Result", "MutationResult"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameCase {
    #[default]
    Pascal,
    Camel,
    Snake,
    Preserve,
}

impl NameCase {
    pub fn apply(self, name: &str) -> String {
        match self {
            NameCase::Pascal => name.to_case(Case::Pascal),
            NameCase::Camel => name.to_case(Case::Camel),
            NameCase::Snake => name.to_case(Case::Snake),
            NameCase::Preserve => name.to_string(),
        }
    }
}

impl FromStr for NameCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pascal" => Ok(NameCase::Pascal),
            "camel" => Ok(NameCase::Camel),
            "snake" => Ok(NameCase::Snake),
            "preserve" | "none" => Ok(NameCase::Preserve),
            other => Err(format!("unknown name case '{}'", other)),
        }
    }
}

impl fmt::Display for NameCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameCase::Pascal => "pascal",
            NameCase::Camel => "camel",
            NameCase::Snake => "snake",
            NameCase::Preserve => "preserve",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingConfig {
    pub type_case: NameCase,
    pub field_case: NameCase,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            type_case: NameCase::Pascal,
            field_case: NameCase::Camel,
        }
    }
}

/// Coerce a string into the GraphQL name grammar `[_A-Za-z][_0-9A-Za-z]*`
/// without a leading `__`.
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    while out.starts_with("__") {
        out.remove(0);
    }
    out
}

/// Try `base`, `base2`, `base3`, ... until `free` accepts one.
fn first_free(base: &str, mut free: impl FnMut(&str) -> bool) -> Result<String, SchemaError> {
    if free(base) {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_NAME_ATTEMPTS {
        let candidate = format!("{}{}", base, n);
        if free(&candidate) {
            return Ok(candidate);
        }
    }
    Err(SchemaError::NameConflict {
        name: base.to_string(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// Names chosen for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNames {
    pub type_name: String,
    pub field_name: String,
    /// storage column -> API field
    columns: HashMap<String, String>,
    /// API field -> storage column
    fields: HashMap<String, String>,
}

impl TableNames {
    pub fn field(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn column(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamingContext {
    config: NamingConfig,
    /// storage table -> names
    tables: HashMap<String, TableNames>,
    /// API type name -> storage table
    by_type: HashMap<String, String>,
    /// query root field -> storage table
    by_field: HashMap<String, String>,
}

impl NamingContext {
    pub fn build(keyspace: &KeyspaceMetadata, config: NamingConfig) -> Result<Self, SchemaError> {
        let mut taken: HashSet<String> = RESERVED_TYPE_NAMES.iter().map(|s| s.to_string()).collect();
        for scalar in WireScalar::ALL {
            taken.insert(scalar.name().to_string());
        }
        // Shared types generated from this keyspace's column types.
        for table in keyspace.tables.values() {
            for column in table.columns.values() {
                reserve_wire_names(&wire_type(&column.native_type), &mut taken);
            }
        }

        let mut ctx = Self {
            config,
            tables: HashMap::new(),
            by_type: HashMap::new(),
            by_field: HashMap::new(),
        };
        let mut root_fields: HashSet<String> = HashSet::new();
        for table_name in keyspace.table_names() {
            let Some(table) = keyspace.table(table_name) else {
                continue;
            };
            let base = sanitize(&config.type_case.apply(table_name));
            let type_name = first_free(&base, |candidate| {
                !taken.contains(candidate)
                    && !DERIVED_SUFFIXES
                        .iter()
                        .any(|suffix| taken.contains(&format!("{}{}", candidate, suffix)))
                    && !root_fields.contains(&field_form(config, candidate))
            })?;
            taken.insert(type_name.clone());
            for suffix in DERIVED_SUFFIXES {
                taken.insert(format!("{}{}", type_name, suffix));
            }
            let field_name = field_form(config, &type_name);
            root_fields.insert(field_name.clone());

            let mut columns = HashMap::new();
            let mut fields = HashMap::new();
            for column in table.ordered_columns() {
                let base = sanitize(&config.field_case.apply(&column.name));
                let field = first_free(&base, |candidate| !fields.contains_key(candidate))?;
                columns.insert(column.name.clone(), field.clone());
                fields.insert(field, column.name.clone());
            }

            ctx.by_type.insert(type_name.clone(), table_name.to_string());
            ctx.by_field.insert(field_name.clone(), table_name.to_string());
            ctx.tables.insert(
                table_name.to_string(),
                TableNames {
                    type_name,
                    field_name,
                    columns,
                    fields,
                },
            );
        }
        Ok(ctx)
    }

    pub fn config(&self) -> NamingConfig {
        self.config
    }

    pub fn table(&self, storage_table: &str) -> Option<&TableNames> {
        self.tables.get(storage_table)
    }

    pub fn type_name(&self, storage_table: &str) -> Option<&str> {
        self.tables.get(storage_table).map(|t| t.type_name.as_str())
    }

    pub fn column_field(&self, storage_table: &str, storage_column: &str) -> Option<&str> {
        self.tables.get(storage_table)?.field(storage_column)
    }

    /// Storage table for an API type name or query field name. Unknown names
    /// fall back to snake case, which is how not-yet-existing tables are
    /// named by DDL.
    pub fn to_storage_table(&self, api_name: &str) -> String {
        self.by_type
            .get(api_name)
            .or_else(|| self.by_field.get(api_name))
            .cloned()
            .unwrap_or_else(|| api_name.to_case(Case::Snake))
    }

    /// Storage column for an API field of a storage table, with the same
    /// snake case fallback.
    pub fn to_storage_column(&self, storage_table: &str, api_field: &str) -> String {
        self.tables
            .get(storage_table)
            .and_then(|t| t.column(api_field))
            .map(str::to_string)
            .unwrap_or_else(|| api_field.to_case(Case::Snake))
    }
}

/// Query-root field for a type name.
fn field_form(config: NamingConfig, type_name: &str) -> String {
    sanitize(&config.field_case.apply(type_name))
}

/// Shared filter and entry types generated for a column's wire type.
fn reserve_wire_names(wire: &WireType, taken: &mut HashSet<String>) {
    taken.insert(format!("{}FilterInput", wire.type_name()));
    for (key, value) in wire.entries() {
        let entry = WireType::Entry(Box::new(key.clone()), Box::new(value.clone())).type_name();
        taken.insert(format!("{}Input", entry));
        taken.insert(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnKind, ColumnMetadata, NativeType, TableMetadata};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn table(name: &str, columns: &[&str]) -> TableMetadata {
        let mut defs = vec![ColumnMetadata::new("id", ColumnKind::PartitionKey, NativeType::Int)];
        for c in columns {
            defs.push(ColumnMetadata::new(*c, ColumnKind::Regular, NativeType::Text));
        }
        TableMetadata::new(name, defs)
    }

    fn keyspace(tables: Vec<TableMetadata>) -> KeyspaceMetadata {
        tables
            .into_iter()
            .fold(KeyspaceMetadata::new("ks"), |ks, t| ks.with_table(t))
    }

    #[test]
    fn test_case_collision_gets_numeric_suffix() {
        let ks = keyspace(vec![table("Foo", &[]), table("foo", &[])]);
        let naming = NamingContext::build(&ks, NamingConfig::default()).unwrap();
        assert_eq!(naming.type_name("Foo"), Some("Foo"));
        assert_eq!(naming.type_name("foo"), Some("Foo2"));
        assert_eq!(naming.to_storage_table("Foo"), "Foo");
        assert_eq!(naming.to_storage_table("Foo2"), "foo");
        assert_eq!(naming.to_storage_table("foo2"), "foo");
    }

    #[test]
    fn test_column_names_and_reverse_lookup() {
        let ks = keyspace(vec![table("user_events", &["created_at", "createdAt"])]);
        let naming = NamingContext::build(&ks, NamingConfig::default()).unwrap();
        let names = naming.table("user_events").unwrap();
        assert_eq!(names.type_name, "UserEvents");
        assert_eq!(names.field_name, "userEvents");
        // "createdAt" sorts before "created_at" and claims the name first
        assert_eq!(names.field("createdAt"), Some("createdAt"));
        assert_eq!(names.field("created_at"), Some("createdAt2"));
        assert_eq!(naming.to_storage_column("user_events", "createdAt2"), "created_at");
    }

    #[test]
    fn test_storage_fallback_for_unknown_names() {
        let naming = NamingContext::build(&keyspace(vec![]), NamingConfig::default()).unwrap();
        assert_eq!(naming.to_storage_table("NewTable"), "new_table");
        assert_eq!(naming.to_storage_column("new_table", "firstName"), "first_name");
    }

    #[test]
    fn test_reserved_and_derived_names_are_avoided() {
        let ks = keyspace(vec![
            table("query", &[]),
            table("int", &[]),
            table("book", &[]),
            table("book_result", &[]),
        ]);
        let naming = NamingContext::build(&ks, NamingConfig::default()).unwrap();
        assert_eq!(naming.type_name("query"), Some("Query2"));
        assert_eq!(naming.type_name("int"), Some("Int2"));
        assert_eq!(naming.type_name("book"), Some("Book"));
        // "BookResult" is derived from "Book"
        assert_eq!(naming.type_name("book_result"), Some("BookResult2"));
    }

    #[test]
    fn test_shared_filter_names_are_reserved() {
        let ks = keyspace(vec![table("string_filter", &["note"])]);
        let naming = NamingContext::build(&ks, NamingConfig::default()).unwrap();
        // StringFilterInput is the shared filter type for text columns
        assert_eq!(naming.type_name("string_filter"), Some("StringFilter2"));
    }

    #[test]
    fn test_preserve_case_keeps_root_fields_unique() {
        let config = NamingConfig {
            type_case: NameCase::Preserve,
            field_case: NameCase::Camel,
        };
        let ks = keyspace(vec![table("Foo", &[]), table("foo", &[])]);
        let naming = NamingContext::build(&ks, config).unwrap();
        assert_eq!(naming.type_name("Foo"), Some("Foo"));
        assert_eq!(naming.type_name("foo"), Some("foo2"));
    }

    #[test]
    fn test_suffix_search_is_bounded() {
        let mut taken = 0;
        let err = first_free("X", |_| {
            taken += 1;
            false
        })
        .unwrap_err();
        assert_matches!(err, SchemaError::NameConflict { attempts: MAX_NAME_ATTEMPTS, .. });
        assert_eq!(taken, MAX_NAME_ATTEMPTS);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a-b c"), "a_b_c");
        assert_eq!(sanitize("__typename"), "_typename");
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("1x"), "_1x");
    }
}
