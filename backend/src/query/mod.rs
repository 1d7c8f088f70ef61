//! Structured query intents and their compilation to parameterized CQL.

mod compiler;
pub mod ddl;

pub use compiler::{
    compile_delete, compile_insert, compile_select, compile_update, is_reserved_keyword, quote_ident,
};

use std::fmt;

use crate::store::{ClusteringOrder, StorageValue, TableMetadata};

/// Statement text plus its positional parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub text: String,
    pub params: Vec<StorageValue>,
}

impl CompiledStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A table, optionally qualified by its keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub keyspace: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: Some(keyspace.into()),
            table: table.into(),
        }
    }

    pub fn unqualified(table: impl Into<String>) -> Self {
        Self {
            keyspace: None,
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.keyspace {
            Some(ks) => write!(f, "{}.{}", quote_ident(ks), quote_ident(&self.table)),
            None => f.write_str(&quote_ident(&self.table)),
        }
    }
}

/// Comparison operators a filter or condition may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
    ];

    pub fn as_cql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
        }
    }

    /// Field name used in filter input types.
    pub fn field_name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::NotEq => "notEq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Operator::ALL.into_iter().find(|op| op.field_name() == name)
    }

    pub fn from_cql(token: &str) -> Option<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_cql().eq_ignore_ascii_case(token))
    }
}

/// `column op value`. For `In` the value is a list whose elements each become
/// one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    pub value: StorageValue,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Operator, value: StorageValue) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: StorageValue) -> Self {
        Self::new(column, Operator::Eq, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: ClusteringOrder,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, order: ClusteringOrder) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }
}

/// Read rows. Paging travels with the execution request, not in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: TableRef,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i32>,
}

impl Select {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub values: Vec<StorageValue>,
    pub if_not_exists: bool,
    pub ttl: Option<i32>,
}

impl Insert {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
            if_not_exists: false,
            ttl: None,
        }
    }
}

/// Write columns of one row. `columns` mixes key and non-key columns;
/// `key_columns` says which is which.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TableRef,
    pub key_columns: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<StorageValue>,
    pub if_exists: bool,
    pub if_condition: Vec<Predicate>,
    pub ttl: Option<i32>,
}

impl Update {
    pub fn new(table: TableRef, metadata: &TableMetadata) -> Self {
        Self {
            table,
            key_columns: metadata
                .partition_key
                .iter()
                .chain(metadata.clustering_key.iter())
                .cloned()
                .collect(),
            columns: Vec::new(),
            values: Vec::new(),
            if_exists: false,
            if_condition: Vec::new(),
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub values: Vec<StorageValue>,
    pub if_exists: bool,
    pub if_condition: Vec<Predicate>,
}

impl Delete {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
            if_exists: false,
            if_condition: Vec::new(),
        }
    }
}
