//! Table DDL rendering for the admin schema. DDL statements take no
//! parameters.

use super::{CompiledStatement, TableRef, quote_ident};
use crate::error::CompileError;
use crate::store::{ClusteringOrder, NativeType};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub native_type: NativeType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
        }
    }

    fn render(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.native_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: TableRef,
    pub partition_key: Vec<ColumnDef>,
    pub clustering_key: Vec<(ColumnDef, ClusteringOrder)>,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTable {
    Add(Vec<ColumnDef>),
    Drop(Vec<String>),
}

/// `CREATE TABLE [IF NOT EXISTS] t (..., PRIMARY KEY ((pk...), ck...))
/// [WITH CLUSTERING ORDER BY (...)]`
pub fn compile_create_table(create: &CreateTable) -> Result<CompiledStatement, CompileError> {
    if create.partition_key.is_empty() {
        return Err(CompileError::EmptyColumnSet("CREATE TABLE partition key"));
    }

    let definitions: Vec<String> = create
        .partition_key
        .iter()
        .chain(create.clustering_key.iter().map(|(c, _)| c))
        .chain(create.columns.iter())
        .map(ColumnDef::render)
        .collect();
    let partition = create
        .partition_key
        .iter()
        .map(|c| quote_ident(&c.name).into_owned())
        .collect::<Vec<_>>()
        .join(", ");
    let mut primary_key = format!("({})", partition);
    for (column, _) in &create.clustering_key {
        primary_key.push_str(", ");
        primary_key.push_str(&quote_ident(&column.name));
    }

    let mut text = String::from("CREATE TABLE ");
    if create.if_not_exists {
        text.push_str("IF NOT EXISTS ");
    }
    text.push_str(&format!(
        "{} ({}, PRIMARY KEY ({}))",
        create.table,
        definitions.join(", "),
        primary_key
    ));
    if create
        .clustering_key
        .iter()
        .any(|(_, order)| *order == ClusteringOrder::Desc)
    {
        let order = create
            .clustering_key
            .iter()
            .map(|(c, o)| format!("{} {}", quote_ident(&c.name), o.as_cql()))
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!(" WITH CLUSTERING ORDER BY ({})", order));
    }
    Ok(CompiledStatement::new(text))
}

/// `ALTER TABLE t ADD (...)` / `ALTER TABLE t DROP (...)`
pub fn compile_alter_table(
    table: &TableRef,
    alter: &AlterTable,
) -> Result<CompiledStatement, CompileError> {
    let (verb, columns): (&str, Vec<String>) = match alter {
        AlterTable::Add(columns) => ("ADD", columns.iter().map(ColumnDef::render).collect()),
        AlterTable::Drop(columns) => (
            "DROP",
            columns.iter().map(|c| quote_ident(c).into_owned()).collect(),
        ),
    };
    if columns.is_empty() {
        return Err(CompileError::EmptyColumnSet("ALTER TABLE"));
    }
    Ok(CompiledStatement::new(format!(
        "ALTER TABLE {} {} ({})",
        table,
        verb,
        columns.join(", ")
    )))
}

/// `DROP TABLE [IF EXISTS] t`
pub fn compile_drop_table(table: &TableRef, if_exists: bool) -> CompiledStatement {
    let guard = if if_exists { "IF EXISTS " } else { "" };
    CompiledStatement::new(format!("DROP TABLE {}{}", guard, table))
}
