use std::borrow::Cow;

use super::{CompiledStatement, Delete, Insert, Operator, Predicate, Select, Update};
use crate::error::CompileError;
use crate::store::StorageValue;

/// Keywords CQL reserves; a column or table with one of these names only
/// parses when quoted. Sorted for binary search.
const RESERVED_KEYWORDS: &[&str] = &[
    "add", "allow", "alter", "and", "apply", "asc", "authorize", "batch", "begin", "by",
    "columnfamily", "create", "default", "delete", "desc", "describe", "drop", "entries",
    "execute", "from", "full", "grant", "if", "in", "index", "infinity", "insert", "into", "is",
    "key", "keyspace", "limit", "materialized", "mbean", "mbeans", "modify", "nan",
    "norecursive", "not", "null", "of", "on", "or", "order", "primary", "rename", "replace",
    "revoke", "schema", "select", "set", "table", "to", "token", "truncate", "unlogged",
    "unset", "update", "use", "using", "view", "where", "with",
];

/// Whether `word` (any case) is a reserved CQL keyword.
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS
        .binary_search(&word.to_ascii_lowercase().as_str())
        .is_ok()
}

/// Render an identifier bare when it is a plain lower-case CQL identifier,
/// double-quoted otherwise. Reserved keywords are always quoted.
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain && !is_reserved_keyword(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Accumulates statement text and parameters side by side.
#[derive(Default)]
struct StatementBuilder {
    text: String,
    params: Vec<StorageValue>,
}

impl StatementBuilder {
    fn push(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    fn bind(&mut self, value: StorageValue) -> &mut Self {
        self.text.push('?');
        self.params.push(value);
        self
    }

    /// `a = ? AND b IN (?, ?)`
    fn predicates(&mut self, predicates: &[Predicate]) -> &mut Self {
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.push(&quote_ident(&predicate.column))
                .push(" ")
                .push(predicate.op.as_cql())
                .push(" ");
            if predicate.op == Operator::In {
                let elements = match &predicate.value {
                    StorageValue::List(items) | StorageValue::Set(items) => items.clone(),
                    other => vec![other.clone()],
                };
                self.push("(");
                for (j, element) in elements.into_iter().enumerate() {
                    if j > 0 {
                        self.push(", ");
                    }
                    self.bind(element);
                }
                self.push(")");
            } else {
                self.bind(predicate.value.clone());
            }
        }
        self
    }

    fn conditional(&mut self, if_exists: bool, conditions: &[Predicate]) -> &mut Self {
        if if_exists {
            self.push(" IF EXISTS");
        } else if !conditions.is_empty() {
            self.push(" IF ").predicates(conditions);
        }
        self
    }

    fn finish(self) -> CompiledStatement {
        CompiledStatement {
            text: self.text,
            params: self.params,
        }
    }
}

fn check_counts(columns: usize, values: usize) -> Result<(), CompileError> {
    if columns != values {
        return Err(CompileError::ColumnValueMismatch { columns, values });
    }
    Ok(())
}

fn check_conditional(if_exists: bool, conditions: &[Predicate]) -> Result<(), CompileError> {
    if if_exists && !conditions.is_empty() {
        return Err(CompileError::ConflictingConditionalClauses);
    }
    Ok(())
}

/// `IN ()` matches nothing and real stores reject it, so an empty set is a
/// compile error rather than an empty result.
fn check_in_lists(predicates: &[Predicate]) -> Result<(), CompileError> {
    let empty = predicates.iter().find(|p| {
        p.op == Operator::In
            && matches!(&p.value, StorageValue::List(items) | StorageValue::Set(items) if items.is_empty())
    });
    match empty {
        Some(predicate) => Err(CompileError::EmptyInList(predicate.column.clone())),
        None => Ok(()),
    }
}

fn ttl(ttl: Option<i32>) -> Option<i32> {
    ttl.filter(|t| *t >= 0)
}

/// `SELECT * FROM t [WHERE ...] [ORDER BY ...] [LIMIT ?]`
pub fn compile_select(select: &Select) -> Result<CompiledStatement, CompileError> {
    check_in_lists(&select.predicates)?;
    let mut b = StatementBuilder::default();
    b.push("SELECT * FROM ").push(&select.table.to_string());
    if !select.predicates.is_empty() {
        b.push(" WHERE ").predicates(&select.predicates);
    }
    if !select.order_by.is_empty() {
        let order = select
            .order_by
            .iter()
            .map(|o| format!("{} {}", quote_ident(&o.column), o.order.as_cql()))
            .collect::<Vec<_>>()
            .join(", ");
        b.push(" ORDER BY ").push(&order);
    }
    if let Some(limit) = select.limit.filter(|l| *l > 0) {
        b.push(" LIMIT ").bind(StorageValue::Int(limit));
    }
    Ok(b.finish())
}

/// `INSERT INTO t (...) VALUES (...) [IF NOT EXISTS] [USING TTL ?]`
pub fn compile_insert(insert: &Insert) -> Result<CompiledStatement, CompileError> {
    if insert.columns.is_empty() {
        return Err(CompileError::EmptyColumnSet("INSERT"));
    }
    check_counts(insert.columns.len(), insert.values.len())?;

    let columns = insert
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut b = StatementBuilder::default();
    b.push("INSERT INTO ")
        .push(&insert.table.to_string())
        .push(" (")
        .push(&columns)
        .push(") VALUES (");
    for (i, value) in insert.values.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.bind(value.clone());
    }
    b.push(")");
    if insert.if_not_exists {
        b.push(" IF NOT EXISTS");
    }
    if let Some(ttl) = ttl(insert.ttl) {
        b.push(" USING TTL ").bind(StorageValue::Int(ttl));
    }
    Ok(b.finish())
}

/// `UPDATE t [USING TTL ?] SET ... WHERE ... [IF ...]`. Key columns always go
/// to WHERE in the order the caller gave them; the rest go to SET.
pub fn compile_update(update: &Update) -> Result<CompiledStatement, CompileError> {
    check_counts(update.columns.len(), update.values.len())?;
    check_conditional(update.if_exists, &update.if_condition)?;
    check_in_lists(&update.if_condition)?;

    let mut set = Vec::new();
    let mut keys = Vec::new();
    for (column, value) in update.columns.iter().zip(update.values.iter()) {
        if update.key_columns.contains(column) {
            keys.push(Predicate::eq(column.clone(), value.clone()));
        } else {
            set.push((column, value));
        }
    }
    if set.is_empty() {
        return Err(CompileError::EmptyColumnSet("UPDATE SET"));
    }
    if keys.is_empty() {
        return Err(CompileError::EmptyPredicateSet("UPDATE WHERE"));
    }

    let mut b = StatementBuilder::default();
    b.push("UPDATE ").push(&update.table.to_string());
    if let Some(ttl) = ttl(update.ttl) {
        b.push(" USING TTL ").bind(StorageValue::Int(ttl));
    }
    b.push(" SET ");
    for (i, (column, value)) in set.into_iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push(&quote_ident(column)).push(" = ").bind(value.clone());
    }
    b.push(" WHERE ")
        .predicates(&keys)
        .conditional(update.if_exists, &update.if_condition);
    Ok(b.finish())
}

/// `DELETE FROM t WHERE ... [IF ...]`
pub fn compile_delete(delete: &Delete) -> Result<CompiledStatement, CompileError> {
    if delete.columns.is_empty() {
        return Err(CompileError::EmptyPredicateSet("DELETE"));
    }
    check_counts(delete.columns.len(), delete.values.len())?;
    check_conditional(delete.if_exists, &delete.if_condition)?;
    check_in_lists(&delete.if_condition)?;

    let keys: Vec<Predicate> = delete
        .columns
        .iter()
        .zip(delete.values.iter())
        .map(|(c, v)| Predicate::eq(c.clone(), v.clone()))
        .collect();
    let mut b = StatementBuilder::default();
    b.push("DELETE FROM ")
        .push(&delete.table.to_string())
        .push(" WHERE ")
        .predicates(&keys)
        .conditional(delete.if_exists, &delete.if_condition);
    Ok(b.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OrderBy, TableRef};
    use crate::store::{ClusteringOrder, ColumnKind, ColumnMetadata, NativeType, TableMetadata};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn int(v: i32) -> StorageValue {
        StorageValue::Int(v)
    }

    #[test]
    fn test_select_builds_clauses_incrementally() {
        let mut select = Select::new(TableRef::new("ks1", "tbl1"));
        select.predicates.push(Predicate::eq("a", int(1)));
        let stmt = compile_select(&select).unwrap();
        assert_eq!(stmt.text, "SELECT * FROM ks1.tbl1 WHERE a = ?");
        assert_eq!(stmt.params, vec![int(1)]);

        select.predicates.push(Predicate::new("b", Operator::Gt, int(2)));
        let stmt = compile_select(&select).unwrap();
        assert_eq!(stmt.text, "SELECT * FROM ks1.tbl1 WHERE a = ? AND b > ?");
        assert_eq!(stmt.params, vec![int(1), int(2)]);

        select.order_by.push(OrderBy::new("c", ClusteringOrder::Desc));
        let stmt = compile_select(&select).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM ks1.tbl1 WHERE a = ? AND b > ? ORDER BY c DESC"
        );

        select.limit = Some(1);
        let stmt = compile_select(&select).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT * FROM ks1.tbl1 WHERE a = ? AND b > ? ORDER BY c DESC LIMIT ?"
        );
        assert_eq!(stmt.params, vec![int(1), int(2), int(1)]);
    }

    #[test]
    fn test_select_without_where_and_non_positive_limit() {
        let mut select = Select::new(TableRef::unqualified("tbl1"));
        select.limit = Some(0);
        let stmt = compile_select(&select).unwrap();
        assert_eq!(stmt.text, "SELECT * FROM tbl1");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_in_expands_one_placeholder_per_element() {
        let mut select = Select::new(TableRef::new("ks", "t"));
        select.predicates.push(Predicate::new(
            "id",
            Operator::In,
            StorageValue::List(vec![int(1), int(2), int(3)]),
        ));
        select.predicates.push(Predicate::new("n", Operator::Lte, int(9)));
        let stmt = compile_select(&select).unwrap();
        assert_eq!(stmt.text, "SELECT * FROM ks.t WHERE id IN (?, ?, ?) AND n <= ?");
        assert_eq!(stmt.params, vec![int(1), int(2), int(3), int(9)]);
    }

    #[test]
    fn test_insert_ttl_goes_last() {
        let mut insert = Insert::new(TableRef::unqualified("tbl1"));
        insert.columns = vec!["a".into()];
        insert.values = vec![StorageValue::Text("z".into())];
        insert.if_not_exists = true;
        insert.ttl = Some(3600);
        let stmt = compile_insert(&insert).unwrap();
        assert_eq!(
            stmt.text,
            "INSERT INTO tbl1 (a) VALUES (?) IF NOT EXISTS USING TTL ?"
        );
        assert_eq!(stmt.params, vec![StorageValue::Text("z".into()), int(3600)]);
    }

    #[test]
    fn test_insert_negative_ttl_is_ignored() {
        let mut insert = Insert::new(TableRef::new("ks", "t"));
        insert.columns = vec!["a".into(), "b".into()];
        insert.values = vec![int(1), int(2)];
        insert.ttl = Some(-1);
        let stmt = compile_insert(&insert).unwrap();
        assert_eq!(stmt.text, "INSERT INTO ks.t (a, b) VALUES (?, ?)");
    }

    fn composite_table() -> TableMetadata {
        TableMetadata::new(
            "tbl1",
            vec![
                ColumnMetadata::new("pk1", ColumnKind::PartitionKey, NativeType::Int),
                ColumnMetadata::new("pk2", ColumnKind::PartitionKey, NativeType::Int),
                ColumnMetadata::new("ck1", ColumnKind::ClusteringKey, NativeType::Int),
                ColumnMetadata::new("a", ColumnKind::Regular, NativeType::Int),
                ColumnMetadata::new("b", ColumnKind::Regular, NativeType::Int),
            ],
        )
    }

    #[test]
    fn test_update_routes_keys_to_where_in_caller_order() {
        let mut update = Update::new(TableRef::unqualified("tbl1"), &composite_table());
        update.columns = ["ck1", "a", "b", "pk2", "pk1"].map(String::from).to_vec();
        update.values = (1..=5).map(int).collect();
        let stmt = compile_update(&update).unwrap();
        assert_eq!(
            stmt.text,
            "UPDATE tbl1 SET a = ?, b = ? WHERE ck1 = ? AND pk2 = ? AND pk1 = ?"
        );
        assert_eq!(stmt.params, vec![int(2), int(3), int(1), int(4), int(5)]);
    }

    #[test]
    fn test_update_ttl_goes_first_and_condition_last() {
        let mut update = Update::new(TableRef::new("ks", "tbl1"), &composite_table());
        update.columns = ["pk1", "pk2", "ck1", "a"].map(String::from).to_vec();
        update.values = vec![int(1), int(2), int(3), int(4)];
        update.ttl = Some(60);
        update.if_condition = vec![Predicate::new("b", Operator::NotEq, int(7))];
        let stmt = compile_update(&update).unwrap();
        assert_eq!(
            stmt.text,
            "UPDATE ks.tbl1 USING TTL ? SET a = ? WHERE pk1 = ? AND pk2 = ? AND ck1 = ? IF b != ?"
        );
        assert_eq!(
            stmt.params,
            vec![int(60), int(4), int(1), int(2), int(3), int(7)]
        );
    }

    #[test]
    fn test_update_structural_errors() {
        let table = composite_table();
        let mut update = Update::new(TableRef::unqualified("tbl1"), &table);
        update.columns = vec!["pk1".into()];
        update.values = vec![int(1)];
        assert_matches!(compile_update(&update), Err(CompileError::EmptyColumnSet(_)));

        update.columns = vec!["a".into()];
        assert_matches!(compile_update(&update), Err(CompileError::EmptyPredicateSet(_)));

        update.columns = vec!["a".into(), "pk1".into()];
        assert_matches!(
            compile_update(&update),
            Err(CompileError::ColumnValueMismatch { columns: 2, values: 1 })
        );

        update.values.push(int(2));
        update.if_exists = true;
        update.if_condition = vec![Predicate::eq("b", int(1))];
        assert_matches!(
            compile_update(&update),
            Err(CompileError::ConflictingConditionalClauses)
        );
    }

    #[test]
    fn test_delete_with_conditions() {
        let mut delete = Delete::new(TableRef::new("ks", "t"));
        delete.columns = vec!["id".into()];
        delete.values = vec![int(1)];
        delete.if_exists = true;
        let stmt = compile_delete(&delete).unwrap();
        assert_eq!(stmt.text, "DELETE FROM ks.t WHERE id = ? IF EXISTS");

        delete.if_exists = false;
        delete.if_condition = vec![Predicate::new("n", Operator::Gte, int(3))];
        let stmt = compile_delete(&delete).unwrap();
        assert_eq!(stmt.text, "DELETE FROM ks.t WHERE id = ? IF n >= ?");
        assert_eq!(stmt.params, vec![int(1), int(3)]);

        assert_matches!(
            compile_delete(&Delete::new(TableRef::new("ks", "t"))),
            Err(CompileError::EmptyPredicateSet(_))
        );
    }

    #[test]
    fn test_identifiers_are_quoted_when_needed() {
        assert_eq!(quote_ident("plain_name1"), "plain_name1");
        assert_eq!(quote_ident("CamelCase"), "\"CamelCase\"");
        assert_eq!(quote_ident("1st"), "\"1st\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        let select = Select::new(TableRef::new("My_KS", "t"));
        assert_eq!(
            compile_select(&select).unwrap().text,
            "SELECT * FROM \"My_KS\".t"
        );
    }

    #[test]
    fn test_reserved_column_names_are_quoted_everywhere() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("token"), "\"token\"");
        assert_eq!(quote_ident("key"), "\"key\"");
        assert_eq!(quote_ident("orders"), "orders");
        assert!(is_reserved_keyword("SELECT"));
        assert!(RESERVED_KEYWORDS.windows(2).all(|w| w[0] < w[1]));

        let mut select = Select::new(TableRef::new("ks", "select"));
        select.predicates.push(Predicate::eq("from", int(1)));
        select.order_by.push(OrderBy::new("order", ClusteringOrder::Asc));
        assert_eq!(
            compile_select(&select).unwrap().text,
            "SELECT * FROM ks.\"select\" WHERE \"from\" = ? ORDER BY \"order\" ASC"
        );

        let table = TableMetadata::new(
            "t",
            vec![
                ColumnMetadata::new("key", ColumnKind::PartitionKey, NativeType::Int),
                ColumnMetadata::new("limit", ColumnKind::Regular, NativeType::Int),
            ],
        );
        let mut update = Update::new(TableRef::unqualified("t"), &table);
        update.columns = vec!["limit".into(), "key".into()];
        update.values = vec![int(5), int(1)];
        assert_eq!(
            compile_update(&update).unwrap().text,
            "UPDATE t SET \"limit\" = ? WHERE \"key\" = ?"
        );
    }

    #[test]
    fn test_empty_in_list_is_rejected() {
        let mut select = Select::new(TableRef::new("ks", "t"));
        select
            .predicates
            .push(Predicate::new("id", Operator::In, StorageValue::List(vec![])));
        assert_matches!(
            compile_select(&select),
            Err(CompileError::EmptyInList(column)) if column == "id"
        );

        let mut delete = Delete::new(TableRef::new("ks", "t"));
        delete.columns = vec!["id".into()];
        delete.values = vec![int(1)];
        delete.if_condition = vec![Predicate::new("n", Operator::In, StorageValue::Set(vec![]))];
        assert_matches!(compile_delete(&delete), Err(CompileError::EmptyInList(_)));
    }
}
