//! Parser for the CQL shapes the compilers emit. Placeholders are bound to
//! parameters in text order while parsing.

use std::vec::IntoIter;

use crate::error::ExecutionError;
use crate::query::ddl::{AlterTable, ColumnDef, CreateTable};
use crate::query::{OrderBy, Operator, Predicate, TableRef, is_reserved_keyword};
use crate::store::{ClusteringOrder, NativeType, StorageValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Conditional {
    None,
    IfExists,
    IfNotExists,
    If(Vec<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select {
        table: TableRef,
        predicates: Vec<Predicate>,
        order_by: Vec<OrderBy>,
        limit: Option<i32>,
    },
    Insert {
        table: TableRef,
        values: Vec<(String, StorageValue)>,
        conditional: Conditional,
        ttl: Option<i32>,
    },
    Update {
        table: TableRef,
        ttl: Option<i32>,
        assignments: Vec<(String, StorageValue)>,
        predicates: Vec<Predicate>,
        conditional: Conditional,
    },
    Delete {
        table: TableRef,
        predicates: Vec<Predicate>,
        conditional: Conditional,
    },
    CreateTable(CreateTable),
    AlterTable {
        table: TableRef,
        alter: AlterTable,
    },
    DropTable {
        table: TableRef,
        if_exists: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Symbol(&'static str),
}

fn invalid(message: impl Into<String>) -> ExecutionError {
    ExecutionError::Invalid(message.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExecutionError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_alphanumeric() || c == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if !(c.is_ascii_alphanumeric() || c == '_') {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        } else if c == '"' {
            chars.next();
            let mut ident = String::new();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        ident.push('"');
                    }
                    Some('"') => break,
                    Some(c) => ident.push(c),
                    None => return Err(invalid("unterminated quoted identifier")),
                }
            }
            tokens.push(Token::Quoted(ident));
        } else {
            chars.next();
            let symbol = match (c, chars.peek().copied()) {
                ('!', Some('=')) => "!=",
                ('>', Some('=')) => ">=",
                ('<', Some('=')) => "<=",
                ('(', _) => "(",
                (')', _) => ")",
                (',', _) => ",",
                ('.', _) => ".",
                ('?', _) => "?",
                ('*', _) => "*",
                ('=', _) => "=",
                ('>', _) => ">",
                ('<', _) => "<",
                _ => return Err(invalid(format!("unexpected character '{}'", c))),
            };
            if symbol.len() == 2 {
                chars.next();
            }
            tokens.push(Token::Symbol(symbol));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: IntoIter<StorageValue>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), ExecutionError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(invalid(format!("expected {}", keyword)))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn symbol(&mut self, symbol: &str) -> Result<(), ExecutionError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(invalid(format!("expected '{}'", symbol)))
        }
    }

    fn ident(&mut self) -> Result<String, ExecutionError> {
        match self.next() {
            Some(Token::Word(w)) if is_reserved_keyword(&w) => Err(invalid(format!(
                "reserved keyword {} used as an identifier must be quoted",
                w
            ))),
            Some(Token::Word(w)) => Ok(w.to_ascii_lowercase()),
            Some(Token::Quoted(q)) => Ok(q),
            _ => Err(invalid("expected identifier")),
        }
    }

    fn placeholder(&mut self) -> Result<StorageValue, ExecutionError> {
        self.symbol("?")?;
        self.params
            .next()
            .ok_or_else(|| invalid("fewer parameters than placeholders"))
    }

    fn int_placeholder(&mut self, what: &str) -> Result<i32, ExecutionError> {
        match self.placeholder()? {
            StorageValue::Int(v) => Ok(v),
            other => Err(invalid(format!("{} must be an int, got {:?}", what, other))),
        }
    }

    fn table_ref(&mut self) -> Result<TableRef, ExecutionError> {
        let first = self.ident()?;
        if self.eat_symbol(".") {
            Ok(TableRef::new(first, self.ident()?))
        } else {
            Ok(TableRef::unqualified(first))
        }
    }

    fn comma_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<Vec<T>, ExecutionError> {
        let mut items = vec![item(self)?];
        while self.eat_symbol(",") {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn operator(&mut self) -> Result<Operator, ExecutionError> {
        let token = match self.next() {
            Some(Token::Symbol(s)) => s.to_string(),
            Some(Token::Word(w)) => w,
            _ => return Err(invalid("expected operator")),
        };
        Operator::from_cql(&token).ok_or_else(|| invalid(format!("unknown operator {}", token)))
    }

    fn predicate(&mut self) -> Result<Predicate, ExecutionError> {
        let column = self.ident()?;
        let op = self.operator()?;
        let value = if op == Operator::In {
            self.symbol("(")?;
            let mut items = Vec::new();
            if !self.eat_symbol(")") {
                items = self.comma_list(Self::placeholder)?;
                self.symbol(")")?;
            }
            StorageValue::List(items)
        } else {
            self.placeholder()?
        };
        Ok(Predicate::new(column, op, value))
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>, ExecutionError> {
        let mut predicates = vec![self.predicate()?];
        while self.eat_keyword("AND") {
            predicates.push(self.predicate()?);
        }
        Ok(predicates)
    }

    fn conditional(&mut self) -> Result<Conditional, ExecutionError> {
        if !self.eat_keyword("IF") {
            return Ok(Conditional::None);
        }
        if self.eat_keyword("EXISTS") {
            return Ok(Conditional::IfExists);
        }
        if self.eat_keyword("NOT") {
            self.keyword("EXISTS")?;
            return Ok(Conditional::IfNotExists);
        }
        Ok(Conditional::If(self.predicates()?))
    }

    fn ttl(&mut self) -> Result<Option<i32>, ExecutionError> {
        if !self.eat_keyword("USING") {
            return Ok(None);
        }
        self.keyword("TTL")?;
        Ok(Some(self.int_placeholder("TTL")?))
    }

    fn order(&mut self) -> ClusteringOrder {
        if self.eat_keyword("DESC") {
            ClusteringOrder::Desc
        } else {
            self.eat_keyword("ASC");
            ClusteringOrder::Asc
        }
    }

    /// Type text up to the next top-level `,` or `)`.
    fn native_type(&mut self) -> Result<NativeType, ExecutionError> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Some(Token::Symbol(",")) | Some(Token::Symbol(")")) if depth == 0 => break,
                Some(Token::Symbol("<")) => depth += 1,
                Some(Token::Symbol(">")) => depth = depth.saturating_sub(1),
                None => break,
                _ => {}
            }
            match self.next() {
                Some(Token::Word(w)) => text.push_str(&w),
                Some(Token::Symbol(s)) => text.push_str(s),
                Some(Token::Quoted(q)) => text.push_str(&q),
                None => break,
            }
            text.push(' ');
        }
        text.parse::<NativeType>()
            .map_err(|e| invalid(e.to_string()))
    }

    fn statement(&mut self) -> Result<Statement, ExecutionError> {
        let statement = match self.next() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("SELECT") => self.select()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("INSERT") => self.insert()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("UPDATE") => self.update()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("DELETE") => self.delete()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CREATE") => self.create_table()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("ALTER") => self.alter_table()?,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("DROP") => self.drop_table()?,
            _ => return Err(invalid("unsupported statement")),
        };
        if !self.at_end() {
            return Err(invalid("unexpected trailing input"));
        }
        if self.params.len() > 0 {
            return Err(invalid("more parameters than placeholders"));
        }
        Ok(statement)
    }

    fn select(&mut self) -> Result<Statement, ExecutionError> {
        self.symbol("*")?;
        self.keyword("FROM")?;
        let table = self.table_ref()?;
        let predicates = if self.eat_keyword("WHERE") {
            self.predicates()?
        } else {
            Vec::new()
        };
        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.keyword("BY")?;
            order_by = self.comma_list(|p| {
                let column = p.ident()?;
                Ok(OrderBy::new(column, p.order()))
            })?;
        }
        let limit = if self.eat_keyword("LIMIT") {
            Some(self.int_placeholder("LIMIT")?)
        } else {
            None
        };
        Ok(Statement::Select {
            table,
            predicates,
            order_by,
            limit,
        })
    }

    fn insert(&mut self) -> Result<Statement, ExecutionError> {
        self.keyword("INTO")?;
        let table = self.table_ref()?;
        self.symbol("(")?;
        let columns = self.comma_list(Self::ident)?;
        self.symbol(")")?;
        self.keyword("VALUES")?;
        self.symbol("(")?;
        let values = self.comma_list(Self::placeholder)?;
        self.symbol(")")?;
        if columns.len() != values.len() {
            return Err(invalid("column and value counts differ"));
        }
        let conditional = self.conditional()?;
        let ttl = self.ttl()?;
        Ok(Statement::Insert {
            table,
            values: columns.into_iter().zip(values).collect(),
            conditional,
            ttl,
        })
    }

    fn update(&mut self) -> Result<Statement, ExecutionError> {
        let table = self.table_ref()?;
        let ttl = self.ttl()?;
        self.keyword("SET")?;
        let assignments = self.comma_list(|p| {
            let column = p.ident()?;
            p.symbol("=")?;
            Ok((column, p.placeholder()?))
        })?;
        self.keyword("WHERE")?;
        let predicates = self.predicates()?;
        let conditional = self.conditional()?;
        Ok(Statement::Update {
            table,
            ttl,
            assignments,
            predicates,
            conditional,
        })
    }

    fn delete(&mut self) -> Result<Statement, ExecutionError> {
        self.keyword("FROM")?;
        let table = self.table_ref()?;
        self.keyword("WHERE")?;
        let predicates = self.predicates()?;
        let conditional = self.conditional()?;
        Ok(Statement::Delete {
            table,
            predicates,
            conditional,
        })
    }

    fn create_table(&mut self) -> Result<Statement, ExecutionError> {
        self.keyword("TABLE")?;
        let if_not_exists = if self.eat_keyword("IF") {
            self.keyword("NOT")?;
            self.keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table = self.table_ref()?;
        self.symbol("(")?;

        let mut definitions = Vec::new();
        let mut partition = Vec::new();
        let mut clustering = Vec::new();
        loop {
            if self.eat_keyword("PRIMARY") {
                self.keyword("KEY")?;
                self.symbol("(")?;
                if self.eat_symbol("(") {
                    partition = self.comma_list(Self::ident)?;
                    self.symbol(")")?;
                } else {
                    partition = vec![self.ident()?];
                }
                while self.eat_symbol(",") {
                    clustering.push(self.ident()?);
                }
                self.symbol(")")?;
            } else {
                let name = self.ident()?;
                definitions.push(ColumnDef::new(name, self.native_type()?));
            }
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.symbol(")")?;

        let mut orders = Vec::new();
        if self.eat_keyword("WITH") {
            self.keyword("CLUSTERING")?;
            self.keyword("ORDER")?;
            self.keyword("BY")?;
            self.symbol("(")?;
            orders = self.comma_list(|p| Ok((p.ident()?, p.order())))?;
            self.symbol(")")?;
        }

        let mut take = |name: &str| -> Result<ColumnDef, ExecutionError> {
            let index = definitions
                .iter()
                .position(|d| d.name == name)
                .ok_or_else(|| invalid(format!("unknown primary key column {}", name)))?;
            Ok(definitions.remove(index))
        };
        let partition_key = partition
            .iter()
            .map(|name| take(name))
            .collect::<Result<Vec<_>, _>>()?;
        let clustering_key = clustering
            .iter()
            .map(|name| {
                let order = orders
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, o)| *o)
                    .unwrap_or_default();
                Ok((take(name)?, order))
            })
            .collect::<Result<Vec<_>, ExecutionError>>()?;

        Ok(Statement::CreateTable(CreateTable {
            table,
            partition_key,
            clustering_key,
            columns: definitions,
            if_not_exists,
        }))
    }

    fn alter_table(&mut self) -> Result<Statement, ExecutionError> {
        self.keyword("TABLE")?;
        let table = self.table_ref()?;
        let alter = if self.eat_keyword("ADD") {
            self.symbol("(")?;
            let columns = self.comma_list(|p| {
                let name = p.ident()?;
                Ok(ColumnDef::new(name, p.native_type()?))
            })?;
            self.symbol(")")?;
            AlterTable::Add(columns)
        } else {
            self.keyword("DROP")?;
            self.symbol("(")?;
            let columns = self.comma_list(Self::ident)?;
            self.symbol(")")?;
            AlterTable::Drop(columns)
        };
        Ok(Statement::AlterTable { table, alter })
    }

    fn drop_table(&mut self) -> Result<Statement, ExecutionError> {
        self.keyword("TABLE")?;
        let if_exists = if self.eat_keyword("IF") {
            self.keyword("EXISTS")?;
            true
        } else {
            false
        };
        Ok(Statement::DropTable {
            table: self.table_ref()?,
            if_exists,
        })
    }
}

/// Parse one statement, binding `params` to its placeholders.
pub fn parse(text: &str, params: Vec<StorageValue>) -> Result<Statement, ExecutionError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        params: params.into_iter(),
    };
    parser.statement()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ddl::compile_create_table;
    use crate::query::{Update, compile_update};
    use crate::store::{ColumnKind, ColumnMetadata, TableMetadata};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn int(v: i32) -> StorageValue {
        StorageValue::Int(v)
    }

    #[test]
    fn test_parse_select_binds_in_text_order() {
        let stmt = parse(
            "SELECT * FROM ks.t WHERE id IN (?, ?) AND n >= ? ORDER BY c DESC LIMIT ?",
            vec![int(1), int(2), int(3), int(10)],
        )
        .unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: TableRef::new("ks", "t"),
                predicates: vec![
                    Predicate::new("id", Operator::In, StorageValue::List(vec![int(1), int(2)])),
                    Predicate::new("n", Operator::Gte, int(3)),
                ],
                order_by: vec![OrderBy::new("c", ClusteringOrder::Desc)],
                limit: Some(10),
            }
        );
    }

    #[test]
    fn test_parse_compiled_update() {
        let table = TableMetadata::new(
            "t",
            vec![
                ColumnMetadata::new("id", ColumnKind::PartitionKey, NativeType::Int),
                ColumnMetadata::new("Name", ColumnKind::Regular, NativeType::Text),
            ],
        );
        let mut update = Update::new(TableRef::new("ks", "t"), &table);
        update.columns = vec!["Name".into(), "id".into()];
        update.values = vec![StorageValue::Text("x".into()), int(1)];
        update.ttl = Some(5);
        update.if_exists = true;
        let compiled = compile_update(&update).unwrap();
        let stmt = parse(&compiled.text, compiled.params).unwrap();
        assert_eq!(
            stmt,
            Statement::Update {
                table: TableRef::new("ks", "t"),
                ttl: Some(5),
                assignments: vec![("Name".into(), StorageValue::Text("x".into()))],
                predicates: vec![Predicate::eq("id", int(1))],
                conditional: Conditional::IfExists,
            }
        );
    }

    #[test]
    fn test_parse_create_table() {
        let create = CreateTable {
            table: TableRef::new("ks", "t"),
            partition_key: vec![ColumnDef::new("a", NativeType::Int)],
            clustering_key: vec![(
                ColumnDef::new("b", NativeType::Timestamp),
                ClusteringOrder::Desc,
            )],
            columns: vec![ColumnDef::new(
                "m",
                NativeType::map(NativeType::Text, NativeType::list(NativeType::Int)),
            )],
            if_not_exists: true,
        };
        let compiled = compile_create_table(&create).unwrap();
        assert_eq!(parse(&compiled.text, vec![]).unwrap(), Statement::CreateTable(create));
    }

    #[test]
    fn test_parse_rejects_parameter_mismatch() {
        assert_matches!(
            parse("DELETE FROM ks.t WHERE id = ?", vec![]),
            Err(ExecutionError::Invalid(_))
        );
        assert_matches!(
            parse("DELETE FROM ks.t WHERE id = ?", vec![int(1), int(2)]),
            Err(ExecutionError::Invalid(_))
        );
        assert_matches!(parse("TRUNCATE ks.t", vec![]), Err(ExecutionError::Invalid(_)));
    }

    #[test]
    fn test_reserved_identifiers_must_be_quoted() {
        assert_matches!(
            parse("SELECT * FROM ks.t WHERE order = ?", vec![int(1)]),
            Err(ExecutionError::Invalid(message)) if message.contains("order")
        );
        let stmt = parse("SELECT * FROM ks.t WHERE \"order\" = ?", vec![int(1)]).unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: TableRef::new("ks", "t"),
                predicates: vec![Predicate::eq("order", int(1))],
                order_by: vec![],
                limit: None,
            }
        );
    }
}
