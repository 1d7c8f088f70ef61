//! Hand-off to the statement executor.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use super::value::StorageValue;
use crate::error::ExecutionError;
use crate::query::CompiledStatement;

/// Name of the column a conditional statement reports its outcome in.
pub const APPLIED_COLUMN: &str = "[applied]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl Consistency {
    pub const ALL_LEVELS: [Consistency; 9] = [
        Consistency::Any,
        Consistency::One,
        Consistency::Two,
        Consistency::Three,
        Consistency::Quorum,
        Consistency::All,
        Consistency::LocalQuorum,
        Consistency::EachQuorum,
        Consistency::LocalOne,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Consistency::Any => "ANY",
            Consistency::One => "ONE",
            Consistency::Two => "TWO",
            Consistency::Three => "THREE",
            Consistency::Quorum => "QUORUM",
            Consistency::All => "ALL",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::EachQuorum => "EACH_QUORUM",
            Consistency::LocalOne => "LOCAL_ONE",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Consistency::ALL_LEVELS
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown consistency level: {}", s))
    }
}

/// The two serial levels conditional statements may run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialConsistency {
    Serial,
    LocalSerial,
}

impl SerialConsistency {
    pub fn as_str(self) -> &'static str {
        match self {
            SerialConsistency::Serial => "SERIAL",
            SerialConsistency::LocalSerial => "LOCAL_SERIAL",
        }
    }
}

impl fmt::Display for SerialConsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerialConsistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SERIAL" => Ok(SerialConsistency::Serial),
            "LOCAL_SERIAL" => Ok(SerialConsistency::LocalSerial),
            other => Err(format!("unsupported serial consistency: {}", other)),
        }
    }
}

/// Opaque continuation token. Passed between executor and client untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageState(pub String);

impl PageState {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything the executor needs to run one statement.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub statement: CompiledStatement,
    pub consistency: Consistency,
    pub serial_consistency: Option<SerialConsistency>,
    pub page_size: Option<i32>,
    pub page_state: Option<PageState>,
    pub acting_as: Option<String>,
}

impl ExecutionRequest {
    pub fn new(statement: CompiledStatement) -> Self {
        Self {
            statement,
            consistency: Consistency::LocalQuorum,
            serial_consistency: None,
            page_size: None,
            page_state: None,
            acting_as: None,
        }
    }
}

/// One result row: column values in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, StorageValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, StorageValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&StorageValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StorageValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Outcome of a conditional statement, if this row reports one.
    pub fn applied(&self) -> Option<bool> {
        match self.get(APPLIED_COLUMN) {
            Some(StorageValue::Boolean(applied)) => Some(*applied),
            _ => None,
        }
    }
}

impl FromIterator<(String, StorageValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, StorageValue)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    /// Absent when the result is exhausted
    pub page_state: Option<PageState>,
}

/// Runs compiled statements against the store.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ResultSet, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_parse() {
        assert_eq!("local_quorum".parse::<Consistency>(), Ok(Consistency::LocalQuorum));
        assert_eq!("ALL".parse::<Consistency>(), Ok(Consistency::All));
        assert!("SERIAL".parse::<Consistency>().is_err());
        assert_eq!(
            "local_serial".parse::<SerialConsistency>(),
            Ok(SerialConsistency::LocalSerial)
        );
        assert!("QUORUM".parse::<SerialConsistency>().is_err());
    }

    #[test]
    fn test_row_applied() {
        let row = Row::new(vec![
            (APPLIED_COLUMN.to_string(), StorageValue::Boolean(false)),
            ("id".to_string(), StorageValue::Int(1)),
        ]);
        assert_eq!(row.applied(), Some(false));
        assert_eq!(row.get("id"), Some(&StorageValue::Int(1)));
        assert_eq!(Row::default().applied(), None);
    }
}
