//! Error types for schema building, statement compilation, value coding and
//! statement execution.

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Errors raised while building a keyspace's type graph.
///
/// Fatal for the affected keyspace only: the other keyspaces and the process
/// keep serving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unsupported type '{type_name}' for column {column}")]
    UnsupportedType { column: String, type_name: String },

    #[error("Could not find a free name for '{name}' after {attempts} attempts")]
    NameConflict { name: String, attempts: usize },

    #[error("Keyspace not found: {0}")]
    KeyspaceNotFound(String),

    #[error("Metadata unavailable: {0}")]
    Store(#[from] ExecutionError),

    #[error("Invalid generated schema: {0}")]
    Invalid(String),
}

/// Structural problems found while compiling a query intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("No columns given for {0}")]
    EmptyColumnSet(&'static str),

    #[error("No predicates given for {0}")]
    EmptyPredicateSet(&'static str),

    #[error("IF EXISTS cannot be combined with IF conditions")]
    ConflictingConditionalClauses,

    #[error("{columns} columns but {values} values")]
    ColumnValueMismatch { columns: usize, values: usize },

    #[error("IN on {0} needs at least one value")]
    EmptyInList(String),
}

/// Per-value decode failure. `path` names the offending field
/// (e.g. `filter.tags.in.1`); it is empty until a caller scopes it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{path}: value out of range for {native_type}")]
    ValueOutOfRange { native_type: String, path: String },

    #[error("{path}: malformed {native_type} literal ({detail})")]
    MalformedLiteral {
        native_type: String,
        detail: String,
        path: String,
    },
}

impl CodecError {
    pub fn out_of_range(native_type: impl ToString) -> Self {
        CodecError::ValueOutOfRange {
            native_type: native_type.to_string(),
            path: String::new(),
        }
    }

    pub fn malformed(native_type: impl ToString, detail: impl Into<String>) -> Self {
        CodecError::MalformedLiteral {
            native_type: native_type.to_string(),
            detail: detail.into(),
            path: String::new(),
        }
    }

    /// Prefix the error path with an enclosing segment.
    pub fn within(mut self, segment: impl std::fmt::Display) -> Self {
        let path = match &mut self {
            CodecError::ValueOutOfRange { path, .. } => path,
            CodecError::MalformedLiteral { path, .. } => path,
        };
        *path = if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", segment, path)
        };
        self
    }

    pub fn path(&self) -> &str {
        match self {
            CodecError::ValueOutOfRange { path, .. } => path,
            CodecError::MalformedLiteral { path, .. } => path,
        }
    }
}

/// Opaque failure passed through from the statement executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid query: {0}")]
    Invalid(String),

    #[error("Statement timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

/// Everything a generated resolver can fail with.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    BadRequest(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::Codec(_) => "CODEC_ERROR",
            ResolveError::Compile(_) => "COMPILE_ERROR",
            ResolveError::Execution(_) => "EXECUTION_ERROR",
            ResolveError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl ErrorExtensions for ResolveError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        let path = match self {
            ResolveError::Codec(e) => Some(e.path().to_string()),
            _ => None,
        };
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", code);
            if let Some(path) = path {
                e.set("field", path);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_path_nesting() {
        let err = CodecError::out_of_range("int").within(2).within("tags").within("filter");
        assert_eq!(err.path(), "filter.tags.2");
        assert_eq!(err.to_string(), "filter.tags.2: value out of range for int");
    }

    #[test]
    fn test_resolve_error_codes() {
        let err: ResolveError = CompileError::ConflictingConditionalClauses.into();
        assert_eq!(err.code(), "COMPILE_ERROR");
        let err: ResolveError = ExecutionError::Unavailable("no hosts".into()).into();
        assert_eq!(err.code(), "EXECUTION_ERROR");
    }
}
