//! Error types for the filterbar crate.
//!
//! Validation problems are never errors here: they are reported as data in a
//! [`ValidationResult`](crate::ValidationResult). The types below cover the
//! operations that can genuinely fail.

use thiserror::Error;

/// Errors raised by engine operations that target the committed list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineError {
    /// The expression index does not exist in the committed list.
    #[error("expression index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A loaded or edited list would break the connector grammar.
    #[error("expression {index} breaks the connector grammar: {reason}")]
    BrokenGrammar { index: usize, reason: &'static str },

    /// An edit produced a condition the schema rejects.
    #[error("edit rejected: {0}")]
    EditRejected(String),
}

impl MachineError {
    /// Creates an index-out-of-range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        MachineError::IndexOutOfRange { index, len }
    }
}

/// Errors produced while decoding wire data.
///
/// Per-entry failures are collected in
/// [`Deserialized::errors`](crate::Deserialized) instead of aborting a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializeError {
    /// The input is not syntactically valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The entry references a field the schema does not define.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The entry references an operator the field does not allow.
    #[error("unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },

    /// The wire value cannot be decoded for the field's type.
    #[error("cannot decode value for field '{field}': {reason}")]
    BadValue { field: String, reason: String },

    /// The entry does not have the `{field, operator, value, connector?}` shape.
    #[error("malformed entry: {0}")]
    Malformed(String),
}

impl SerializeError {
    /// Creates a bad-value error.
    pub fn bad_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SerializeError::BadValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SerializeError {
    fn from(err: serde_json::Error) -> Self {
        SerializeError::Json(err.to_string())
    }
}

/// Errors raised while loading a schema file.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// YAML schema could not be parsed.
    #[error("invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON schema could not be parsed.
    #[error("invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    /// A field references an operator key that is not declared.
    #[error("field '{field}' references undeclared operator '{operator}'")]
    UndeclaredOperator { field: String, operator: String },
}

/// Errors returned by suggestion providers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuggestError {
    /// The query was cancelled before the provider finished.
    #[error("suggestion query cancelled")]
    Cancelled,

    /// The provider failed.
    #[error("suggestion provider '{provider}' failed: {reason}")]
    Provider { provider: String, reason: String },
}

/// Result type for engine list operations.
pub type Result<T> = std::result::Result<T, MachineError>;
