//! Raw customer records: types, loading, and deterministic train/test splitting.

pub mod csv;
pub mod loader;
mod record;
pub mod split;

use thiserror::Error;

pub use loader::{LoadError, load_records, require_labels};
pub use record::{CustomerRecord, Service};

/// A raw field is missing, malformed, or violates a record-level constraint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },
    #[error("line {line}: missing value for `{field}`")]
    MissingField { line: usize, field: String },
    #[error("line {line}: invalid `{field}` value {value:?} (expected {expected})")]
    InvalidValue {
        line: usize,
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("line {line}: unterminated quoted field")]
    MalformedRow { line: usize },
    #[error("line {line}: expected {expected} fields, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("duplicate customer_id `{customer_id}`")]
    DuplicateIdentifier { customer_id: String },
    #[error("customer `{customer_id}` has no churn label")]
    MissingLabel { customer_id: String },
    #[error("customer `{customer_id}`: invalid `{field}` ({reason})")]
    InvalidRecord {
        customer_id: String,
        field: &'static str,
        reason: String,
    },
}
