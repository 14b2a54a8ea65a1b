//! Schema violation reporting.

use thiserror::Error;

use crate::path::KeyPath;
use crate::value::ValueKind;

/// A structurally invalid fragment, reported with the offending key path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema violation at '{path}': {reason}")]
pub struct SchemaViolation {
    pub path: KeyPath,
    pub reason: ViolationReason,
}

impl SchemaViolation {
    pub fn new(path: KeyPath, reason: ViolationReason) -> Self {
        Self { path, reason }
    }
}

/// Why a fragment was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViolationReason {
    /// A value does not have the shape the schema requires at its path.
    #[error("expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: ValueKind,
    },

    /// Two fragments disagree on the kind of a container.
    #[error("cannot merge {left} with {right}")]
    Conflict { left: ValueKind, right: ValueKind },

    /// `null` at a flag set, or at a mapping holding one, would drop
    /// inherited `false` flags without restating them.
    #[error("null cannot clear inherited flags; set individual flags to true instead")]
    ClearsFlags,

    #[error("empty key")]
    EmptyKey,

    #[error("nesting deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("integer {0} is outside the signed 64-bit range")]
    IntegerOutOfRange(String),
}
