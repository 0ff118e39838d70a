//! Error taxonomy for template validation and solving.
//!
//! Mirrors the kinds in spec §7: schema and referential-integrity errors are
//! fatal and abort the solve; resource pressure and consumable shortfalls
//! never abort, they surface as [`crate::Warning`]s on a successful result.

use thiserror::Error;

/// A single structured violation found while validating a raw template.
///
/// `path` is a JSON-pointer-style location (e.g. `/steps/2/durationMins`)
/// so a caller can highlight exactly where the bad value lives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Missing/invalid field, wrong type, or a bounds violation (duration < 1,
    /// empty id, quantity < 1, …).
    #[error("{path}: {message}")]
    Schema { path: String, message: String },

    /// A reference to a step, resource, or track id that does not exist, or
    /// a duplicate id within a collection that must be unique.
    #[error("{0}")]
    ReferentialIntegrity(String),

    /// Both `startTime` and `endTime` were supplied on the same
    /// `timeConstraint`.
    #[error("timeConstraint supplies both startTime and endTime; at most one is allowed")]
    ConflictingTimeConstraint,
}

/// Failure to apply a per-name inventory override.
///
/// Per spec §4.4, unknown resource names and non-positive values are
/// rejected before a solve is attempted; these are caller-side errors, not
/// emitted from inside a successful solve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("inventory override names unknown resource '{0}'")]
    UnknownResource(String),

    #[error("inventory override for '{name}' must be positive, got {value}")]
    NonPositive { name: String, value: i64 },
}

/// Top-level failure of the `solve` operation (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("template failed validation: {0:?}")]
    InvalidTemplate(Vec<TemplateError>),

    /// Precedence graph has a cycle; the `Vec<StepId>` walks the cycle and
    /// repeats its first element at the end (`[s1, s2, …, s1]`).
    #[error("precedence cycle detected: {0:?}")]
    Cycle(Vec<String>),

    #[error("invalid inventory override: {0}")]
    InvalidInventory(InventoryError),
}
