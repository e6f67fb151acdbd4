//! Error taxonomy for the evaluation pipeline.
//!
//! Per-pair conditions (`InsufficientSamples`, `UnresolvedWildType`,
//! `AmbiguousWildType`) are caught by the evaluator and reported as skips.
//! Shape and alignment errors on the core inputs are fatal for the whole run.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VipError {
    #[error("insufficient samples for {what}: need {needed}, got {got}")]
    InsufficientSamples {
        what: String,
        needed: usize,
        got: usize,
    },

    #[error("no wild type found for mutant '{mutant}'")]
    UnresolvedWildType { mutant: String },

    #[error("ambiguous wild type for mutant '{mutant}': candidates {candidates:?}")]
    AmbiguousWildType {
        mutant: String,
        candidates: Vec<String>,
    },

    #[error("correlation matrix is not square: {rows} rows, {cols} columns")]
    MatrixNotSquare { rows: usize, cols: usize },

    #[error("sub-matrix shapes do not stack: expected {expected} columns, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("sample index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("metadata and correlation matrix share no sample identifiers")]
    DisjointSamples,

    #[error("sample '{id}' has no metadata row")]
    UnknownSample { id: String },

    #[error("sample '{id}' appears more than once in the {origin}")]
    DuplicateSample { id: String, origin: &'static str },
}

impl VipError {
    pub(crate) fn insufficient(what: impl Into<String>, needed: usize, got: usize) -> Self {
        VipError::InsufficientSamples {
            what: what.into(),
            needed,
            got,
        }
    }

    /// Errors that invalidate the whole run rather than a single pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VipError::MatrixNotSquare { .. }
                | VipError::DisjointSamples
                | VipError::UnknownSample { .. }
                | VipError::DuplicateSample { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VipError>;
