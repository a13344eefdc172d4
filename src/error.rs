//! Error types for timetable operations.
//!
//! Expected scheduling outcomes (conflicts on assignment, unsatisfied
//! requirements on generation) are returned as structured results. Only
//! malformed input, missing records, lock timeouts, and storage failures
//! surface as [`TimetableError`].

use thiserror::Error;

use crate::models::Conflict;
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum TimetableError {
    /// Malformed slot, day, period, or reference. Raised before any lock is taken.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A teacher would be double-booked or assigned outside availability.
    #[error("Conflict: {} conflicting slot(s)", conflicts.len())]
    Conflict { conflicts: Vec<Conflict> },

    /// Lock not acquired within the configured bound. Safe to retry.
    #[error("Timed out after {waited_ms}ms waiting for lock on {resource}")]
    ConcurrencyTimeout { resource: String, waited_ms: u64 },

    /// Referenced class, teacher, entry, week, or substitution is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl TimetableError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrencyTimeout { .. } => true,
            Self::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<Vec<ValidationError>> for TimetableError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self::Validation { message }
    }
}

pub type Result<T> = std::result::Result<T, TimetableError>;
