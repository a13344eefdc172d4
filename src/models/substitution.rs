//! Substitution request model.
//!
//! A substitution swaps the teacher of a single entry on a single date. It
//! has its own approval lifecycle:
//!
//! ```text
//! pending ──confirm──▶ confirmed
//!    └─────reject────▶ rejected
//! ```
//!
//! Confirmed and rejected are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ClassId, EntryId, Slot, TeacherId};

/// Substitution request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl SubstitutionStatus {
    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubstitutionStatus::Pending)
    }
}

/// A single-slot, single-date substitution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    /// Request identifier.
    pub id: String,
    /// Entry the request was made against.
    pub entry_id: EntryId,
    /// Class of the entry.
    pub class_id: ClassId,
    /// Slot of the entry.
    #[serde(flatten)]
    pub slot: Slot,
    /// Date of the affected period.
    pub date: NaiveDate,
    /// Teacher being substituted.
    pub original_teacher_id: TeacherId,
    /// Substitute, once confirmed.
    pub substitute_teacher_id: Option<TeacherId>,
    /// Why the substitution was requested.
    pub reason: String,
    /// Lifecycle status.
    pub status: SubstitutionStatus,
    /// Why the request was rejected.
    pub rejection_reason: Option<String>,
    /// When the request was made.
    pub requested_at: DateTime<Utc>,
    /// When the request was confirmed or rejected.
    pub decided_at: Option<DateTime<Utc>>,
}

impl Substitution {
    /// Creates a pending request.
    pub fn pending(
        entry_id: impl Into<EntryId>,
        class_id: impl Into<ClassId>,
        slot: Slot,
        date: NaiveDate,
        original_teacher_id: impl Into<TeacherId>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entry_id: entry_id.into(),
            class_id: class_id.into(),
            slot,
            date,
            original_teacher_id: original_teacher_id.into(),
            substitute_teacher_id: None,
            reason: reason.into(),
            status: SubstitutionStatus::Pending,
            rejection_reason: None,
            requested_at: Utc::now(),
            decided_at: None,
        }
    }

    /// Moves to confirmed with the given substitute.
    ///
    /// Returns `false` (and changes nothing) if the request is terminal.
    pub fn confirm(&mut self, substitute_teacher_id: impl Into<TeacherId>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SubstitutionStatus::Confirmed;
        self.substitute_teacher_id = Some(substitute_teacher_id.into());
        self.decided_at = Some(Utc::now());
        true
    }

    /// Moves to rejected.
    ///
    /// Returns `false` (and changes nothing) if the request is terminal.
    pub fn reject(&mut self, reason: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SubstitutionStatus::Rejected;
        self.rejection_reason = reason;
        self.decided_at = Some(Utc::now());
        true
    }
}
