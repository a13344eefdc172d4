//! Timetable entry model.
//!
//! An entry places one subject, taught by one teacher, into one slot of a
//! class's week. Every entry belongs to exactly one layer:
//!
//! - **Global**: the recurring baseline, with no week attached.
//! - **Weekly**: an override scoped to one week (identified by its Monday),
//!   optionally pointing at the Global entry it was copied from.
//!
//! The Global reference is a plain identifier. A reference to an entry that
//! no longer exists simply means the weekly entry has no baseline parent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Slot;

/// Class identifier.
pub type ClassId = String;
/// Teacher identifier.
pub type TeacherId = String;
/// Subject identifier.
pub type SubjectId = String;
/// Timetable entry identifier.
pub type EntryId = String;

/// Generates a fresh entry identifier.
pub fn new_entry_id() -> EntryId {
    Uuid::new_v4().to_string()
}

/// One scheduled period for a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// Owning class.
    pub class_id: ClassId,
    /// Day and period.
    #[serde(flatten)]
    pub slot: Slot,
    /// Subject taught.
    pub subject_id: SubjectId,
    /// Teacher in charge.
    pub teacher_id: TeacherId,
    /// Room, if one is assigned.
    pub room: Option<String>,
    /// Inactive entries (cancelled periods) stay present but are not in force.
    pub is_active: bool,
    /// Global or weekly layer membership.
    #[serde(flatten)]
    pub layer: Layer,
}

/// Layer membership of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "lowercase")]
pub enum Layer {
    /// Recurring baseline.
    Global,
    /// Override for one specific week.
    #[serde(rename_all = "camelCase")]
    Weekly {
        /// Monday of the week this entry applies to.
        week_start: NaiveDate,
        /// Global entry this one was derived from, if any.
        global_entry_id: Option<EntryId>,
        /// What changed relative to the baseline.
        modification: Option<Modification>,
    },
}

/// Marker describing how a weekly entry departs from the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Modification {
    /// Teacher changed for this week.
    #[serde(rename_all = "camelCase")]
    Reassigned {
        previous_teacher_id: TeacherId,
        reason: String,
    },
    /// Period does not take place this week.
    Cancelled { reason: Option<String> },
    /// Period exists only in this week.
    Inserted { reason: String },
}

impl TimetableEntry {
    /// Creates an active Global entry.
    pub fn global(
        class_id: impl Into<ClassId>,
        slot: Slot,
        subject_id: impl Into<SubjectId>,
        teacher_id: impl Into<TeacherId>,
    ) -> Self {
        Self {
            id: new_entry_id(),
            class_id: class_id.into(),
            slot,
            subject_id: subject_id.into(),
            teacher_id: teacher_id.into(),
            room: None,
            is_active: true,
            layer: Layer::Global,
        }
    }

    /// Sets the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Sets the entry identifier.
    pub fn with_id(mut self, id: impl Into<EntryId>) -> Self {
        self.id = id.into();
        self
    }

    /// Copies a Global entry into the weekly layer of `week_start`.
    ///
    /// The copy gets its own identifier and references the source entry.
    pub fn derive_weekly(&self, week_start: NaiveDate) -> Self {
        Self {
            id: new_entry_id(),
            layer: Layer::Weekly {
                week_start,
                global_entry_id: Some(self.id.clone()),
                modification: None,
            },
            ..self.clone()
        }
    }

    /// Strips week scoping and markers, producing a Global entry.
    ///
    /// Reuses the referenced Global identifier when there is one, otherwise
    /// the entry's own identifier, so repeated promotion yields the same IDs.
    pub fn to_global(&self) -> Self {
        let id = self.global_entry_id().unwrap_or(&self.id).to_string();
        Self {
            id,
            layer: Layer::Global,
            ..self.clone()
        }
    }

    /// Whether this entry is part of the Global layer.
    pub fn is_global(&self) -> bool {
        matches!(self.layer, Layer::Global)
    }

    /// Week this entry is scoped to (`None` for Global entries).
    pub fn week_start(&self) -> Option<NaiveDate> {
        match &self.layer {
            Layer::Global => None,
            Layer::Weekly { week_start, .. } => Some(*week_start),
        }
    }

    /// Referenced Global entry identifier.
    pub fn global_entry_id(&self) -> Option<&str> {
        match &self.layer {
            Layer::Global => None,
            Layer::Weekly {
                global_entry_id, ..
            } => global_entry_id.as_deref(),
        }
    }

    /// Modification marker, if any.
    pub fn modification(&self) -> Option<&Modification> {
        match &self.layer {
            Layer::Global => None,
            Layer::Weekly { modification, .. } => modification.as_ref(),
        }
    }

    /// Whether the entry carries a modification marker.
    pub fn is_modified(&self) -> bool {
        self.modification().is_some()
    }

    /// Whether this entry answers to `id`, either directly or through its
    /// Global reference.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.global_entry_id() == Some(id)
    }

    /// Sets the modification marker. No-op on Global entries.
    pub fn mark(&mut self, marker: Modification) {
        if let Layer::Weekly { modification, .. } = &mut self.layer {
            *modification = Some(marker);
        }
    }
}
