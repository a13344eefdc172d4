//! Resolved timetable views and conflicts.
//!
//! The effective timetable of a (class, week) pair is resolved by a single
//! rule: the week's own layer if one exists, otherwise the Global layer.
//! [`EffectiveTimetable::resolve`] is that rule; every read and every
//! conflict check goes through it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ClassId, EntryId, Slot, TeacherId, TimetableEntry};

/// Which layer an effective timetable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimetableSource {
    Weekly,
    Global,
}

/// An entry as it appears in a resolved timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntry {
    #[serde(flatten)]
    pub entry: TimetableEntry,
    /// Whether the entry carries a modification marker.
    pub is_modified: bool,
}

/// The timetable in force for a class in a given week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTimetable {
    /// Layer the entries were taken from.
    pub source: TimetableSource,
    /// Entries, sorted by slot. Cancelled entries are included but inactive.
    pub entries: Vec<ResolvedEntry>,
    /// Number of entries carrying a modification marker.
    pub modification_count: usize,
}

impl EffectiveTimetable {
    /// Resolves the effective timetable from the Global layer and the
    /// week's layer, if one has been materialized.
    pub fn resolve(global: Vec<TimetableEntry>, weekly: Option<Vec<TimetableEntry>>) -> Self {
        let (source, mut entries) = match weekly {
            Some(entries) => (TimetableSource::Weekly, entries),
            None => (TimetableSource::Global, global),
        };
        entries.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.id.cmp(&b.id)));

        let entries: Vec<ResolvedEntry> = entries
            .into_iter()
            .map(|entry| ResolvedEntry {
                is_modified: entry.is_modified(),
                entry,
            })
            .collect();
        let modification_count = entries.iter().filter(|e| e.is_modified).count();

        Self {
            source,
            entries,
            modification_count,
        }
    }

    /// Active entries only.
    pub fn active_entries(&self) -> impl Iterator<Item = &TimetableEntry> {
        self.entries
            .iter()
            .map(|e| &e.entry)
            .filter(|e| e.is_active)
    }

    /// The active entry at a slot.
    pub fn entry_at(&self, slot: Slot) -> Option<&TimetableEntry> {
        self.active_entries().find(|e| e.slot == slot)
    }

    /// Active entries taught by a teacher.
    pub fn entries_for_teacher<'a>(
        &'a self,
        teacher_id: &'a str,
    ) -> impl Iterator<Item = &'a TimetableEntry> + 'a {
        self.active_entries().filter(move |e| e.teacher_id == teacher_id)
    }

    /// Number of entries (active or not).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timetable has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classification of scheduling conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// Teacher already holds another class's active entry at the slot.
    DoubleBooked,
    /// Slot is outside the teacher's availability grid.
    Unavailable,
    /// Teacher's daily or weekly load limit would be exceeded.
    LoadExceeded,
}

/// A reason an assignment cannot be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Type of conflict.
    pub kind: ConflictKind,
    /// Teacher the conflict concerns.
    pub teacher_id: TeacherId,
    /// Class holding the clashing entry (for double bookings) or the class
    /// being assigned (otherwise).
    pub class_id: ClassId,
    /// Clashing entry, when there is one.
    pub entry_id: Option<EntryId>,
    /// Slot of the conflict.
    #[serde(flatten)]
    pub slot: Slot,
    /// Week of the conflict; `None` for the Global layer.
    pub week_start: Option<NaiveDate>,
    /// Human-readable description.
    pub message: String,
}

impl Conflict {
    /// Teacher already teaches `existing` at that slot.
    pub fn double_booked(
        teacher_id: &str,
        existing: &TimetableEntry,
        week_start: Option<NaiveDate>,
    ) -> Self {
        Self {
            kind: ConflictKind::DoubleBooked,
            teacher_id: teacher_id.to_string(),
            class_id: existing.class_id.clone(),
            entry_id: Some(existing.id.clone()),
            slot: existing.slot,
            week_start,
            message: format!(
                "teacher '{teacher_id}' already teaches class '{}' at {}",
                existing.class_id, existing.slot
            ),
        }
    }

    /// Slot lies outside the teacher's availability.
    pub fn unavailable(
        teacher_id: &str,
        class_id: &str,
        slot: Slot,
        week_start: Option<NaiveDate>,
    ) -> Self {
        Self {
            kind: ConflictKind::Unavailable,
            teacher_id: teacher_id.to_string(),
            class_id: class_id.to_string(),
            entry_id: None,
            slot,
            week_start,
            message: format!("teacher '{teacher_id}' is not available at {slot}"),
        }
    }

    /// Teacher's load limit would be exceeded.
    pub fn load_exceeded(
        teacher_id: &str,
        class_id: &str,
        slot: Slot,
        week_start: Option<NaiveDate>,
    ) -> Self {
        Self {
            kind: ConflictKind::LoadExceeded,
            teacher_id: teacher_id.to_string(),
            class_id: class_id.to_string(),
            entry_id: None,
            slot,
            week_start,
            message: format!("teacher '{teacher_id}' has no load left on {}", slot.day),
        }
    }
}
