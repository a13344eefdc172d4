//! Request and result types of the timetable service.
//!
//! Field names serialize in camelCase and are part of the caller contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    ClassId, Conflict, Day, EntryId, ResolvedEntry, Slot, SubjectId, TeacherId, TimetableEntry,
};
use crate::scheduler::UnsatisfiedRequirement;

/// Outcome of regenerating a class's Global timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub success: bool,
    /// New Global entries written.
    pub entries_created: usize,
    /// Global entries replaced.
    pub global_deleted: usize,
    /// Entries of the current week's layer replaced.
    pub weekly_deleted: usize,
    /// Monday of the current week.
    pub week_start: NaiveDate,
    /// Demand the generator could not place.
    pub unsatisfied_requirements: Vec<UnsatisfiedRequirement>,
}

/// A class's week as stored, with the override flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "weekly", rename_all = "camelCase")]
pub struct WeeklyTimetable {
    /// Whether the week carries modifications relative to the baseline.
    pub has_weekly_overrides: bool,
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Effective entries.
    pub entries: Vec<ResolvedEntry>,
}

/// A teacher's effective week across all classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherTimetable {
    pub teacher_id: TeacherId,
    pub week_start: NaiveDate,
    /// Active entries, in slot order.
    pub entries: Vec<TimetableEntry>,
}

/// Week-scoped teacher change for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAssignRequest {
    /// Global or weekly entry to change.
    pub timetable_entry_id: EntryId,
    pub new_teacher_id: TeacherId,
    pub class_id: ClassId,
    pub day: Day,
    pub period: u8,
    pub reason: String,
    /// Any date in the target week; defaults to the current week.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl ManualAssignRequest {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day, self.period)
    }
}

/// Outcome of a manual assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResult {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
}

/// Week-scoped extra period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertEntryRequest {
    pub class_id: ClassId,
    pub day: Day,
    pub period: u8,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    #[serde(default)]
    pub room: Option<String>,
    pub reason: String,
    /// Any date in the target week; defaults to the current week.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Outcome of inserting a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub success: bool,
    /// New entry, when inserted.
    pub entry_id: Option<EntryId>,
    pub conflicts: Vec<Conflict>,
}

/// Outcome of cancelling a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub success: bool,
}

/// Outcome of promoting a week to the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    pub success: bool,
    pub entries_promoted: usize,
    pub conflicts: Vec<Conflict>,
}

/// Outcome of replacing a teacher everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceResult {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    pub entries_transferred: usize,
}
