//! Class subject requirements.
//!
//! A requirement states how many periods per week a class needs of a
//! subject and which teachers may teach it. The preferred teacher is the
//! one already associated with the subject for that class.

use serde::{Deserialize, Serialize};

use super::{SubjectId, TeacherId};

/// Weekly demand for one subject in one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRequirement {
    /// Subject identifier.
    pub subject_id: SubjectId,
    /// Required periods per week.
    pub periods_per_week: u32,
    /// Teacher associated with this subject for the class.
    pub preferred_teacher: Option<TeacherId>,
    /// Other teachers qualified to take over, in order of preference.
    pub qualified_teachers: Vec<TeacherId>,
    /// Room to place the subject in, if fixed.
    pub room: Option<String>,
}

impl SubjectRequirement {
    /// Creates a requirement with no teachers attached.
    pub fn new(subject_id: impl Into<SubjectId>, periods_per_week: u32) -> Self {
        Self {
            subject_id: subject_id.into(),
            periods_per_week,
            preferred_teacher: None,
            qualified_teachers: Vec::new(),
            room: None,
        }
    }

    /// Sets the preferred teacher.
    pub fn with_teacher(mut self, teacher_id: impl Into<TeacherId>) -> Self {
        self.preferred_teacher = Some(teacher_id.into());
        self
    }

    /// Adds a qualified fallback teacher.
    pub fn with_qualified(mut self, teacher_id: impl Into<TeacherId>) -> Self {
        self.qualified_teachers.push(teacher_id.into());
        self
    }

    /// Sets the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Candidate teachers: preferred first, then qualified, without duplicates.
    pub fn candidates(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self
            .preferred_teacher
            .iter()
            .chain(self.qualified_teachers.iter())
        {
            if !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }
}
