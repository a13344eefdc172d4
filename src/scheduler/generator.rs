//! Greedy Global timetable generator.
//!
//! # Algorithm
//!
//! 1. Seed the availability model with the load teachers already carry in
//!    other classes, and mark those (teacher, slot) pairs busy. Blocked
//!    pairs are busy too but carry no load.
//! 2. Order requirements by demand (largest first), then subject ID.
//! 3. For each requirement, walk slots Monday → Friday, period 1 → N:
//!    - first pass: at most one period of the subject per day;
//!    - second pass: fill whatever is still missing, repeats allowed.
//! 4. For each open slot, take the first candidate teacher (preferred
//!    teacher first) who is available, not busy, and under load limits.
//! 5. Whatever cannot be placed is reported, not forced.
//!
//! Identical input produces identical slot/subject/teacher assignments.
//!
//! # Complexity
//! O(r * s * c) where r=requirements, s=slots/week, c=candidate teachers.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{
    AvailabilityModel, ClassId, Day, Slot, SubjectId, SubjectRequirement, Teacher, TeacherId,
    TimetableEntry,
};

/// Input container for generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Class to generate for.
    pub class_id: ClassId,
    /// Subjects and their weekly demand.
    pub requirements: Vec<SubjectRequirement>,
    /// Teacher profiles (availability and load limits).
    pub teachers: Vec<Teacher>,
    /// Active entries of other classes that teachers are already committed to.
    pub occupied: Vec<TimetableEntry>,
    /// (teacher, slot) pairs that are off limits without counting as load,
    /// e.g. held in some other week the new timetable will apply to.
    pub blocked: Vec<(TeacherId, Slot)>,
}

impl GenerationRequest {
    /// Creates a request with no outside occupancy.
    pub fn new(
        class_id: impl Into<ClassId>,
        requirements: Vec<SubjectRequirement>,
        teachers: Vec<Teacher>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            requirements,
            teachers,
            occupied: Vec::new(),
            blocked: Vec::new(),
        }
    }

    /// Sets the outside occupancy.
    pub fn with_occupied(mut self, occupied: Vec<TimetableEntry>) -> Self {
        self.occupied = occupied;
        self
    }

    /// Sets the blocked (teacher, slot) pairs.
    pub fn with_blocked(mut self, blocked: Vec<(TeacherId, Slot)>) -> Self {
        self.blocked = blocked;
        self
    }
}

/// A subject whose weekly demand could not be fully placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsatisfiedRequirement {
    /// Subject identifier.
    pub subject_id: SubjectId,
    /// Periods per week requested.
    pub required: u32,
    /// Periods actually placed.
    pub placed: u32,
    /// Why the remainder could not be placed.
    pub reason: String,
}

/// Generated Global entries plus the unmet demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// New Global entries, in slot order.
    pub entries: Vec<TimetableEntry>,
    /// Requirements that could not be met.
    pub unsatisfied_requirements: Vec<UnsatisfiedRequirement>,
}

impl GenerationResult {
    /// Whether every requirement was met.
    pub fn is_complete(&self) -> bool {
        self.unsatisfied_requirements.is_empty()
    }

    /// Entries of one subject.
    pub fn entries_for_subject<'a>(
        &'a self,
        subject_id: &'a str,
    ) -> impl Iterator<Item = &'a TimetableEntry> + 'a {
        self.entries.iter().filter(move |e| e.subject_id == subject_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    OnePerDay,
    Fill,
}

/// Deterministic greedy generator.
///
/// # Example
///
/// ```
/// use u_timetable::models::{AvailabilityGrid, SubjectRequirement, Teacher};
/// use u_timetable::scheduler::{GenerationRequest, TimetableGenerator};
///
/// let teachers = vec![Teacher::new("T1").with_availability(AvailabilityGrid::full_week(6))];
/// let requirements = vec![SubjectRequirement::new("math", 5).with_teacher("T1")];
///
/// let result = TimetableGenerator::new(6)
///     .generate(&GenerationRequest::new("C1", requirements, teachers));
/// assert_eq!(result.entries.len(), 5);
/// assert!(result.is_complete());
/// ```
#[derive(Debug, Clone)]
pub struct TimetableGenerator {
    periods_per_day: u8,
}

impl TimetableGenerator {
    /// Creates a generator for days of `periods_per_day` periods.
    pub fn new(periods_per_day: u8) -> Self {
        Self { periods_per_day }
    }

    /// Generates a Global timetable.
    pub fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut model = AvailabilityModel::new(request.teachers.iter().cloned());
        let mut busy: HashSet<(TeacherId, Slot)> = HashSet::new();

        for e in request.occupied.iter().filter(|e| e.is_active) {
            if busy.insert((e.teacher_id.clone(), e.slot)) {
                model.record(&e.teacher_id, e.slot.day);
            }
        }
        busy.extend(request.blocked.iter().cloned());

        let mut order: Vec<&SubjectRequirement> = request.requirements.iter().collect();
        order.sort_by(|a, b| {
            Reverse(a.periods_per_week)
                .cmp(&Reverse(b.periods_per_week))
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });

        let mut taken: HashSet<Slot> = HashSet::new();
        let mut subject_days: HashMap<&str, HashSet<Day>> = HashMap::new();
        let mut result = GenerationResult::default();

        for req in order {
            let candidates = req.candidates();
            let mut placed: u32 = 0;

            for pass in [Pass::OnePerDay, Pass::Fill] {
                for slot in Slot::week(self.periods_per_day) {
                    if placed >= req.periods_per_week {
                        break;
                    }
                    if taken.contains(&slot) {
                        continue;
                    }
                    let days = subject_days.entry(req.subject_id.as_str()).or_default();
                    if pass == Pass::OnePerDay && days.contains(&slot.day) {
                        continue;
                    }

                    let teacher = candidates.iter().copied().find(|t| {
                        !busy.contains(&(t.to_string(), slot)) && model.can_take(t, slot)
                    });
                    let Some(teacher) = teacher else {
                        continue;
                    };

                    let mut entry =
                        TimetableEntry::global(request.class_id.clone(), slot, &req.subject_id, teacher);
                    entry.room = req.room.clone();
                    result.entries.push(entry);

                    taken.insert(slot);
                    days.insert(slot.day);
                    busy.insert((teacher.to_string(), slot));
                    model.record(teacher, slot.day);
                    placed += 1;
                }
            }

            if placed < req.periods_per_week {
                let missing = req.periods_per_week - placed;
                let reason = if candidates.is_empty() {
                    "no teacher is associated with this subject".to_string()
                } else {
                    format!("no available, non-conflicting teacher for {missing} remaining period(s)")
                };
                result.unsatisfied_requirements.push(UnsatisfiedRequirement {
                    subject_id: req.subject_id.clone(),
                    required: req.periods_per_week,
                    placed,
                    reason,
                });
            }
        }

        result.entries.sort_by_key(|e| e.slot);
        result
    }
}
