//! Teacher availability and load model.
//!
//! Each teacher carries a weekly availability grid (day → available
//! periods) and optional load limits. [`AvailabilityModel`] combines the
//! teachers with the load they already carry and answers the two questions
//! every scheduling operation asks: "may this teacher take this slot?" and
//! "how much more can they take?".
//!
//! The model is read-only with respect to teacher profiles. Scheduling
//! operations only ever add *load* to a model they built themselves.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{Day, Slot, TeacherId};

/// Weekly availability grid: day → set of available periods.
///
/// A day that is absent from the map is fully unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityGrid {
    days: BTreeMap<Day, BTreeSet<u8>>,
}

impl AvailabilityGrid {
    /// Creates an empty grid (never available).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a grid available for every slot of a `periods_per_day` week.
    pub fn full_week(periods_per_day: u8) -> Self {
        let mut grid = Self::new();
        for day in Day::ALL {
            grid = grid.with_periods(day, 1..=periods_per_day);
        }
        grid
    }

    /// Marks periods of a day as available.
    pub fn with_periods(mut self, day: Day, periods: impl IntoIterator<Item = u8>) -> Self {
        self.days.entry(day).or_default().extend(periods);
        self
    }

    /// Removes a single slot from the grid.
    pub fn without(mut self, slot: Slot) -> Self {
        if let Some(periods) = self.days.get_mut(&slot.day) {
            periods.remove(&slot.period);
        }
        self
    }

    /// Whether the slot is inside the grid.
    pub fn contains(&self, slot: Slot) -> bool {
        self.days
            .get(&slot.day)
            .is_some_and(|periods| periods.contains(&slot.period))
    }

    /// Whether every slot in `slots` is inside the grid.
    pub fn covers<'a>(&self, slots: impl IntoIterator<Item = &'a Slot>) -> bool {
        slots.into_iter().all(|s| self.contains(*s))
    }

    /// All available slots, in slot order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.days
            .iter()
            .flat_map(|(day, periods)| periods.iter().map(|p| Slot::new(*day, *p)))
    }

    /// Number of available slots.
    pub fn slot_count(&self) -> usize {
        self.days.values().map(BTreeSet::len).sum()
    }
}

/// Teaching load limits. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxLoad {
    /// Maximum periods per day.
    pub per_day: Option<u32>,
    /// Maximum periods per week.
    pub per_week: Option<u32>,
}

/// A teacher profile as seen by the scheduling core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    /// Unique teacher identifier.
    pub id: TeacherId,
    /// Display name.
    pub name: String,
    /// Inactive teachers are never proposed or assigned.
    pub active: bool,
    /// Weekly availability.
    pub availability: AvailabilityGrid,
    /// Load limits.
    pub max_load: MaxLoad,
}

impl Teacher {
    /// Creates an active teacher with an empty availability grid.
    pub fn new(id: impl Into<TeacherId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            active: true,
            availability: AvailabilityGrid::new(),
            max_load: MaxLoad::default(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the availability grid.
    pub fn with_availability(mut self, availability: AvailabilityGrid) -> Self {
        self.availability = availability;
        self
    }

    /// Sets the daily load limit.
    pub fn with_max_per_day(mut self, max: u32) -> Self {
        self.max_load.per_day = Some(max);
        self
    }

    /// Sets the weekly load limit.
    pub fn with_max_per_week(mut self, max: u32) -> Self {
        self.max_load.per_week = Some(max);
        self
    }

    /// Marks the teacher inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether the teacher is available at a slot.
    pub fn is_available(&self, slot: Slot) -> bool {
        self.availability.contains(slot)
    }
}

/// Availability oracle: teacher grids plus the load already assigned.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityModel {
    teachers: HashMap<TeacherId, Teacher>,
    daily: HashMap<(TeacherId, Day), u32>,
    weekly: HashMap<TeacherId, u32>,
}

impl AvailabilityModel {
    /// Builds a model with no recorded load.
    pub fn new(teachers: impl IntoIterator<Item = Teacher>) -> Self {
        Self {
            teachers: teachers.into_iter().map(|t| (t.id.clone(), t)).collect(),
            daily: HashMap::new(),
            weekly: HashMap::new(),
        }
    }

    /// Looks up a teacher.
    pub fn teacher(&self, teacher_id: &str) -> Option<&Teacher> {
        self.teachers.get(teacher_id)
    }

    /// Whether the teacher is known, active, and available at the slot.
    pub fn is_available(&self, teacher_id: &str, day: Day, period: u8) -> bool {
        self.teacher(teacher_id)
            .is_some_and(|t| t.active && t.is_available(Slot::new(day, period)))
    }

    /// Periods the teacher may still take on `day`.
    ///
    /// Returns 0 for unknown teachers and `u32::MAX` when unlimited.
    pub fn remaining_load(&self, teacher_id: &str, day: Day) -> u32 {
        let Some(teacher) = self.teacher(teacher_id) else {
            return 0;
        };
        let used = self
            .daily
            .get(&(teacher_id.to_string(), day))
            .copied()
            .unwrap_or(0);
        let day_left = teacher
            .max_load
            .per_day
            .map_or(u32::MAX, |max| max.saturating_sub(used));
        day_left.min(self.remaining_week_load(teacher_id))
    }

    /// Periods the teacher may still take this week.
    pub fn remaining_week_load(&self, teacher_id: &str) -> u32 {
        let Some(teacher) = self.teacher(teacher_id) else {
            return 0;
        };
        let used = self.weekly.get(teacher_id).copied().unwrap_or(0);
        teacher
            .max_load
            .per_week
            .map_or(u32::MAX, |max| max.saturating_sub(used))
    }

    /// Whether the teacher may take one more period at `slot`.
    pub fn can_take(&self, teacher_id: &str, slot: Slot) -> bool {
        self.is_available(teacher_id, slot.day, slot.period)
            && self.remaining_load(teacher_id, slot.day) > 0
    }

    /// Records one period of load for the teacher.
    pub fn record(&mut self, teacher_id: &str, day: Day) {
        *self.daily.entry((teacher_id.to_string(), day)).or_insert(0) += 1;
        *self.weekly.entry(teacher_id.to_string()).or_insert(0) += 1;
    }
}
