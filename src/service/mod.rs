//! Timetable service: the operations administrators call.
//!
//! `TimetableService` ties together the store, the generator, and the lock
//! table. Operations are grouped by concern:
//!
//! - **reads** (this module): Global, weekly, effective, and per-teacher views
//! - **`overrides`**: refresh, manual assignment, insertion, cancellation
//! - **`promotion`**: making a week the new baseline
//! - **`reassignment`**: replacement candidates and whole-load transfer
//! - **`substitution`**: single-date substitution requests
//!
//! # Concurrency
//!
//! Mutations hold the coordinator's lock for the classes (and teachers)
//! they touch across their whole check-then-write sequence, and publish
//! through one atomic store batch. Reads take no locks.

mod dto;
mod overrides;
mod promotion;
mod reassignment;
mod substitution;

#[cfg(test)]
mod tests;

pub use dto::{
    AssignResult, DeleteResult, InsertEntryRequest, InsertResult, ManualAssignRequest,
    PromotionResult, RefreshResult, ReplaceResult, TeacherTimetable, WeeklyTimetable,
};

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::debug;

use crate::config::{Clock, SchedulerConfig, SystemClock};
use crate::coordinator::{LockGuard, LockKey, ScheduleCoordinator};
use crate::error::{Result, TimetableError};
use crate::models::{
    week_start_of, AvailabilityModel, ClassId, Conflict, EffectiveTimetable, Slot,
    SubjectRequirement, Teacher, TeacherId, TimetableEntry,
};
use crate::scheduler::{TimetableGenerator, TimetableKpi};
use crate::store::TimetableStore;
use crate::validation::validate_slot;

/// Attempts at locking a stable key set before giving up.
const LOCK_ATTEMPTS: usize = 3;

/// Scheduling core facade.
pub struct TimetableService<S> {
    store: Arc<S>,
    config: SchedulerConfig,
    tz: Tz,
    coordinator: ScheduleCoordinator,
    clock: Arc<dyn Clock>,
    generator: TimetableGenerator,
}

impl<S: TimetableStore> TimetableService<S> {
    /// Creates a service with its own lock table and the system clock.
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Result<Self> {
        Self::with_coordinator(store, config, ScheduleCoordinator::new())
    }

    /// Creates a service sharing an existing lock table.
    ///
    /// Services over the same store must share one coordinator.
    pub fn with_coordinator(
        store: Arc<S>,
        config: SchedulerConfig,
        coordinator: ScheduleCoordinator,
    ) -> Result<Self> {
        config.validate()?;
        let tz = config.tz()?;
        Ok(Self {
            store,
            generator: TimetableGenerator::new(config.periods_per_day),
            config,
            tz,
            coordinator,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The lock table in use.
    pub fn coordinator(&self) -> &ScheduleCoordinator {
        &self.coordinator
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ── reads ────────────────────────────────────────────────────────────

    /// Global entries of a class, in slot order.
    pub fn get_global_timetable(&self, class_id: &str) -> Result<Vec<TimetableEntry>> {
        self.requirements(class_id)?;
        let mut entries = self.store.load_global_entries(class_id)?;
        entries.sort_by_key(|e| e.slot);
        Ok(entries)
    }

    /// Effective timetable of a class for the week containing `date`
    /// (default: the current week).
    pub fn get_enhanced_timetable(
        &self,
        class_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<EffectiveTimetable> {
        self.requirements(class_id)?;
        self.effective(class_id, self.week_of(date))
    }

    /// Weekly view of a class for the week containing `date`.
    pub fn get_weekly_timetable(
        &self,
        class_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<WeeklyTimetable> {
        self.requirements(class_id)?;
        let week_start = self.week_of(date);
        let effective = self.effective(class_id, week_start)?;
        Ok(WeeklyTimetable {
            has_weekly_overrides: effective.modification_count > 0,
            week_start,
            entries: effective.entries,
        })
    }

    /// A teacher's effective week across every class.
    pub fn get_teacher_timetable(
        &self,
        teacher_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<TeacherTimetable> {
        self.teacher(teacher_id)?;
        let week_start = self.week_of(date);
        let mut entries: Vec<TimetableEntry> = self
            .school_week(Some(week_start))?
            .iter()
            .flat_map(|(_, tt)| tt.entries_for_teacher(teacher_id).cloned())
            .collect();
        entries.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.class_id.cmp(&b.class_id)));
        Ok(TeacherTimetable {
            teacher_id: teacher_id.to_string(),
            week_start,
            entries,
        })
    }

    /// Quality metrics of a class's effective week.
    pub fn timetable_kpi(&self, class_id: &str, date: Option<NaiveDate>) -> Result<TimetableKpi> {
        let requirements = self.requirements(class_id)?;
        let effective = self.effective(class_id, self.week_of(date))?;
        let entries: Vec<TimetableEntry> =
            effective.entries.into_iter().map(|e| e.entry).collect();
        Ok(TimetableKpi::calculate(&entries, &requirements))
    }

    // ── helpers shared by the operation modules ──────────────────────────

    /// Monday of the current week in the school's calendar.
    pub fn current_week(&self) -> NaiveDate {
        week_start_of(self.clock.today(self.tz))
    }

    fn week_of(&self, date: Option<NaiveDate>) -> NaiveDate {
        date.map(week_start_of)
            .unwrap_or_else(|| self.current_week())
    }

    /// Rejects edits to weeks that have already elapsed.
    fn ensure_editable(&self, week_start: NaiveDate) -> Result<()> {
        if week_start < self.current_week() {
            return Err(TimetableError::validation(format!(
                "week {week_start} has elapsed and can no longer be changed"
            )));
        }
        Ok(())
    }

    fn ensure_slot(&self, slot: Slot) -> Result<()> {
        validate_slot(slot, self.config.periods_per_day)?;
        Ok(())
    }

    fn lock(&self, keys: impl IntoIterator<Item = LockKey>) -> Result<LockGuard> {
        self.coordinator.acquire(keys, self.config.lock_timeout())
    }

    /// Requirements of a class; unknown classes are a validation error.
    fn requirements(&self, class_id: &str) -> Result<Vec<SubjectRequirement>> {
        self.store
            .load_class_subject_requirements(class_id)?
            .ok_or_else(|| TimetableError::validation(format!("unknown class '{class_id}'")))
    }

    /// Teacher profile; unknown teachers are a validation error.
    fn teacher(&self, teacher_id: &str) -> Result<Teacher> {
        self.store
            .load_teacher(teacher_id)?
            .ok_or_else(|| TimetableError::validation(format!("unknown teacher '{teacher_id}'")))
    }

    fn effective(&self, class_id: &str, week_start: NaiveDate) -> Result<EffectiveTimetable> {
        let global = self.store.load_global_entries(class_id)?;
        let weekly = self.store.load_weekly_entries(class_id, week_start)?;
        Ok(EffectiveTimetable::resolve(global, weekly))
    }

    /// Every class's timetable for one scope: the Global layer when `week`
    /// is `None`, the effective week otherwise.
    fn school_week(&self, week: Option<NaiveDate>) -> Result<Vec<(ClassId, EffectiveTimetable)>> {
        let mut out = Vec::new();
        for class_id in self.store.list_classes()? {
            let tt = match week {
                Some(w) => self.effective(&class_id, w)?,
                None => EffectiveTimetable::resolve(self.store.load_global_entries(&class_id)?, None),
            };
            out.push((class_id, tt));
        }
        Ok(out)
    }

    /// The layer a week edit starts from: the stored weekly layer, or a
    /// fresh copy of the Global layer (copy-on-first-write).
    fn materialize_week(&self, class_id: &str, week_start: NaiveDate) -> Result<Vec<TimetableEntry>> {
        match self.store.load_weekly_entries(class_id, week_start)? {
            Some(entries) => Ok(entries),
            None => Ok(self
                .store
                .load_global_entries(class_id)?
                .iter()
                .map(|e| e.derive_weekly(week_start))
                .collect()),
        }
    }

    /// Weeks from the current one on that some class has a layer for.
    fn live_weeks(&self) -> Result<BTreeSet<NaiveDate>> {
        let current = self.current_week();
        let mut weeks = BTreeSet::new();
        for class_id in self.store.list_classes()? {
            weeks.extend(
                self.store
                    .list_weekly_weeks(&class_id)?
                    .into_iter()
                    .filter(|w| *w >= current),
            );
        }
        Ok(weeks)
    }

    /// Live weeks where `class_id` has no layer of its own and so resolves
    /// to its Global layer.
    fn weeks_following_global(&self, class_id: &str) -> Result<Vec<NaiveDate>> {
        let own: BTreeSet<NaiveDate> = self.store.list_weekly_weeks(class_id)?.into_iter().collect();
        Ok(self
            .live_weeks()?
            .into_iter()
            .filter(|w| !own.contains(w))
            .collect())
    }

    /// Locks `class_id` and the teachers `teachers` reports.
    ///
    /// The teacher set is read again under the lock; if it grew, the lock
    /// is released and the call retried.
    fn lock_class_with_teachers(
        &self,
        class_id: &str,
        teachers: impl Fn() -> Result<BTreeSet<TeacherId>>,
    ) -> Result<LockGuard> {
        for attempt in 1..=LOCK_ATTEMPTS {
            let wanted = teachers()?;
            let keys = std::iter::once(LockKey::class(class_id))
                .chain(wanted.iter().map(LockKey::teacher));
            let guard = self.lock(keys)?;
            if teachers()?.is_subset(&wanted) {
                return Ok(guard);
            }
            debug!(class_id, attempt, "teacher set changed while locking, retrying");
        }
        Err(TimetableError::ConcurrencyTimeout {
            resource: LockKey::class(class_id).to_string(),
            waited_ms: self.config.lock_timeout_ms,
        })
    }

    /// Conflicts that assigning `teacher` to `slot` of `class_id` would
    /// create in one scope of `school`.
    ///
    /// Entries of `class_id` at `slot` are the ones being replaced and are
    /// ignored.
    fn assignment_conflicts(
        &self,
        teacher: &Teacher,
        class_id: &str,
        slot: Slot,
        week: Option<NaiveDate>,
        school: &[(ClassId, EffectiveTimetable)],
    ) -> Vec<Conflict> {
        let model = loaded_model([teacher.clone()], school, Some((class_id, slot)));
        let mut conflicts = Vec::new();

        if !model.is_available(&teacher.id, slot.day, slot.period) {
            conflicts.push(Conflict::unavailable(&teacher.id, class_id, slot, week));
        }
        for (other_class, tt) in school {
            if other_class == class_id {
                continue;
            }
            for e in tt.entries_for_teacher(&teacher.id).filter(|e| e.slot == slot) {
                conflicts.push(Conflict::double_booked(&teacher.id, e, week));
            }
        }
        if model.remaining_load(&teacher.id, slot.day) == 0 {
            conflicts.push(Conflict::load_exceeded(&teacher.id, class_id, slot, week));
        }

        conflicts
    }
}

/// Availability model over `teachers`, loaded with the active entries they
/// already hold in `school`. The entry of a class at a slot named by
/// `replacing` is left out.
fn loaded_model(
    teachers: impl IntoIterator<Item = Teacher>,
    school: &[(ClassId, EffectiveTimetable)],
    replacing: Option<(&str, Slot)>,
) -> AvailabilityModel {
    let mut model = AvailabilityModel::new(teachers);
    for (class_id, tt) in school {
        for e in tt.active_entries() {
            if replacing.is_some_and(|(c, s)| c == class_id.as_str() && s == e.slot) {
                continue;
            }
            if model.teacher(&e.teacher_id).is_some() {
                model.record(&e.teacher_id, e.slot.day);
            }
        }
    }
    model
}
