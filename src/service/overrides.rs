//! Global regeneration and week-scoped overrides.
//!
//! Every week edit follows the same sequence under the class lock:
//! materialize the week's layer (copy-on-first-write from Global), check
//! the change against the whole school's effective week, then write the
//! layer back in one batch. A change with conflicts writes nothing.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::dto::{
    AssignResult, DeleteResult, InsertEntryRequest, InsertResult, ManualAssignRequest,
    RefreshResult,
};
use super::TimetableService;
use crate::config::RetentionPolicy;
use crate::coordinator::LockKey;
use crate::error::{Result, TimetableError};
use crate::models::{
    ClassId, Conflict, Layer, Modification, Slot, SubjectRequirement, Teacher, TeacherId,
    TimetableEntry,
};
use crate::scheduler::{GenerationRequest, GenerationResult};
use crate::store::{TimetableStore, WriteBatch, WriteOp};
use crate::validation::{validate_requirements, validate_teachers, ValidationErrorKind};

/// Outcome of planning a single-slot teacher change.
pub(super) enum AssignmentPlan {
    /// The week layer to write.
    Write(WriteOp),
    /// The change would break a scheduling rule.
    Rejected(Vec<Conflict>),
}

impl<S: TimetableStore> TimetableService<S> {
    /// Regenerates a class's Global timetable and resets the current week.
    ///
    /// The new Global layer and a fresh copy of it as the current week's
    /// layer are written in one batch. Other weeks are left alone.
    ///
    /// Locks the class and every candidate teacher of its requirements.
    pub fn refresh_global_timetable(&self, class_id: &str) -> Result<RefreshResult> {
        let requirements = self.checked_requirements(class_id)?;

        let _guard = self.lock_class_with_teachers(class_id, || {
            Ok(self
                .requirements(class_id)?
                .iter()
                .flat_map(|r| r.candidates())
                .map(str::to_string)
                .collect::<BTreeSet<TeacherId>>())
        })?;
        let week_start = self.current_week();

        let request = self.generation_request(class_id, requirements, week_start)?;
        let generated = self.generator.generate(&request);

        let global_deleted = self.store.load_global_entries(class_id)?.len();
        let weekly_deleted = self
            .store
            .load_weekly_entries(class_id, week_start)?
            .map_or(0, |entries| entries.len());

        let weekly: Vec<TimetableEntry> = generated
            .entries
            .iter()
            .map(|e| e.derive_weekly(week_start))
            .collect();
        let entries_created = generated.entries.len();

        let batch = WriteBatch::new()
            .with(WriteOp::ReplaceGlobal {
                class_id: class_id.to_string(),
                entries: generated.entries,
                archive: self.config.retention == RetentionPolicy::Archive,
            })
            .with(WriteOp::WriteWeekly {
                class_id: class_id.to_string(),
                week_start,
                entries: weekly,
            });
        self.store.commit(batch)?;

        if !generated.unsatisfied_requirements.is_empty() {
            warn!(
                class_id,
                unsatisfied = generated.unsatisfied_requirements.len(),
                "generation left requirements unsatisfied"
            );
        }
        info!(
            class_id,
            week = %week_start,
            entries_created,
            global_deleted,
            weekly_deleted,
            "global timetable refreshed"
        );

        Ok(RefreshResult {
            success: true,
            entries_created,
            global_deleted,
            weekly_deleted,
            week_start,
            unsatisfied_requirements: generated.unsatisfied_requirements,
        })
    }

    /// Runs the generator for a class without writing anything.
    pub fn preview_global_timetable(&self, class_id: &str) -> Result<GenerationResult> {
        let requirements = self.checked_requirements(class_id)?;
        let request = self.generation_request(class_id, requirements, self.current_week())?;
        Ok(self.generator.generate(&request))
    }

    /// Reassigns one slot of one week to another teacher.
    ///
    /// Conflicts are returned with `success: false` and leave every layer
    /// unchanged.
    pub fn manual_assign(&self, request: &ManualAssignRequest) -> Result<AssignResult> {
        let slot = request.slot();
        self.ensure_slot(slot)?;
        self.requirements(&request.class_id)?;
        let teacher = self.teacher(&request.new_teacher_id)?;
        let week_start = self.week_of(request.date);
        self.ensure_editable(week_start)?;

        let _guard = self.lock([
            LockKey::class(&request.class_id),
            LockKey::teacher(&request.new_teacher_id),
        ])?;

        let plan = self.plan_assignment(
            &request.class_id,
            week_start,
            &request.timetable_entry_id,
            slot,
            &teacher,
            &request.reason,
        )?;
        match plan {
            AssignmentPlan::Rejected(conflicts) => {
                warn!(
                    class_id = %request.class_id,
                    teacher_id = %teacher.id,
                    week = %week_start,
                    %slot,
                    conflicts = conflicts.len(),
                    "manual assignment rejected"
                );
                Ok(AssignResult {
                    success: false,
                    conflicts,
                })
            }
            AssignmentPlan::Write(op) => {
                self.store.commit(WriteBatch::new().with(op))?;
                info!(
                    class_id = %request.class_id,
                    teacher_id = %teacher.id,
                    week = %week_start,
                    %slot,
                    "teacher reassigned for week"
                );
                Ok(AssignResult {
                    success: true,
                    conflicts: Vec::new(),
                })
            }
        }
    }

    /// Adds a period that exists only in one week.
    ///
    /// The slot must hold no active entry for that week.
    pub fn insert_entry(&self, request: &InsertEntryRequest) -> Result<InsertResult> {
        let slot = Slot::new(request.day, request.period);
        self.ensure_slot(slot)?;
        self.requirements(&request.class_id)?;
        let teacher = self.teacher(&request.teacher_id)?;
        let week_start = self.week_of(request.date);
        self.ensure_editable(week_start)?;

        let _guard = self.lock([
            LockKey::class(&request.class_id),
            LockKey::teacher(&request.teacher_id),
        ])?;

        let mut layer = self.materialize_week(&request.class_id, week_start)?;
        if layer.iter().any(|e| e.is_active && e.slot == slot) {
            return Err(TimetableError::validation(format!(
                "class '{}' already has a period at {slot} in week {week_start}",
                request.class_id
            )));
        }

        let school = self.school_week(Some(week_start))?;
        let conflicts =
            self.assignment_conflicts(&teacher, &request.class_id, slot, Some(week_start), &school);
        if !conflicts.is_empty() {
            warn!(
                class_id = %request.class_id,
                teacher_id = %teacher.id,
                %slot,
                conflicts = conflicts.len(),
                "inserted period rejected"
            );
            return Ok(InsertResult {
                success: false,
                entry_id: None,
                conflicts,
            });
        }

        let mut entry = TimetableEntry::global(
            request.class_id.clone(),
            slot,
            &request.subject_id,
            &request.teacher_id,
        );
        entry.room = request.room.clone();
        entry.layer = Layer::Weekly {
            week_start,
            global_entry_id: None,
            modification: Some(Modification::Inserted {
                reason: request.reason.clone(),
            }),
        };
        let entry_id = entry.id.clone();
        layer.push(entry);

        self.store.commit(WriteBatch::new().with(WriteOp::WriteWeekly {
            class_id: request.class_id.clone(),
            week_start,
            entries: layer,
        }))?;
        info!(class_id = %request.class_id, week = %week_start, %slot, entry_id = %entry_id, "period inserted");

        Ok(InsertResult {
            success: true,
            entry_id: Some(entry_id),
            conflicts: Vec::new(),
        })
    }

    /// Cancels one period of one week. The Global layer is never touched.
    ///
    /// Cancelling an already cancelled period succeeds without writing.
    pub fn cancel_entry(
        &self,
        class_id: &str,
        entry_id: &str,
        date: Option<NaiveDate>,
        reason: Option<String>,
    ) -> Result<DeleteResult> {
        self.requirements(class_id)?;
        let week_start = self.week_of(date);
        self.ensure_editable(week_start)?;

        let _guard = self.lock([LockKey::class(class_id)])?;

        let mut layer = self.materialize_week(class_id, week_start)?;
        let target = layer
            .iter_mut()
            .find(|e| e.matches_id(entry_id))
            .ok_or_else(|| TimetableError::not_found("timetable entry", entry_id))?;

        if !target.is_active {
            debug!(class_id, entry_id, week = %week_start, "period already cancelled");
            return Ok(DeleteResult { success: true });
        }
        target.is_active = false;
        target.mark(Modification::Cancelled { reason });
        let slot = target.slot;

        self.store.commit(WriteBatch::new().with(WriteOp::WriteWeekly {
            class_id: class_id.to_string(),
            week_start,
            entries: layer,
        }))?;
        info!(class_id, entry_id, week = %week_start, %slot, "period cancelled");

        Ok(DeleteResult { success: true })
    }

    /// Cancels an entry located by its identifier alone.
    pub fn delete_timetable_entry(
        &self,
        entry_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<DeleteResult> {
        let week_start = self.week_of(date);
        let (class_id, _) = self.locate_entry(entry_id, week_start)?;
        self.cancel_entry(&class_id, entry_id, Some(week_start), None)
    }

    // ── shared planning ──────────────────────────────────────────────────

    /// Plans a teacher change for one slot of one week without writing.
    ///
    /// The target is found by entry id (its own or its Global reference),
    /// falling back to the active entry at `slot`. An entry found by id must
    /// sit at `slot`. The caller must hold the class lock.
    pub(super) fn plan_assignment(
        &self,
        class_id: &str,
        week_start: NaiveDate,
        entry_id: &str,
        slot: Slot,
        teacher: &Teacher,
        reason: &str,
    ) -> Result<AssignmentPlan> {
        let mut layer = self.materialize_week(class_id, week_start)?;
        let index = match layer.iter().position(|e| e.matches_id(entry_id)) {
            Some(i) if layer[i].slot != slot => {
                return Err(TimetableError::validation(format!(
                    "entry '{entry_id}' is at {}, not at {slot}",
                    layer[i].slot
                )));
            }
            Some(i) => i,
            None => layer
                .iter()
                .position(|e| e.is_active && e.slot == slot)
                .ok_or_else(|| TimetableError::not_found("timetable entry", entry_id))?,
        };

        if !layer[index].is_active
            && layer
                .iter()
                .enumerate()
                .any(|(i, e)| i != index && e.is_active && e.slot == slot)
        {
            return Err(TimetableError::validation(format!(
                "class '{class_id}' already has another period at {slot} in week {week_start}"
            )));
        }

        let school = self.school_week(Some(week_start))?;
        let conflicts = self.assignment_conflicts(teacher, class_id, slot, Some(week_start), &school);
        if !conflicts.is_empty() {
            return Ok(AssignmentPlan::Rejected(conflicts));
        }

        let target = &mut layer[index];
        let previous_teacher_id = match target.modification() {
            Some(Modification::Reassigned {
                previous_teacher_id,
                ..
            }) => previous_teacher_id.clone(),
            _ => target.teacher_id.clone(),
        };
        let inserted = matches!(target.modification(), Some(Modification::Inserted { .. }));

        target.teacher_id = teacher.id.clone();
        target.is_active = true;
        if !inserted {
            target.mark(Modification::Reassigned {
                previous_teacher_id,
                reason: reason.to_string(),
            });
        }

        Ok(AssignmentPlan::Write(WriteOp::WriteWeekly {
            class_id: class_id.to_string(),
            week_start,
            entries: layer,
        }))
    }

    /// Finds the class owning an entry, as seen in one week.
    pub(super) fn locate_entry(
        &self,
        entry_id: &str,
        week_start: NaiveDate,
    ) -> Result<(ClassId, TimetableEntry)> {
        for class_id in self.store.list_classes()? {
            let tt = self.effective(&class_id, week_start)?;
            if let Some(found) = tt.entries.into_iter().find(|e| e.entry.matches_id(entry_id)) {
                return Ok((class_id, found.entry));
            }
        }
        Err(TimetableError::not_found("timetable entry", entry_id))
    }

    /// Loads and validates a class's requirements against the teachers.
    ///
    /// Over-capacity demand and inactive teachers are left to the generator
    /// to report as unsatisfied; every other problem fails the call.
    fn checked_requirements(&self, class_id: &str) -> Result<Vec<SubjectRequirement>> {
        let requirements = self.requirements(class_id)?;
        let teachers = self.store.list_teachers()?;

        let mut hard = Vec::new();
        if let Err(errors) = validate_teachers(&teachers, self.config.periods_per_day) {
            hard.extend(errors);
        }
        if let Err(errors) =
            validate_requirements(&requirements, &teachers, self.config.periods_per_day)
        {
            for e in errors {
                match e.kind {
                    ValidationErrorKind::OverCapacity | ValidationErrorKind::InactiveTeacher => {
                        warn!(class_id, "{}", e.message);
                    }
                    _ => hard.push(e),
                }
            }
        }

        if hard.is_empty() {
            Ok(requirements)
        } else {
            Err(hard.into())
        }
    }

    /// Generator input: the school's teachers plus what other classes
    /// already occupy in Global and in `week_start`.
    ///
    /// Other live weeks where `class_id` follows its Global layer will pick
    /// up the generated timetable too, so what other classes' layers hold
    /// there is blocked as well.
    fn generation_request(
        &self,
        class_id: &str,
        requirements: Vec<SubjectRequirement>,
        week_start: NaiveDate,
    ) -> Result<GenerationRequest> {
        let teachers = self.store.list_teachers()?;
        let mut occupied = Vec::new();
        for other in self.store.list_classes()? {
            if other == class_id {
                continue;
            }
            occupied.extend(
                self.store
                    .load_global_entries(&other)?
                    .into_iter()
                    .filter(|e| e.is_active),
            );
            if let Some(weekly) = self.store.load_weekly_entries(&other, week_start)? {
                occupied.extend(weekly.into_iter().filter(|e| e.is_active));
            }
        }

        let mut blocked = BTreeSet::new();
        for future in self.weeks_following_global(class_id)? {
            if future <= week_start {
                continue;
            }
            for other in self.store.list_classes()? {
                if other == class_id {
                    continue;
                }
                if let Some(layer) = self.store.load_weekly_entries(&other, future)? {
                    blocked.extend(
                        layer
                            .into_iter()
                            .filter(|e| e.is_active)
                            .map(|e| (e.teacher_id, e.slot)),
                    );
                }
            }
        }

        Ok(GenerationRequest::new(class_id, requirements, teachers)
            .with_occupied(occupied)
            .with_blocked(blocked.into_iter().collect()))
    }
}
