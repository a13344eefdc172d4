//! Teacher replacement: moving every entry of one teacher to another.
//!
//! # Algorithm
//!
//! 1. Lock both teachers and every class holding an active entry of the
//!    outgoing teacher, in Global or in any week from the current one on.
//!    If that class set grows while waiting, release and retry.
//! 2. For the Global layer and each such week, resolve the school's
//!    effective timetable and simulate the transfer: every slot the
//!    incoming teacher cannot take (unavailable, already teaching
//!    elsewhere, over a load limit) becomes a conflict.
//! 3. Any conflict aborts the whole call. Otherwise every affected Global
//!    and weekly layer is rewritten in one batch.
//!
//! Elapsed weeks are never rewritten.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::dto::ReplaceResult;
use super::{loaded_model, TimetableService, LOCK_ATTEMPTS};
use crate::coordinator::{LockGuard, LockKey};
use crate::error::{Result, TimetableError};
use crate::models::{
    AvailabilityModel, ClassId, Conflict, EffectiveTimetable, Slot, Teacher, TimetableEntry,
};
use crate::store::{TimetableStore, WriteBatch, WriteOp};

impl<S: TimetableStore> TimetableService<S> {
    /// Teachers who could take over every Global slot of `teacher_id`.
    ///
    /// A candidate is active, available at all of those slots, not already
    /// teaching at any of them, and stays within its load limits after
    /// taking them on. Sorted by id.
    pub fn find_replacement_candidates(&self, teacher_id: &str) -> Result<Vec<Teacher>> {
        let original = self.teacher(teacher_id)?;
        let school = self.school_week(None)?;

        let slots: Vec<Slot> = school
            .iter()
            .flat_map(|(_, tt)| tt.entries_for_teacher(&original.id).map(|e| e.slot))
            .collect();

        let mut candidates: Vec<Teacher> = self
            .store
            .list_teachers()?
            .into_iter()
            .filter(|t| t.active && t.id != original.id)
            .filter(|t| {
                let busy = school
                    .iter()
                    .any(|(_, tt)| tt.entries_for_teacher(&t.id).any(|e| slots.contains(&e.slot)));
                !busy && takes_all(loaded_model([t.clone()], &school, None), &t.id, &slots)
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates)
    }

    /// Transfers every active entry of `original_id` to `replacement_id`,
    /// in Global and in every week from the current one on.
    ///
    /// All or nothing: any conflict returns `success: false` with the full
    /// conflict list and writes nothing.
    pub fn replace_teacher(
        &self,
        original_id: &str,
        replacement_id: &str,
        reason: &str,
    ) -> Result<ReplaceResult> {
        if original_id == replacement_id {
            return Err(TimetableError::validation(
                "replacement teacher must differ from the original",
            ));
        }
        self.teacher(original_id)?;
        let replacement = self.teacher(replacement_id)?;

        let (_guard, weeks) = self.lock_teacher_classes(original_id, replacement_id)?;

        let mut conflicts = Vec::new();
        let mut scopes: Vec<Option<NaiveDate>> = vec![None];
        scopes.extend(weeks.iter().copied().map(Some));
        for scope in &scopes {
            let school = self.school_week(*scope)?;
            conflicts.extend(transfer_conflicts(original_id, &replacement, *scope, &school));
        }

        if !conflicts.is_empty() {
            warn!(
                original_id,
                replacement_id,
                conflicts = conflicts.len(),
                "teacher replacement rejected"
            );
            return Ok(ReplaceResult {
                success: false,
                conflicts,
                entries_transferred: 0,
            });
        }

        let mut batch = WriteBatch::new();
        let mut entries_transferred = 0;
        for class_id in self.store.list_classes()? {
            let mut global = self.store.load_global_entries(&class_id)?;
            let moved = transfer(&mut global, original_id, replacement_id);
            if moved > 0 {
                entries_transferred += moved;
                batch.push(WriteOp::ReplaceGlobal {
                    class_id: class_id.clone(),
                    entries: global,
                    archive: false,
                });
            }

            for week_start in &weeks {
                let Some(mut layer) = self.store.load_weekly_entries(&class_id, *week_start)? else {
                    continue;
                };
                let moved = transfer(&mut layer, original_id, replacement_id);
                if moved > 0 {
                    entries_transferred += moved;
                    batch.push(WriteOp::WriteWeekly {
                        class_id: class_id.clone(),
                        week_start: *week_start,
                        entries: layer,
                    });
                }
            }
        }

        if !batch.is_empty() {
            self.store.commit(batch)?;
        }
        info!(
            original_id,
            replacement_id,
            entries_transferred,
            reason,
            "teacher replaced"
        );

        Ok(ReplaceResult {
            success: true,
            conflicts: Vec::new(),
            entries_transferred,
        })
    }

    /// Classes where `teacher_id` holds an active entry in Global or in
    /// one of `weeks`.
    fn classes_of_teacher(
        &self,
        teacher_id: &str,
        weeks: &BTreeSet<NaiveDate>,
    ) -> Result<BTreeSet<ClassId>> {
        let mut classes = BTreeSet::new();
        for class_id in self.store.list_classes()? {
            let mut holds = self
                .store
                .load_global_entries(&class_id)?
                .iter()
                .any(|e| e.is_active && e.teacher_id == teacher_id);
            for week_start in weeks {
                if holds {
                    break;
                }
                if let Some(layer) = self.store.load_weekly_entries(&class_id, *week_start)? {
                    holds = layer.iter().any(|e| e.is_active && e.teacher_id == teacher_id);
                }
            }
            if holds {
                classes.insert(class_id);
            }
        }
        Ok(classes)
    }

    /// Locks both teachers and the outgoing teacher's classes, retrying
    /// while the class set changes underneath.
    fn lock_teacher_classes(
        &self,
        original_id: &str,
        replacement_id: &str,
    ) -> Result<(LockGuard, BTreeSet<NaiveDate>)> {
        for attempt in 1..=LOCK_ATTEMPTS {
            let weeks = self.live_weeks()?;
            let classes = self.classes_of_teacher(original_id, &weeks)?;

            let keys = classes
                .iter()
                .map(LockKey::class)
                .chain([LockKey::teacher(original_id), LockKey::teacher(replacement_id)]);
            let guard = self.lock(keys)?;

            let weeks_now = self.live_weeks()?;
            if weeks_now.is_subset(&weeks)
                && self.classes_of_teacher(original_id, &weeks_now)?.is_subset(&classes)
            {
                return Ok((guard, weeks_now));
            }
            debug!(original_id, attempt, "class set changed while locking, retrying");
        }
        Err(TimetableError::ConcurrencyTimeout {
            resource: LockKey::teacher(original_id).to_string(),
            waited_ms: self.config.lock_timeout_ms,
        })
    }
}

/// Reassigns the active entries of `from` in a layer. Returns how many.
fn transfer(entries: &mut [TimetableEntry], from: &str, to: &str) -> usize {
    let mut moved = 0;
    for e in entries.iter_mut().filter(|e| e.is_active && e.teacher_id == from) {
        e.teacher_id = to.to_string();
        moved += 1;
    }
    moved
}

/// Whether `teacher_id` can take every slot of `slots` on top of the load
/// `model` already carries.
fn takes_all(mut model: AvailabilityModel, teacher_id: &str, slots: &[Slot]) -> bool {
    for slot in slots {
        if !model.can_take(teacher_id, *slot) {
            return false;
        }
        model.record(teacher_id, slot.day);
    }
    true
}

/// Conflicts of moving every active entry of `original_id` in `school` to
/// `replacement`.
fn transfer_conflicts(
    original_id: &str,
    replacement: &Teacher,
    scope: Option<NaiveDate>,
    school: &[(ClassId, EffectiveTimetable)],
) -> Vec<Conflict> {
    let mut model = loaded_model([replacement.clone()], school, None);
    let mut conflicts = Vec::new();

    for (class_id, tt) in school {
        for moving in tt.entries_for_teacher(original_id) {
            let slot = moving.slot;
            if !model.is_available(&replacement.id, slot.day, slot.period) {
                conflicts.push(Conflict::unavailable(&replacement.id, class_id, slot, scope));
            }
            for (_, other) in school {
                for held in other.entries_for_teacher(&replacement.id).filter(|e| e.slot == slot) {
                    conflicts.push(Conflict::double_booked(&replacement.id, held, scope));
                }
            }
            if model.remaining_load(&replacement.id, slot.day) == 0 {
                conflicts.push(Conflict::load_exceeded(&replacement.id, class_id, slot, scope));
            }
            model.record(&replacement.id, slot.day);
        }
    }

    conflicts
}
