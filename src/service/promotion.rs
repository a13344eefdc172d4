//! Promotion: a week's effective timetable becomes the Global baseline.
//!
//! Only the Global layer is rewritten. Weeks without their own layer pick
//! up the new baseline through resolution; weeks with a layer, including
//! the promoted one, keep it.
//!
//! The promoted entries are checked for double bookings against other
//! classes' Global layers and against their week layers in every live week
//! that will pick up the new baseline.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::{info, warn};

use super::dto::PromotionResult;
use super::TimetableService;
use crate::config::RetentionPolicy;
use crate::error::{Result, TimetableError};
use crate::models::{week_start_of, Conflict, TeacherId, TimetableEntry};
use crate::store::{TimetableStore, WriteBatch, WriteOp};

impl<S: TimetableStore> TimetableService<S> {
    /// Makes the effective timetable of the week containing `date` the new
    /// Global timetable of the class.
    ///
    /// Active entries lose their week scoping and markers; cancelled ones
    /// are dropped. Promoting an unchanged week again writes nothing.
    pub fn set_weekly_as_global(&self, class_id: &str, date: NaiveDate) -> Result<PromotionResult> {
        self.requirements(class_id)?;
        let week_start = week_start_of(date);

        let _guard = self.lock_class_with_teachers(class_id, || {
            Ok(self
                .store
                .load_weekly_entries(class_id, week_start)?
                .unwrap_or_default()
                .into_iter()
                .filter(|e| e.is_active)
                .map(|e| e.teacher_id)
                .collect::<BTreeSet<TeacherId>>())
        })?;

        let weekly = self
            .store
            .load_weekly_entries(class_id, week_start)?
            .ok_or_else(|| {
                TimetableError::not_found("weekly timetable", format!("{class_id}@{week_start}"))
            })?;

        let mut promoted: Vec<TimetableEntry> = weekly
            .iter()
            .filter(|e| e.is_active)
            .map(TimetableEntry::to_global)
            .collect();
        if promoted.is_empty() {
            return Err(TimetableError::validation(format!(
                "week {week_start} of class '{class_id}' has no active entries to promote"
            )));
        }
        promoted.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.id.cmp(&b.id)));

        let conflicts = self.promotion_conflicts(class_id, &promoted)?;
        if !conflicts.is_empty() {
            warn!(
                class_id,
                week = %week_start,
                conflicts = conflicts.len(),
                "promotion rejected"
            );
            return Ok(PromotionResult {
                success: false,
                entries_promoted: 0,
                conflicts,
            });
        }

        let entries_promoted = promoted.len();
        let mut current = self.store.load_global_entries(class_id)?;
        current.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.id.cmp(&b.id)));
        if current == promoted {
            info!(class_id, week = %week_start, entries_promoted, "week already matches global");
            return Ok(PromotionResult {
                success: true,
                entries_promoted,
                conflicts: Vec::new(),
            });
        }

        self.store.commit(WriteBatch::new().with(WriteOp::ReplaceGlobal {
            class_id: class_id.to_string(),
            entries: promoted,
            archive: self.config.retention == RetentionPolicy::Archive,
        }))?;
        info!(class_id, week = %week_start, entries_promoted, "week promoted to global");

        Ok(PromotionResult {
            success: true,
            entries_promoted,
            conflicts: Vec::new(),
        })
    }

    /// Double bookings the promoted entries would create: against other
    /// classes' Global entries, and against their week layers in every live
    /// week where `class_id` follows its Global layer.
    fn promotion_conflicts(
        &self,
        class_id: &str,
        promoted: &[TimetableEntry],
    ) -> Result<Vec<Conflict>> {
        let wanted: HashSet<(&str, _)> = promoted
            .iter()
            .map(|e| (e.teacher_id.as_str(), e.slot))
            .collect();

        let mut conflicts = Vec::new();
        let mut flag = |entries: &[TimetableEntry], scope: Option<NaiveDate>| {
            for e in entries.iter().filter(|e| e.is_active) {
                if wanted.contains(&(e.teacher_id.as_str(), e.slot)) {
                    conflicts.push(Conflict::double_booked(&e.teacher_id, e, scope));
                }
            }
        };

        let weeks = self.weeks_following_global(class_id)?;
        for other in self.store.list_classes()? {
            if other == class_id {
                continue;
            }
            flag(&self.store.load_global_entries(&other)?, None);
            // Weeks where the other class has no layer resolve to the Global
            // entries just checked.
            for week_start in &weeks {
                if let Some(layer) = self.store.load_weekly_entries(&other, *week_start)? {
                    flag(&layer, Some(*week_start));
                }
            }
        }
        Ok(conflicts)
    }
}
