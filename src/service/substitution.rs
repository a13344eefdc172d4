//! Single-date substitution requests.
//!
//! A request names one entry on one date. Confirming it performs a
//! week-scoped reassignment of that entry and records the decision in the
//! same batch; rejecting it only records the decision.

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use super::overrides::AssignmentPlan;
use super::TimetableService;
use crate::coordinator::LockKey;
use crate::error::{Result, TimetableError};
use crate::models::{week_start_of, Day, Substitution, Teacher};
use crate::store::{TimetableStore, WriteBatch, WriteOp};

impl<S: TimetableStore> TimetableService<S> {
    /// Opens a pending substitution request for one entry on `date`.
    pub fn request_substitution(
        &self,
        entry_id: &str,
        date: NaiveDate,
        reason: &str,
    ) -> Result<Substitution> {
        let day = Day::from_weekday(date.weekday())
            .ok_or_else(|| TimetableError::validation(format!("{date} is not a teaching day")))?;
        let week_start = week_start_of(date);
        self.ensure_editable(week_start)?;

        let (class_id, _) = self.locate_entry(entry_id, week_start)?;
        let _guard = self.lock([LockKey::class(&class_id)])?;
        let (class_id, entry) = self.locate_entry(entry_id, week_start)?;

        if !entry.is_active {
            return Err(TimetableError::validation(format!(
                "entry '{entry_id}' is cancelled in week {week_start}"
            )));
        }
        if entry.slot.day != day {
            return Err(TimetableError::validation(format!(
                "entry '{entry_id}' is held on {}, not on {date}",
                entry.slot.day
            )));
        }

        let request = Substitution::pending(
            entry.id.clone(),
            class_id,
            entry.slot,
            date,
            entry.teacher_id.clone(),
            reason,
        );
        self.store
            .commit(WriteBatch::new().with(WriteOp::SaveSubstitution(request.clone())))?;
        info!(
            substitution_id = %request.id,
            entry_id,
            %date,
            teacher_id = %request.original_teacher_id,
            "substitution requested"
        );
        Ok(request)
    }

    /// Teachers who could cover a substitution request without conflict.
    pub fn find_substitute_candidates(&self, substitution_id: &str) -> Result<Vec<Teacher>> {
        let request = self.substitution(substitution_id)?;
        let week_start = week_start_of(request.date);
        let school = self.school_week(Some(week_start))?;

        let mut candidates: Vec<Teacher> = self
            .store
            .list_teachers()?
            .into_iter()
            .filter(|t| t.id != request.original_teacher_id)
            .filter(|t| {
                self.assignment_conflicts(t, &request.class_id, request.slot, Some(week_start), &school)
                    .is_empty()
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates)
    }

    /// Confirms a pending request with `substitute_id`.
    ///
    /// A conflicting substitute fails with [`TimetableError::Conflict`] and
    /// leaves the request pending.
    pub fn confirm_substitution(
        &self,
        substitution_id: &str,
        substitute_id: &str,
    ) -> Result<Substitution> {
        let request = self.substitution(substitution_id)?;
        ensure_pending(&request)?;
        let substitute = self.teacher(substitute_id)?;
        let week_start = week_start_of(request.date);
        self.ensure_editable(week_start)?;

        let _guard = self.lock([
            LockKey::class(&request.class_id),
            LockKey::teacher(substitute_id),
        ])?;
        let mut request = self.substitution(substitution_id)?;
        ensure_pending(&request)?;

        let reason = format!("substitution: {}", request.reason);
        let plan = self.plan_assignment(
            &request.class_id,
            week_start,
            &request.entry_id,
            request.slot,
            &substitute,
            &reason,
        )?;
        let op = match plan {
            AssignmentPlan::Write(op) => op,
            AssignmentPlan::Rejected(conflicts) => {
                warn!(
                    substitution_id,
                    substitute_id,
                    conflicts = conflicts.len(),
                    "substitute rejected"
                );
                return Err(TimetableError::Conflict { conflicts });
            }
        };

        request.confirm(substitute_id);
        self.store.commit(
            WriteBatch::new()
                .with(op)
                .with(WriteOp::SaveSubstitution(request.clone())),
        )?;
        info!(substitution_id, substitute_id, date = %request.date, "substitution confirmed");
        Ok(request)
    }

    /// Rejects a pending request.
    pub fn reject_substitution(
        &self,
        substitution_id: &str,
        reason: Option<String>,
    ) -> Result<Substitution> {
        let request = self.substitution(substitution_id)?;
        ensure_pending(&request)?;

        let _guard = self.lock([LockKey::class(&request.class_id)])?;
        let mut request = self.substitution(substitution_id)?;
        if !request.reject(reason) {
            return Err(terminal(&request));
        }

        self.store
            .commit(WriteBatch::new().with(WriteOp::SaveSubstitution(request.clone())))?;
        info!(substitution_id, "substitution rejected");
        Ok(request)
    }

    fn substitution(&self, id: &str) -> Result<Substitution> {
        self.store
            .load_substitution(id)?
            .ok_or_else(|| TimetableError::not_found("substitution", id))
    }
}

fn ensure_pending(request: &Substitution) -> Result<()> {
    if request.status.is_terminal() {
        return Err(terminal(request));
    }
    Ok(())
}

fn terminal(request: &Substitution) -> TimetableError {
    TimetableError::validation(format!(
        "substitution '{}' is already {:?}",
        request.id, request.status
    ))
}
