//! In-memory storage backend.
//!
//! Holds all state behind one `RwLock`. A batch is applied under a single
//! write guard, so readers see either the state before or after it.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use parking_lot::RwLock;

use super::{StoreError, StoreResult, TimetableStore, WriteBatch, WriteOp};
use crate::models::{ClassId, Substitution, SubjectRequirement, Teacher, TimetableEntry};

#[derive(Debug, Default)]
struct State {
    classes: BTreeMap<ClassId, Vec<SubjectRequirement>>,
    teachers: BTreeMap<String, Teacher>,
    global: HashMap<ClassId, Vec<TimetableEntry>>,
    archive: HashMap<ClassId, Vec<TimetableEntry>>,
    weekly: BTreeMap<(ClassId, NaiveDate), Vec<TimetableEntry>>,
    substitutions: HashMap<String, Substitution>,
}

/// In-memory [`TimetableStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class with its subject requirements.
    pub fn with_class(
        self,
        class_id: impl Into<ClassId>,
        requirements: Vec<SubjectRequirement>,
    ) -> Self {
        self.upsert_class(class_id, requirements);
        self
    }

    /// Registers a teacher.
    pub fn with_teacher(self, teacher: Teacher) -> Self {
        self.upsert_teacher(teacher);
        self
    }

    /// Inserts or replaces a class's requirements.
    pub fn upsert_class(&self, class_id: impl Into<ClassId>, requirements: Vec<SubjectRequirement>) {
        self.state.write().classes.insert(class_id.into(), requirements);
    }

    /// Inserts or replaces a teacher profile.
    pub fn upsert_teacher(&self, teacher: Teacher) {
        self.state.write().teachers.insert(teacher.id.clone(), teacher);
    }

    fn check(state: &State, op: &WriteOp) -> StoreResult<()> {
        let class_id = match op {
            WriteOp::ReplaceGlobal { class_id, .. }
            | WriteOp::WriteWeekly { class_id, .. }
            | WriteOp::DeleteWeekly { class_id, .. } => class_id,
            WriteOp::SaveSubstitution(s) => &s.class_id,
        };
        if !state.classes.contains_key(class_id) {
            return Err(StoreError::backend(
                format!("unknown class '{class_id}'"),
                false,
            ));
        }
        if let WriteOp::ReplaceGlobal { entries, .. } | WriteOp::WriteWeekly { entries, .. } = op {
            if let Some(stray) = entries.iter().find(|e| &e.class_id != class_id) {
                return Err(StoreError::Corrupt {
                    message: format!(
                        "entry '{}' belongs to class '{}', not '{class_id}'",
                        stray.id, stray.class_id
                    ),
                });
            }
        }
        Ok(())
    }
}

impl TimetableStore for MemoryStore {
    fn list_classes(&self) -> StoreResult<Vec<ClassId>> {
        Ok(self.state.read().classes.keys().cloned().collect())
    }

    fn load_class_subject_requirements(
        &self,
        class_id: &str,
    ) -> StoreResult<Option<Vec<SubjectRequirement>>> {
        Ok(self.state.read().classes.get(class_id).cloned())
    }

    fn load_global_entries(&self, class_id: &str) -> StoreResult<Vec<TimetableEntry>> {
        Ok(self
            .state
            .read()
            .global
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    fn load_archived_global_entries(&self, class_id: &str) -> StoreResult<Vec<TimetableEntry>> {
        Ok(self
            .state
            .read()
            .archive
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    fn load_weekly_entries(
        &self,
        class_id: &str,
        week_start: NaiveDate,
    ) -> StoreResult<Option<Vec<TimetableEntry>>> {
        Ok(self
            .state
            .read()
            .weekly
            .get(&(class_id.to_string(), week_start))
            .cloned())
    }

    fn list_weekly_weeks(&self, class_id: &str) -> StoreResult<Vec<NaiveDate>> {
        Ok(self
            .state
            .read()
            .weekly
            .keys()
            .filter(|(c, _)| c == class_id)
            .map(|(_, w)| *w)
            .collect())
    }

    fn load_teacher(&self, teacher_id: &str) -> StoreResult<Option<Teacher>> {
        Ok(self.state.read().teachers.get(teacher_id).cloned())
    }

    fn list_teachers(&self) -> StoreResult<Vec<Teacher>> {
        Ok(self.state.read().teachers.values().cloned().collect())
    }

    fn load_substitution(&self, id: &str) -> StoreResult<Option<Substitution>> {
        Ok(self.state.read().substitutions.get(id).cloned())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut state = self.state.write();

        // Validate everything before touching anything.
        for op in batch.ops() {
            Self::check(&state, op)?;
        }

        for op in batch.into_ops() {
            match op {
                WriteOp::ReplaceGlobal {
                    class_id,
                    entries,
                    archive,
                } => {
                    let old = state.global.insert(class_id.clone(), entries);
                    if archive {
                        if let Some(old) = old {
                            state.archive.entry(class_id).or_default().extend(old);
                        }
                    }
                }
                WriteOp::WriteWeekly {
                    class_id,
                    week_start,
                    entries,
                } => {
                    state.weekly.insert((class_id, week_start), entries);
                }
                WriteOp::DeleteWeekly {
                    class_id,
                    week_start,
                } => {
                    state.weekly.remove(&(class_id, week_start));
                }
                WriteOp::SaveSubstitution(s) => {
                    state.substitutions.insert(s.id.clone(), s);
                }
            }
        }
        Ok(())
    }
}
