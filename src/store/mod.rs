//! Storage collaborator.
//!
//! The scheduling core never talks to a database directly. It reads through
//! [`TimetableStore`] and writes by handing the store a [`WriteBatch`],
//! which the store must apply all-or-nothing. That single commit point is
//! what makes refresh (Global + current week) and teacher replacement
//! (many layers) atomic.
//!
//! [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryStore;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{ClassId, Substitution, SubjectRequirement, Teacher, TimetableEntry};

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend failure (connection, query, transaction).
    #[error("Storage backend error: {message}")]
    Backend { message: String, retryable: bool },

    /// Stored data violates an invariant the backend can detect.
    #[error("Corrupt stored data: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>, retryable: bool) -> Self {
        Self::Backend {
            message: message.into(),
            retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { retryable: true, .. })
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace every Global entry of a class. With `archive`, the outgoing
    /// entries are kept in the archive instead of dropped.
    ReplaceGlobal {
        class_id: ClassId,
        entries: Vec<TimetableEntry>,
        archive: bool,
    },
    /// Create or overwrite a class's layer for one week.
    WriteWeekly {
        class_id: ClassId,
        week_start: NaiveDate,
        entries: Vec<TimetableEntry>,
    },
    /// Remove a class's layer for one week.
    DeleteWeekly {
        class_id: ClassId,
        week_start: NaiveDate,
    },
    /// Insert or update a substitution request.
    SaveSubstitution(Substitution),
}

/// Writes applied atomically by [`TimetableStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Builder: appends an operation and returns self.
    pub fn with(mut self, op: WriteOp) -> Self {
        self.push(op);
        self
    }

    /// Operations in application order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the batch.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Data access consumed by the scheduling core.
///
/// Reads must return committed state only. `commit` must apply every
/// operation of the batch or none of them.
pub trait TimetableStore: Send + Sync {
    /// Known classes.
    fn list_classes(&self) -> StoreResult<Vec<ClassId>>;

    /// Subject requirements of a class; `None` if the class is unknown.
    fn load_class_subject_requirements(
        &self,
        class_id: &str,
    ) -> StoreResult<Option<Vec<SubjectRequirement>>>;

    /// Global entries of a class.
    fn load_global_entries(&self, class_id: &str) -> StoreResult<Vec<TimetableEntry>>;

    /// Global entries replaced under the archive policy.
    fn load_archived_global_entries(&self, class_id: &str) -> StoreResult<Vec<TimetableEntry>>;

    /// A class's layer for one week; `None` if never materialized.
    fn load_weekly_entries(
        &self,
        class_id: &str,
        week_start: NaiveDate,
    ) -> StoreResult<Option<Vec<TimetableEntry>>>;

    /// Weeks for which a class has a materialized layer, ascending.
    fn list_weekly_weeks(&self, class_id: &str) -> StoreResult<Vec<NaiveDate>>;

    /// One teacher profile.
    fn load_teacher(&self, teacher_id: &str) -> StoreResult<Option<Teacher>>;

    /// All teacher profiles.
    fn list_teachers(&self) -> StoreResult<Vec<Teacher>>;

    /// One substitution request.
    fn load_substitution(&self, id: &str) -> StoreResult<Option<Substitution>>;

    /// Applies a batch atomically.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Availability grid of a teacher.
    fn load_teacher_availability(
        &self,
        teacher_id: &str,
    ) -> StoreResult<Option<crate::models::AvailabilityGrid>> {
        Ok(self.load_teacher(teacher_id)?.map(|t| t.availability))
    }

    /// Replaces a class's Global entries, dropping the old ones.
    fn replace_global_entries(
        &self,
        class_id: &str,
        entries: Vec<TimetableEntry>,
    ) -> StoreResult<()> {
        self.commit(WriteBatch::new().with(WriteOp::ReplaceGlobal {
            class_id: class_id.to_string(),
            entries,
            archive: false,
        }))
    }

    /// Writes a class's layer for one week.
    fn write_weekly_entries(
        &self,
        class_id: &str,
        week_start: NaiveDate,
        entries: Vec<TimetableEntry>,
    ) -> StoreResult<()> {
        self.commit(WriteBatch::new().with(WriteOp::WriteWeekly {
            class_id: class_id.to_string(),
            week_start,
            entries,
        }))
    }

    /// Removes a class's layer for one week.
    fn delete_weekly_entries(&self, class_id: &str, week_start: NaiveDate) -> StoreResult<()> {
        self.commit(WriteBatch::new().with(WriteOp::DeleteWeekly {
            class_id: class_id.to_string(),
            week_start,
        }))
    }
}
