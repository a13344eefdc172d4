//! Timetabling domain models.
//!
//! Provides the data types shared by every scheduling operation: slots and
//! weeks, timetable entries and their layers, teacher availability, subject
//! requirements, substitution requests, and resolved timetable views.
//!
//! # Two Layers
//!
//! | Layer | Scope | Created by | Replaced by |
//! |-------|-------|-----------|-------------|
//! | Global | every week | generator | refresh, promotion, teacher replacement |
//! | Weekly | one week (its Monday) | first edit of that week | refresh of that week |

mod availability;
mod entry;
mod requirement;
mod slot;
mod substitution;
mod timetable;

pub use availability::{AvailabilityGrid, AvailabilityModel, MaxLoad, Teacher};
pub use entry::{
    new_entry_id, ClassId, EntryId, Layer, Modification, SubjectId, TeacherId, TimetableEntry,
};
pub use requirement::SubjectRequirement;
pub use slot::{parse_week_start, week_start_of, Day, Slot};
pub use substitution::{Substitution, SubstitutionStatus};
pub use timetable::{Conflict, ConflictKind, EffectiveTimetable, ResolvedEntry, TimetableSource};
