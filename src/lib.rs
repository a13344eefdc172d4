//! School timetabling core for the U-Engine ecosystem.
//!
//! Maintains a recurring Global timetable per class plus per-week
//! overrides, and keeps every teacher free of double bookings across the
//! whole school while administrators reassign, cancel, promote, and
//! substitute.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Slot`, `TimetableEntry`, `Layer`,
//!   `Teacher`, `SubjectRequirement`, `Substitution`, `EffectiveTimetable`
//! - **`scheduler`**: Deterministic greedy generator and timetable KPIs
//! - **`validation`**: Input integrity checks (slots, duplicate IDs, teacher refs)
//! - **`store`**: Storage collaborator trait with atomic batches, in-memory backend
//! - **`coordinator`**: Per-class and per-teacher lock table
//! - **`service`**: The operations callers use (refresh, assign, promote, replace)
//! - **`config`**: `SchedulerConfig` and the `Clock` that defines "this week"
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use u_timetable::config::SchedulerConfig;
//! use u_timetable::models::{AvailabilityGrid, SubjectRequirement, Teacher, TimetableSource};
//! use u_timetable::service::TimetableService;
//! use u_timetable::store::MemoryStore;
//!
//! let store = Arc::new(
//!     MemoryStore::new()
//!         .with_class("C1", vec![SubjectRequirement::new("math", 5).with_teacher("T1")])
//!         .with_teacher(Teacher::new("T1").with_availability(AvailabilityGrid::full_week(6))),
//! );
//! let service = TimetableService::new(store, SchedulerConfig::new().with_periods_per_day(6)).unwrap();
//!
//! let refreshed = service.refresh_global_timetable("C1").unwrap();
//! assert_eq!(refreshed.entries_created, 5);
//!
//! let this_week = service.get_enhanced_timetable("C1", None).unwrap();
//! assert_eq!(this_week.source, TimetableSource::Weekly);
//! ```
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Burke & Petrovic (2002), "Recent research directions in automated timetabling"

pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod validation;

pub use error::{Result, TimetableError};
pub use service::TimetableService;
