//! Input validation for timetabling.
//!
//! Checks structural integrity of slots, teachers, and subject requirements
//! before any lock is taken. Detects:
//! - Periods outside `1..=periods_per_day`
//! - Duplicate teacher or subject IDs
//! - Requirements referencing unknown or inactive teachers
//! - Requirements with no periods
//! - Total weekly demand above the week's slot capacity
//!
//! All problems are collected; validation does not stop at the first one.

use crate::models::{Slot, SubjectRequirement, Teacher};
use std::collections::{HashMap, HashSet};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// Period is zero or beyond the last period of the day.
    InvalidSlot,
    /// A requirement references a teacher that doesn't exist.
    InvalidTeacherReference,
    /// A requirement references an inactive teacher.
    InactiveTeacher,
    /// A requirement asks for zero periods.
    EmptyRequirement,
    /// Requirements exceed the number of slots in a week.
    OverCapacity,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates that a slot's period lies within `1..=periods_per_day`.
pub fn validate_slot(slot: Slot, periods_per_day: u8) -> ValidationResult {
    if slot.period == 0 || slot.period > periods_per_day {
        return Err(vec![ValidationError::new(
            ValidationErrorKind::InvalidSlot,
            format!("Period {} is outside 1..={periods_per_day}", slot.period),
        )]);
    }
    Ok(())
}

/// Validates teacher profiles.
///
/// Checks:
/// 1. No duplicate teacher IDs
/// 2. No availability period outside `1..=periods_per_day`
pub fn validate_teachers(teachers: &[Teacher], periods_per_day: u8) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for t in teachers {
        if !ids.insert(t.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate teacher ID: {}", t.id),
            ));
        }
        for slot in t.availability.slots() {
            if validate_slot(slot, periods_per_day).is_err() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidSlot,
                    format!("Teacher '{}' lists unavailable period {slot}", t.id),
                ));
            }
        }
    }

    finish(errors)
}

/// Validates a class's subject requirements against the known teachers.
///
/// Checks:
/// 1. No duplicate subject IDs
/// 2. Every requirement asks for at least one period
/// 3. Every referenced teacher exists and is active
/// 4. Total demand fits in `5 * periods_per_day` slots
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_requirements(
    requirements: &[SubjectRequirement],
    teachers: &[Teacher],
    periods_per_day: u8,
) -> ValidationResult {
    let mut errors = Vec::new();
    let by_id: HashMap<&str, &Teacher> = teachers.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut subjects = HashSet::new();
    let mut demand: u32 = 0;

    for req in requirements {
        if !subjects.insert(req.subject_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate subject ID: {}", req.subject_id),
            ));
        }

        if req.periods_per_week == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyRequirement,
                format!("Subject '{}' requires no periods", req.subject_id),
            ));
        }
        demand = demand.saturating_add(req.periods_per_week);

        for teacher_id in req.candidates() {
            match by_id.get(teacher_id) {
                None => errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidTeacherReference,
                    format!(
                        "Subject '{}' references unknown teacher '{teacher_id}'",
                        req.subject_id
                    ),
                )),
                Some(t) if !t.active => errors.push(ValidationError::new(
                    ValidationErrorKind::InactiveTeacher,
                    format!(
                        "Subject '{}' references inactive teacher '{teacher_id}'",
                        req.subject_id
                    ),
                )),
                Some(_) => {}
            }
        }
    }

    let capacity = 5 * u32::from(periods_per_day);
    if demand > capacity {
        errors.push(ValidationError::new(
            ValidationErrorKind::OverCapacity,
            format!("Requirements total {demand} periods but the week has {capacity} slots"),
        ));
    }

    finish(errors)
}
