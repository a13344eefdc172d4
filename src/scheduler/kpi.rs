//! Timetable quality metrics (KPIs).
//!
//! Computes indicators from a class's timetable and its requirements.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Coverage Rate | placed periods / required periods (capped per subject) |
//! | Missing Periods | sum of max(0, required - placed) |
//! | Teacher Load | active periods per teacher |
//! | Repeated Days | (subject, day) pairs with more than one period |
//! | Cancelled Periods | inactive entries |

use std::collections::HashMap;

use crate::models::{Day, SubjectRequirement, TimetableEntry};

/// Timetable performance indicators.
#[derive(Debug, Clone)]
pub struct TimetableKpi {
    /// Fraction of required periods placed (0.0..1.0).
    pub coverage_rate: f64,
    /// Required periods with no entry.
    pub missing_periods: u32,
    /// Active periods per teacher.
    pub load_by_teacher: HashMap<String, u32>,
    /// Number of (subject, day) pairs holding more than one period.
    pub repeated_subject_days: usize,
    /// Inactive (cancelled) entries.
    pub cancelled_periods: usize,
}

impl TimetableKpi {
    /// Computes KPIs from entries and the requirements they should meet.
    pub fn calculate(entries: &[TimetableEntry], requirements: &[SubjectRequirement]) -> Self {
        let active: Vec<&TimetableEntry> = entries.iter().filter(|e| e.is_active).collect();

        let mut per_subject: HashMap<&str, u32> = HashMap::new();
        let mut per_subject_day: HashMap<(&str, Day), u32> = HashMap::new();
        let mut load_by_teacher: HashMap<String, u32> = HashMap::new();
        for e in &active {
            *per_subject.entry(e.subject_id.as_str()).or_insert(0) += 1;
            *per_subject_day
                .entry((e.subject_id.as_str(), e.slot.day))
                .or_insert(0) += 1;
            *load_by_teacher.entry(e.teacher_id.clone()).or_insert(0) += 1;
        }

        let mut required: u32 = 0;
        let mut covered: u32 = 0;
        for req in requirements {
            let placed = per_subject
                .get(req.subject_id.as_str())
                .copied()
                .unwrap_or(0);
            required += req.periods_per_week;
            covered += placed.min(req.periods_per_week);
        }

        let coverage_rate = if required == 0 {
            1.0
        } else {
            covered as f64 / required as f64
        };

        Self {
            coverage_rate,
            missing_periods: required - covered,
            load_by_teacher,
            repeated_subject_days: per_subject_day.values().filter(|n| **n > 1).count(),
            cancelled_periods: entries.len() - active.len(),
        }
    }

    /// Whether every requirement is fully covered.
    pub fn is_fully_covered(&self) -> bool {
        self.missing_periods == 0
    }

    /// Whether the timetable meets the given quality thresholds.
    pub fn meets_thresholds(&self, min_coverage: f64, max_repeated_days: usize) -> bool {
        self.coverage_rate >= min_coverage && self.repeated_subject_days <= max_repeated_days
    }
}
