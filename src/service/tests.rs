use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use super::*;
use crate::config::FixedClock;
use crate::models::{
    AvailabilityGrid, ConflictKind, Day, Modification, SubstitutionStatus, TimetableSource,
};
use crate::store::MemoryStore;

const PERIODS: u8 = 6;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Current week in every test: Monday 2025-09-08.
fn week() -> NaiveDate {
    date(2025, 9, 8)
}

fn next_week() -> NaiveDate {
    date(2025, 9, 15)
}

fn teacher(id: &str) -> Teacher {
    Teacher::new(id).with_availability(AvailabilityGrid::full_week(PERIODS))
}

/// C1: math x5 (T1), art x2 (T3). C2: math x3 (T2).
/// T3 teaches at most one period a day, T5 is inactive, T6 is never
/// available on Monday period 1.
fn school() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_class(
                "C1",
                vec![
                    SubjectRequirement::new("math", 5).with_teacher("T1"),
                    SubjectRequirement::new("art", 2).with_teacher("T3"),
                ],
            )
            .with_class(
                "C2",
                vec![SubjectRequirement::new("math", 3).with_teacher("T2")],
            )
            .with_teacher(teacher("T1"))
            .with_teacher(teacher("T2"))
            .with_teacher(teacher("T3").with_max_per_day(1))
            .with_teacher(teacher("T4"))
            .with_teacher(teacher("T5").inactive())
            .with_teacher(Teacher::new("T6").with_availability(
                AvailabilityGrid::full_week(PERIODS).without(Slot::new(Day::Monday, 1)),
            )),
    )
}

fn service_with(store: Arc<MemoryStore>, timeout: Duration) -> TimetableService<MemoryStore> {
    let config = SchedulerConfig::new()
        .with_periods_per_day(PERIODS)
        .with_lock_timeout(timeout);
    TimetableService::new(store, config)
        .unwrap()
        .with_clock(Arc::new(FixedClock(week())))
}

fn service(store: Arc<MemoryStore>) -> TimetableService<MemoryStore> {
    service_with(store, Duration::from_millis(50))
}

fn global_at(svc: &TimetableService<MemoryStore>, class_id: &str, slot: Slot) -> TimetableEntry {
    svc.get_global_timetable(class_id)
        .unwrap()
        .into_iter()
        .find(|e| e.slot == slot)
        .unwrap()
}

fn assign(entry: &TimetableEntry, teacher_id: &str, date: NaiveDate) -> ManualAssignRequest {
    ManualAssignRequest {
        timetable_entry_id: entry.id.clone(),
        new_teacher_id: teacher_id.to_string(),
        class_id: entry.class_id.clone(),
        day: entry.slot.day,
        period: entry.slot.period,
        reason: "cover".to_string(),
        date: Some(date),
    }
}

fn assignments(entries: &[TimetableEntry]) -> Vec<(Slot, String, String)> {
    let mut out: Vec<_> = entries
        .iter()
        .map(|e| (e.slot, e.subject_id.clone(), e.teacher_id.clone()))
        .collect();
    out.sort();
    out
}

fn mon1() -> Slot {
    Slot::new(Day::Monday, 1)
}

// ── refresh ───────────────────────────────────────────────────────────────

#[test]
fn test_refresh_creates_global_and_current_week() {
    let svc = service(school());
    let result = svc.refresh_global_timetable("C1").unwrap();

    assert!(result.success);
    assert_eq!(result.entries_created, 7);
    assert_eq!(result.global_deleted, 0);
    assert_eq!(result.weekly_deleted, 0);
    assert_eq!(result.week_start, week());
    assert!(result.unsatisfied_requirements.is_empty());

    let global = svc.get_global_timetable("C1").unwrap();
    let math: Vec<&TimetableEntry> = global.iter().filter(|e| e.subject_id == "math").collect();
    assert_eq!(math.len(), 5);
    let slots: std::collections::HashSet<Slot> = math.iter().map(|e| e.slot).collect();
    assert_eq!(slots.len(), 5);

    let current = svc.get_enhanced_timetable("C1", None).unwrap();
    assert_eq!(current.source, TimetableSource::Weekly);
    assert_eq!(current.modification_count, 0);
    assert_eq!(current.len(), 7);

    let json = serde_json::to_value(&current).unwrap();
    assert_eq!(json["source"], "weekly");
    assert_eq!(json["modificationCount"], 0);
}

#[test]
fn test_refresh_is_idempotent() {
    let svc = service(school());
    svc.refresh_global_timetable("C2").unwrap();
    svc.refresh_global_timetable("C1").unwrap();
    let first = svc.get_global_timetable("C1").unwrap();

    let again = svc.refresh_global_timetable("C1").unwrap();
    let second = svc.get_global_timetable("C1").unwrap();

    assert_eq!(assignments(&first), assignments(&second));
    assert_eq!(again.global_deleted, 7);
    assert_eq!(again.weekly_deleted, 7);
    // Archive retention keeps the replaced baseline
    assert_eq!(svc.store().load_archived_global_entries("C1").unwrap().len(), 7);
}

#[test]
fn test_refresh_avoids_other_classes_teachers() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.store().upsert_class(
        "C3",
        vec![SubjectRequirement::new("math", 2).with_teacher("T1")],
    );
    svc.refresh_global_timetable("C3").unwrap();

    let c1: Vec<Slot> = svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .filter(|e| e.teacher_id == "T1")
        .map(|e| e.slot)
        .collect();
    for e in svc.get_global_timetable("C3").unwrap() {
        assert!(!c1.contains(&e.slot), "T1 double-booked at {}", e.slot);
    }
}

#[test]
fn test_refresh_reports_unsatisfied() {
    let store = school();
    store.upsert_class(
        "C3",
        vec![
            SubjectRequirement::new("math", 1).with_teacher("T4"),
            SubjectRequirement::new("music", 2),
        ],
    );
    let svc = service(store);
    let result = svc.refresh_global_timetable("C3").unwrap();

    assert!(result.success);
    assert_eq!(result.entries_created, 1);
    assert_eq!(result.unsatisfied_requirements.len(), 1);
    assert_eq!(result.unsatisfied_requirements[0].subject_id, "music");
}

#[test]
fn test_refresh_rejects_bad_input() {
    let store = school();
    store.upsert_class(
        "C3",
        vec![SubjectRequirement::new("math", 2).with_teacher("T99")],
    );
    let svc = service(store);

    assert!(matches!(
        svc.refresh_global_timetable("C3"),
        Err(TimetableError::Validation { .. })
    ));
    assert!(matches!(
        svc.refresh_global_timetable("nope"),
        Err(TimetableError::Validation { .. })
    ));
    assert!(svc.get_global_timetable("C3").unwrap().is_empty());
}

#[test]
fn test_refresh_leaves_future_weeks() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());
    svc.manual_assign(&assign(&m, "T4", next_week())).unwrap();

    svc.refresh_global_timetable("C1").unwrap();

    let future = svc.get_enhanced_timetable("C1", Some(next_week())).unwrap();
    assert_eq!(future.source, TimetableSource::Weekly);
    assert_eq!(future.modification_count, 1);
    assert_eq!(future.entry_at(mon1()).unwrap().teacher_id, "T4");
}

#[test]
fn test_refresh_leaves_past_weeks() {
    let store = school();
    let svc = service(Arc::clone(&store));
    svc.refresh_global_timetable("C1").unwrap();

    let past = date(2025, 9, 1);
    let mut past_layer: Vec<TimetableEntry> = svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .map(|e| e.derive_weekly(past))
        .collect();
    past_layer[0].is_active = false;
    store.write_weekly_entries("C1", past, past_layer.clone()).unwrap();

    svc.refresh_global_timetable("C1").unwrap();

    assert_eq!(store.load_weekly_entries("C1", past).unwrap(), Some(past_layer));
}

#[test]
fn test_refresh_respects_other_classes_future_weeks() {
    let svc = service(school());
    svc.refresh_global_timetable("C2").unwrap();
    let c2 = global_at(&svc, "C2", mon1());
    assert!(svc.manual_assign(&assign(&c2, "T1", next_week())).unwrap().success);

    let result = svc.refresh_global_timetable("C1").unwrap();
    assert!(result.success);
    assert!(result.unsatisfied_requirements.is_empty());

    // Next week C1 follows its new Global layer, which must leave T1's
    // Monday period 1 to C2
    let t1 = svc.get_teacher_timetable("T1", Some(next_week())).unwrap();
    assert_eq!(t1.entries.iter().filter(|e| e.slot == mon1()).count(), 1);
    assert!(svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .all(|e| !(e.slot == mon1() && e.teacher_id == "T1")));
}

#[test]
fn test_preview_writes_nothing() {
    let svc = service(school());
    let preview = svc.preview_global_timetable("C1").unwrap();
    assert_eq!(preview.entries.len(), 7);
    assert!(svc.get_global_timetable("C1").unwrap().is_empty());
    assert_eq!(
        svc.get_enhanced_timetable("C1", None).unwrap().source,
        TimetableSource::Global
    );
}

// ── manual assignment ────────────────────────────────────────────────────

#[test]
fn test_manual_assign_is_week_scoped() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let global_before = svc.get_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());
    assert_eq!(m.teacher_id, "T1");

    let result = svc.manual_assign(&assign(&m, "T2", week())).unwrap();
    assert!(result.success);
    assert!(result.conflicts.is_empty());

    let current = svc.get_enhanced_timetable("C1", Some(week())).unwrap();
    assert_eq!(current.source, TimetableSource::Weekly);
    assert_eq!(current.modification_count, 1);
    let changed = current.entry_at(mon1()).unwrap();
    assert_eq!(changed.teacher_id, "T2");
    assert_eq!(
        changed.modification(),
        Some(&Modification::Reassigned {
            previous_teacher_id: "T1".into(),
            reason: "cover".into(),
        })
    );

    assert_eq!(svc.get_global_timetable("C1").unwrap(), global_before);
    let future = svc.get_enhanced_timetable("C1", Some(next_week())).unwrap();
    assert_eq!(future.source, TimetableSource::Global);
    assert_eq!(future.entry_at(mon1()).unwrap().teacher_id, "T1");

    let weekly = svc.get_weekly_timetable("C1", Some(week())).unwrap();
    assert!(weekly.has_weekly_overrides);
}

#[test]
fn test_manual_assign_materializes_week() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    assert!(svc
        .store()
        .load_weekly_entries("C1", next_week())
        .unwrap()
        .is_none());

    let m = global_at(&svc, "C1", mon1());
    assert!(svc.manual_assign(&assign(&m, "T4", next_week())).unwrap().success);

    let layer = svc
        .store()
        .load_weekly_entries("C1", next_week())
        .unwrap()
        .unwrap();
    assert_eq!(layer.len(), 7);
    assert!(layer.iter().all(|e| e.week_start() == Some(next_week())));
    assert!(layer.iter().all(|e| e.global_entry_id().is_some()));
}

#[test]
fn test_manual_assign_double_booking_rejected() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();
    assert_eq!(global_at(&svc, "C2", mon1()).teacher_id, "T2");
    let before = svc.get_enhanced_timetable("C1", Some(week())).unwrap();

    let m = global_at(&svc, "C1", mon1());
    let result = svc.manual_assign(&assign(&m, "T2", week())).unwrap();

    assert!(!result.success);
    assert_eq!(result.conflicts.len(), 1);
    let c = &result.conflicts[0];
    assert_eq!(c.kind, ConflictKind::DoubleBooked);
    assert_eq!(c.class_id, "C2");
    assert_eq!(c.slot, mon1());
    assert_eq!(c.week_start, Some(week()));

    assert_eq!(svc.get_enhanced_timetable("C1", Some(week())).unwrap(), before);
}

#[test]
fn test_manual_assign_unavailable_writes_nothing() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    let result = svc.manual_assign(&assign(&m, "T6", next_week())).unwrap();
    assert!(!result.success);
    assert_eq!(result.conflicts[0].kind, ConflictKind::Unavailable);
    assert!(svc
        .store()
        .load_weekly_entries("C1", next_week())
        .unwrap()
        .is_none());

    let inactive = svc.manual_assign(&assign(&m, "T5", next_week())).unwrap();
    assert_eq!(inactive.conflicts[0].kind, ConflictKind::Unavailable);
}

#[test]
fn test_manual_assign_load_exceeded() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    // T3 already teaches art on Monday and may teach once a day
    let m = global_at(&svc, "C1", mon1());

    let result = svc.manual_assign(&assign(&m, "T3", week())).unwrap();
    assert!(!result.success);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].kind, ConflictKind::LoadExceeded);
}

#[test]
fn test_manual_assign_input_errors() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    let past = svc.manual_assign(&assign(&m, "T2", date(2025, 9, 1)));
    assert!(matches!(past, Err(TimetableError::Validation { .. })));

    let mut bad_period = assign(&m, "T2", week());
    bad_period.period = PERIODS + 1;
    assert!(matches!(
        svc.manual_assign(&bad_period),
        Err(TimetableError::Validation { .. })
    ));

    assert!(matches!(
        svc.manual_assign(&assign(&m, "T99", week())),
        Err(TimetableError::Validation { .. })
    ));

    let mut missing = assign(&m, "T2", week());
    missing.timetable_entry_id = "missing".into();
    missing.period = 6;
    assert!(matches!(
        svc.manual_assign(&missing),
        Err(TimetableError::NotFound { .. })
    ));
}

#[test]
fn test_manual_assign_slot_must_match_entry() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    let mut moved = assign(&m, "T2", next_week());
    moved.period = 2;
    assert!(matches!(
        svc.manual_assign(&moved),
        Err(TimetableError::Validation { .. })
    ));
    assert!(svc.store().load_weekly_entries("C1", next_week()).unwrap().is_none());
}

#[test]
fn test_concurrent_assignments_never_double_book() {
    let svc = Arc::new(service_with(school(), Duration::from_secs(2)));
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();
    let requests = [
        assign(&global_at(&svc, "C1", mon1()), "T4", week()),
        assign(&global_at(&svc, "C2", mon1()), "T4", week()),
    ];

    let handles: Vec<_> = requests
        .into_iter()
        .map(|req| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || svc.manual_assign(&req).unwrap().success)
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let t4 = svc.get_teacher_timetable("T4", Some(week())).unwrap();
    assert_eq!(t4.entries.iter().filter(|e| e.slot == mon1()).count(), 1);
}

#[test]
fn test_lock_timeout_is_retryable() {
    let svc = service(school());
    let _held = svc
        .coordinator()
        .acquire([LockKey::class("C1")], Duration::from_millis(10))
        .unwrap();

    let err = svc.refresh_global_timetable("C1").unwrap_err();
    assert!(matches!(err, TimetableError::ConcurrencyTimeout { .. }));
    assert!(err.is_retryable());
    assert!(svc.get_global_timetable("C1").unwrap().is_empty());
}

#[test]
fn test_refresh_and_promotion_lock_teachers() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();

    let held = svc
        .coordinator()
        .acquire([LockKey::teacher("T3")], Duration::from_millis(10))
        .unwrap();
    assert!(matches!(
        svc.refresh_global_timetable("C1"),
        Err(TimetableError::ConcurrencyTimeout { .. })
    ));
    assert!(matches!(
        svc.set_weekly_as_global("C1", week()),
        Err(TimetableError::ConcurrencyTimeout { .. })
    ));

    drop(held);
    assert!(svc.refresh_global_timetable("C1").unwrap().success);
}

// ── cancellation and insertion ───────────────────────────────────────────

#[test]
fn test_cancel_is_week_scoped_and_idempotent() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    let result = svc.delete_timetable_entry(&m.id, Some(next_week())).unwrap();
    assert!(result.success);

    let future = svc.get_enhanced_timetable("C1", Some(next_week())).unwrap();
    assert_eq!(future.source, TimetableSource::Weekly);
    assert_eq!(future.modification_count, 1);
    assert_eq!(future.len(), 7);
    assert!(future.entry_at(mon1()).is_none());

    assert!(global_at(&svc, "C1", mon1()).is_active);
    assert!(svc.delete_timetable_entry(&m.id, Some(next_week())).unwrap().success);
    assert!(matches!(
        svc.delete_timetable_entry("missing", Some(next_week())),
        Err(TimetableError::NotFound { .. })
    ));
}

#[test]
fn test_insert_entry() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let request = InsertEntryRequest {
        class_id: "C1".into(),
        day: Day::Monday,
        period: 3,
        subject_id: "music".into(),
        teacher_id: "T4".into(),
        room: Some("Hall".into()),
        reason: "concert rehearsal".into(),
        date: Some(week()),
    };

    let result = svc.insert_entry(&request).unwrap();
    assert!(result.success);
    let current = svc.get_enhanced_timetable("C1", Some(week())).unwrap();
    let inserted = current.entry_at(Slot::new(Day::Monday, 3)).unwrap();
    assert_eq!(Some(&inserted.id), result.entry_id.as_ref());
    assert_eq!(inserted.subject_id, "music");
    assert_eq!(inserted.global_entry_id(), None);
    assert!(matches!(
        inserted.modification(),
        Some(Modification::Inserted { .. })
    ));

    let occupied = InsertEntryRequest {
        period: 1,
        ..request
    };
    assert!(matches!(
        svc.insert_entry(&occupied),
        Err(TimetableError::Validation { .. })
    ));
}

// ── reads ────────────────────────────────────────────────────────────────

#[test]
fn test_teacher_timetable_and_kpi() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();

    let t1 = svc.get_teacher_timetable("T1", None).unwrap();
    assert_eq!(t1.week_start, week());
    assert_eq!(t1.entries.len(), 5);
    assert!(t1.entries.windows(2).all(|w| w[0].slot <= w[1].slot));

    let kpi = svc.timetable_kpi("C1", None).unwrap();
    assert!(kpi.is_fully_covered());
    assert_eq!(kpi.load_by_teacher["T1"], 5);

    let weekly = svc.get_weekly_timetable("C1", None).unwrap();
    assert!(!weekly.has_weekly_overrides);
    assert_eq!(serde_json::to_value(&weekly).unwrap()["type"], "weekly");
}

// ── promotion ────────────────────────────────────────────────────────────

#[test]
fn test_promotion_updates_future_weeks() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());
    assert!(svc.manual_assign(&assign(&m, "T2", week())).unwrap().success);

    let result = svc.set_weekly_as_global("C1", week()).unwrap();
    assert!(result.success);
    assert_eq!(result.entries_promoted, 7);

    let future = svc.get_enhanced_timetable("C1", Some(next_week())).unwrap();
    assert_eq!(future.source, TimetableSource::Global);
    let promoted = future.entry_at(mon1()).unwrap();
    assert_eq!(promoted.teacher_id, "T2");
    assert_eq!(promoted.id, m.id);
    assert!(promoted.is_global());
    assert!(!promoted.is_modified());

    // Promoting again changes nothing
    let archived = svc.store().load_archived_global_entries("C1").unwrap().len();
    let global = svc.get_global_timetable("C1").unwrap();
    let again = svc.set_weekly_as_global("C1", date(2025, 9, 10)).unwrap();
    assert!(again.success);
    assert_eq!(again.entries_promoted, global.len());
    assert_eq!(svc.get_global_timetable("C1").unwrap(), global);
    assert_eq!(
        svc.store().load_archived_global_entries("C1").unwrap().len(),
        archived
    );
}

#[test]
fn test_promotion_drops_cancelled() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let tue = global_at(&svc, "C1", Slot::new(Day::Tuesday, 1));
    svc.cancel_entry("C1", &tue.id, Some(week()), Some("trip".into()))
        .unwrap();

    let result = svc.set_weekly_as_global("C1", week()).unwrap();
    assert_eq!(result.entries_promoted, 6);
    let global = svc.get_global_timetable("C1").unwrap();
    assert_eq!(global.len(), 6);
    assert!(global.iter().all(|e| e.slot != tue.slot));
}

#[test]
fn test_promotion_requires_week() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    assert!(matches!(
        svc.set_weekly_as_global("C1", next_week()),
        Err(TimetableError::NotFound { .. })
    ));
}

#[test]
fn test_promotion_conflict_with_other_global() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();

    // T2 is free this week only because C2's Monday period 1 is cancelled
    let c2 = global_at(&svc, "C2", mon1());
    svc.cancel_entry("C2", &c2.id, Some(week()), None).unwrap();
    let m = global_at(&svc, "C1", mon1());
    assert!(svc.manual_assign(&assign(&m, "T2", week())).unwrap().success);

    let global = svc.get_global_timetable("C1").unwrap();
    let result = svc.set_weekly_as_global("C1", week()).unwrap();
    assert!(!result.success);
    assert_eq!(result.entries_promoted, 0);
    assert_eq!(result.conflicts[0].kind, ConflictKind::DoubleBooked);
    assert_eq!(result.conflicts[0].class_id, "C2");
    assert_eq!(svc.get_global_timetable("C1").unwrap(), global);
}

#[test]
fn test_promotion_conflict_with_other_week_layer() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();

    // T4 covers C2 next week and C1 this week, both at Monday period 1
    let c2 = global_at(&svc, "C2", mon1());
    assert!(svc.manual_assign(&assign(&c2, "T4", next_week())).unwrap().success);
    let m = global_at(&svc, "C1", mon1());
    assert!(svc.manual_assign(&assign(&m, "T4", week())).unwrap().success);

    let global = svc.get_global_timetable("C1").unwrap();
    let result = svc.set_weekly_as_global("C1", week()).unwrap();
    assert!(!result.success);
    assert_eq!(result.entries_promoted, 0);
    assert_eq!(result.conflicts.len(), 1);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.kind, ConflictKind::DoubleBooked);
    assert_eq!(conflict.class_id, "C2");
    assert_eq!(conflict.teacher_id, "T4");
    assert_eq!(conflict.week_start, Some(next_week()));
    assert_eq!(svc.get_global_timetable("C1").unwrap(), global);

    let t4 = svc.get_teacher_timetable("T4", Some(next_week())).unwrap();
    assert_eq!(t4.entries.iter().filter(|e| e.slot == mon1()).count(), 1);
}

// ── teacher replacement ──────────────────────────────────────────────────

#[test]
fn test_replace_teacher_conflict_is_all_or_nothing() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();
    let c1_before = svc.get_global_timetable("C1").unwrap();

    let result = svc.replace_teacher("T1", "T2", "leave").unwrap();

    assert!(!result.success);
    assert_eq!(result.entries_transferred, 0);
    assert!(result
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::DoubleBooked && c.slot == mon1() && c.class_id == "C2"));
    assert_eq!(svc.get_global_timetable("C1").unwrap(), c1_before);
    assert_eq!(
        svc.get_enhanced_timetable("C1", None)
            .unwrap()
            .entries_for_teacher("T1")
            .count(),
        5
    );
}

#[test]
fn test_replace_teacher_moves_live_layers_only() {
    let store = school();
    let svc = service(Arc::clone(&store));
    svc.refresh_global_timetable("C1").unwrap();

    let past = date(2025, 9, 1);
    let past_layer: Vec<TimetableEntry> = svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .map(|e| e.derive_weekly(past))
        .collect();
    store.write_weekly_entries("C1", past, past_layer).unwrap();

    let result = svc.replace_teacher("T1", "T4", "retirement").unwrap();
    assert!(result.success);
    // Global plus the current week's layer
    assert_eq!(result.entries_transferred, 10);

    assert!(svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .all(|e| e.teacher_id != "T1"));
    assert_eq!(
        svc.get_teacher_timetable("T4", None).unwrap().entries.len(),
        5
    );
    let elapsed = svc.get_enhanced_timetable("C1", Some(past)).unwrap();
    assert_eq!(elapsed.entries_for_teacher("T1").count(), 5);
}

#[test]
fn test_replace_teacher_input_errors() {
    let svc = service(school());
    assert!(matches!(
        svc.replace_teacher("T1", "T1", "x"),
        Err(TimetableError::Validation { .. })
    ));
    assert!(matches!(
        svc.replace_teacher("T1", "T99", "x"),
        Err(TimetableError::Validation { .. })
    ));
}

#[test]
fn test_replace_teacher_respects_load_limits() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();

    // T3 already teaches art on two days and may take one period a day
    let result = svc.replace_teacher("T1", "T3", "leave").unwrap();
    assert!(!result.success);
    assert!(result
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::LoadExceeded && c.teacher_id == "T3"));
    assert!(svc
        .get_global_timetable("C1")
        .unwrap()
        .iter()
        .any(|e| e.teacher_id == "T1"));
}

#[test]
fn test_find_replacement_candidates() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();

    // T2 is busy, T3 would exceed its daily limit, T5 is inactive, T6 is
    // unavailable on Monday period 1
    let ids: Vec<String> = svc
        .find_replacement_candidates("T1")
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["T4".to_string()]);
}

// ── substitution ─────────────────────────────────────────────────────────

#[test]
fn test_substitution_lifecycle() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    let request = svc
        .request_substitution(&m.id, next_week(), "training day")
        .unwrap();
    assert_eq!(request.status, SubstitutionStatus::Pending);
    assert_eq!(request.original_teacher_id, "T1");

    let ids: Vec<String> = svc
        .find_substitute_candidates(&request.id)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["T2".to_string(), "T4".to_string()]);

    let confirmed = svc.confirm_substitution(&request.id, "T4").unwrap();
    assert_eq!(confirmed.status, SubstitutionStatus::Confirmed);
    assert_eq!(confirmed.substitute_teacher_id.as_deref(), Some("T4"));

    let future = svc.get_enhanced_timetable("C1", Some(next_week())).unwrap();
    assert_eq!(future.entry_at(mon1()).unwrap().teacher_id, "T4");
    assert_eq!(global_at(&svc, "C1", mon1()).teacher_id, "T1");

    assert!(matches!(
        svc.confirm_substitution(&request.id, "T2"),
        Err(TimetableError::Validation { .. })
    ));
    assert!(matches!(
        svc.reject_substitution(&request.id, None),
        Err(TimetableError::Validation { .. })
    ));
}

#[test]
fn test_substitution_conflict_stays_pending() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    svc.refresh_global_timetable("C2").unwrap();
    let m = global_at(&svc, "C1", mon1());
    let request = svc.request_substitution(&m.id, week(), "sick").unwrap();

    let err = svc.confirm_substitution(&request.id, "T2").unwrap_err();
    assert!(matches!(err, TimetableError::Conflict { ref conflicts } if !conflicts.is_empty()));
    assert_eq!(
        svc.store()
            .load_substitution(&request.id)
            .unwrap()
            .unwrap()
            .status,
        SubstitutionStatus::Pending
    );

    let rejected = svc
        .reject_substitution(&request.id, Some("no cover".into()))
        .unwrap();
    assert_eq!(rejected.status, SubstitutionStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("no cover"));
}

#[test]
fn test_substitution_date_must_match_entry() {
    let svc = service(school());
    svc.refresh_global_timetable("C1").unwrap();
    let m = global_at(&svc, "C1", mon1());

    for bad in [date(2025, 9, 16), date(2025, 9, 13), date(2025, 9, 1)] {
        assert!(matches!(
            svc.request_substitution(&m.id, bad, "x"),
            Err(TimetableError::Validation { .. })
        ));
    }
    assert!(matches!(
        svc.find_substitute_candidates("missing"),
        Err(TimetableError::NotFound { .. })
    ));
}
