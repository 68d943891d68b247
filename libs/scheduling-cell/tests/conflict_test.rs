mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use scheduling_cell::error::SchedulingError;
use scheduling_cell::models::{
    Booking, BookingStatus, ConflictCheckRequest, ConflictType, SchedulingRules,
};
use scheduling_cell::services::{ConflictDetectionService, InMemoryBookingStore};

use common::{at, booking, MockStore};

fn check(practitioner_id: Uuid, start: DateTime<Utc>, minutes: i64) -> ConflictCheckRequest {
    ConflictCheckRequest {
        practitioner_id,
        start_time: start,
        duration_minutes: minutes,
        timezone: "UTC".to_string(),
        exclude_booking_id: None,
    }
}

async fn detector_with(bookings: Vec<Booking>) -> ConflictDetectionService {
    let store = Arc::new(InMemoryBookingStore::with_bookings(bookings).await);
    ConflictDetectionService::new(store, &SchedulingRules::default())
}

#[tokio::test]
async fn classifies_the_reference_scenario() {
    let practitioner = Uuid::new_v4();
    let existing = booking(practitioner, at(10, 0), 50);
    let existing_id = existing.id;
    let detector = detector_with(vec![existing]).await;

    let overlap = detector.check_conflicts(&check(practitioner, at(10, 30), 50)).await.unwrap();
    assert!(overlap.has_conflict);
    assert_eq!(overlap.conflicts.len(), 1);
    assert_eq!(overlap.conflicts[0].booking_id, existing_id);
    assert_eq!(overlap.conflicts[0].conflict_type, ConflictType::Overlap);

    let tight = detector.check_conflicts(&check(practitioner, at(10, 55), 50)).await.unwrap();
    assert!(tight.has_conflict);
    assert_eq!(tight.conflicts[0].conflict_type, ConflictType::BreakViolation);

    let clear = detector.check_conflicts(&check(practitioner, at(11, 10), 50)).await.unwrap();
    assert!(!clear.has_conflict);
    assert!(clear.conflicts.is_empty());
}

#[tokio::test]
async fn touching_edges_are_back_to_back() {
    let practitioner = Uuid::new_v4();
    let detector = detector_with(vec![booking(practitioner, at(10, 0), 50)]).await;

    let after = detector.check_conflicts(&check(practitioner, at(10, 50), 50)).await.unwrap();
    assert_eq!(after.conflicts[0].conflict_type, ConflictType::BackToBack);

    let before = detector.check_conflicts(&check(practitioner, at(9, 10), 50)).await.unwrap();
    assert_eq!(before.conflicts[0].conflict_type, ConflictType::BackToBack);
}

#[tokio::test]
async fn gaps_beyond_the_buffer_never_conflict() {
    let practitioner = Uuid::new_v4();
    let detector = detector_with(vec![booking(practitioner, at(10, 0), 50)]).await;

    for gap in 6..=90 {
        let after = detector
            .check_conflicts(&check(practitioner, at(10, 50) + Duration::minutes(gap), 50))
            .await
            .unwrap();
        assert!(!after.has_conflict, "gap of {} minutes after should be clear", gap);

        let before = detector
            .check_conflicts(&check(practitioner, at(10, 0) - Duration::minutes(gap + 50), 50))
            .await
            .unwrap();
        assert!(!before.has_conflict, "gap of {} minutes before should be clear", gap);
    }
}

#[tokio::test]
async fn small_positive_gaps_are_break_violations() {
    let practitioner = Uuid::new_v4();
    let detector = detector_with(vec![booking(practitioner, at(10, 0), 50)]).await;

    for gap in 1..=5 {
        let result = detector
            .check_conflicts(&check(practitioner, at(10, 50) + Duration::minutes(gap), 30))
            .await
            .unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].conflict_type, ConflictType::BreakViolation);
    }

    // Below the minimum break the classification holds whatever the buffer.
    for gap in 1..10 {
        let start = at(10, 50) + Duration::minutes(gap);
        assert_eq!(
            detector.classify(start, start + Duration::minutes(30), at(10, 0), at(10, 50)),
            Some(ConflictType::BreakViolation)
        );
    }
}

#[tokio::test]
async fn gaps_between_buffer_and_min_break_are_not_reported() {
    let practitioner = Uuid::new_v4();
    let detector = detector_with(vec![booking(practitioner, at(10, 0), 50)]).await;
    let rules = SchedulingRules::default();
    assert_eq!((rules.buffer_minutes, rules.min_break_minutes), (5, 10));

    // The lookup window only widens by the buffer, so a gap of exactly five is
    // the last one classified. Six to nine stay clear even though they are
    // shorter than the minimum break.
    let at_buffer = detector
        .check_conflicts(&check(practitioner, at(10, 55), 50))
        .await
        .unwrap();
    assert_eq!(at_buffer.conflicts[0].conflict_type, ConflictType::BreakViolation);

    for gap in 6..10 {
        let after = detector
            .check_conflicts(&check(practitioner, at(10, 50) + Duration::minutes(gap), 50))
            .await
            .unwrap();
        assert!(after.conflicts.is_empty(), "gap of {} minutes is reported", gap);

        let before = detector
            .check_conflicts(&check(practitioner, at(10, 0) - Duration::minutes(gap + 50), 50))
            .await
            .unwrap();
        assert!(before.conflicts.is_empty(), "gap of {} minutes is reported", gap);
    }
}

#[tokio::test]
async fn cancelled_excluded_and_foreign_bookings_are_ignored() {
    let practitioner = Uuid::new_v4();
    let mut cancelled = booking(practitioner, at(10, 0), 50);
    cancelled.status = BookingStatus::Cancelled;
    let edited = booking(practitioner, at(12, 0), 50);
    let edited_id = edited.id;
    let other = booking(Uuid::new_v4(), at(14, 0), 50);

    let detector = detector_with(vec![cancelled, edited, other]).await;

    let over_cancelled = detector.check_conflicts(&check(practitioner, at(10, 0), 50)).await.unwrap();
    assert!(!over_cancelled.has_conflict);

    let mut moving = check(practitioner, at(12, 15), 50);
    moving.exclude_booking_id = Some(edited_id);
    assert!(!detector.check_conflicts(&moving).await.unwrap().has_conflict);

    let over_other = detector.check_conflicts(&check(practitioner, at(14, 0), 50)).await.unwrap();
    assert!(!over_other.has_conflict);
}

#[tokio::test]
async fn reports_every_conflicting_booking() {
    let practitioner = Uuid::new_v4();
    let detector = detector_with(vec![
        booking(practitioner, at(9, 0), 50),
        booking(practitioner, at(10, 0), 50),
        booking(practitioner, at(11, 0), 50),
    ])
    .await;

    let result = detector.check_conflicts(&check(practitioner, at(9, 30), 120)).await.unwrap();

    let types: Vec<_> = result.conflicts.iter().map(|c| c.conflict_type).collect();
    assert_eq!(
        types,
        vec![ConflictType::Overlap, ConflictType::Overlap, ConflictType::Overlap]
    );
}

#[tokio::test]
async fn rejects_non_positive_duration() {
    let detector = detector_with(vec![]).await;
    let result = detector.check_conflicts(&check(Uuid::new_v4(), at(10, 0), 0)).await;
    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn store_failures_propagate_unmodified() {
    let mut store = MockStore::new();
    store
        .expect_find_overlapping()
        .times(1)
        .returning(|_, _, _, _| Err(SchedulingError::Persistence("connection reset".to_string())));

    let detector = ConflictDetectionService::new(Arc::new(store), &SchedulingRules::default());
    let result = detector.check_conflicts(&check(Uuid::new_v4(), at(10, 0), 50)).await;

    assert_matches!(result, Err(SchedulingError::Persistence(msg)) if msg == "connection reset");
}

#[test]
fn detection_is_read_only() {
    tokio_test::block_on(async {
        let practitioner = Uuid::new_v4();
        let store = Arc::new(InMemoryBookingStore::with_bookings(vec![booking(practitioner, at(10, 0), 50)]).await);
        let detector = ConflictDetectionService::new(store.clone(), &SchedulingRules::default());

        let before = store.all().await;
        detector.check_conflicts(&check(practitioner, at(10, 30), 50)).await.unwrap();
        assert_eq!(store.all().await, before);
    });
}
