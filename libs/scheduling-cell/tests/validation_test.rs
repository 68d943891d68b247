mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use scheduling_cell::error::SchedulingError;
use scheduling_cell::models::{BookingDecision, ConflictType, MutationScope, SchedulingRules};
use scheduling_cell::services::{InMemoryPreferenceStore, SchedulerService};

use common::{assert_no_active_overlap, at, booking, now, on, request, scheduler_with, MockStore};

#[tokio::test]
async fn clean_request_is_valid_without_findings() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![booking(practitioner, at(9, 0), 50)]).await;

    let result = ctx
        .scheduler
        .validate_scheduling_at(&request(practitioner, at(11, 0), 50), now())
        .await
        .unwrap();

    assert!(result.valid);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    assert!(result.conflicts.is_empty());
    assert!(result.suggestions.is_empty());
}

#[tokio::test]
async fn conflicts_block_and_bring_suggestions() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![booking(practitioner, at(10, 0), 50)]).await;

    let result = ctx
        .scheduler
        .validate_scheduling_at(&request(practitioner, at(10, 30), 50), now())
        .await
        .unwrap();

    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("overlap"));
    assert_eq!(result.conflicts[0].conflict_type, ConflictType::Overlap);

    let max = SchedulingRules::default().max_suggestions;
    assert!(!result.suggestions.is_empty());
    assert!(result.suggestions.len() <= max);
    assert!(result.suggestions.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn structural_errors_are_itemized() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;

    let past = ctx
        .scheduler
        .validate_scheduling_at(&request(practitioner, on(2030, 2, 1, 10, 0), 50), now())
        .await
        .unwrap();
    assert!(!past.valid);
    assert!(past.errors.iter().any(|e| e.contains("past")));
    assert!(past.suggestions.iter().all(|s| s.start_time >= now()));

    for minutes in [0, 29, 181] {
        let result = ctx
            .scheduler
            .validate_scheduling_at(&request(practitioner, at(11, 0), minutes), now())
            .await
            .unwrap();
        assert!(!result.valid, "{} minutes should be rejected", minutes);
        assert!(result.errors.iter().any(|e| e.contains("Duration")));
    }

    let mut bad_zone = request(practitioner, at(11, 0), 50);
    bad_zone.timezone = "Atlantis/Capital".to_string();
    let result = ctx.scheduler.validate_scheduling_at(&bad_zone, now()).await.unwrap();
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["Invalid timezone: Atlantis/Capital".to_string()]);
    assert!(result.suggestions.is_empty());
}

#[tokio::test]
async fn advisory_findings_are_warnings_only() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;

    // Saturday evening.
    let weekend = ctx
        .scheduler
        .validate_scheduling_at(&request(practitioner, on(2030, 5, 11, 19, 0), 50), now())
        .await
        .unwrap();
    assert!(weekend.valid);
    assert_eq!(weekend.warnings.len(), 2);
    assert!(weekend.warnings.iter().any(|w| w.contains("weekend")));
    assert!(weekend.warnings.iter().any(|w| w.contains("business hours")));

    let far = ctx
        .scheduler
        .validate_scheduling_at(&request(practitioner, on(2031, 1, 6, 11, 0), 50), now())
        .await
        .unwrap();
    assert!(far.valid);
    assert!(far.warnings.iter().any(|w| w.contains("months in advance")));
}

#[tokio::test]
async fn counterpart_local_hours_are_reconciled() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;

    let req = request(practitioner, at(14, 0), 50);
    ctx.preferences.set_timezone(req.counterpart_id, "Asia/Tokyo").await;

    // 23:00 in Tokyo, nine hours apart from UTC.
    let result = ctx.scheduler.validate_scheduling_at(&req, now()).await.unwrap();
    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.contains("counterpart") && e.contains("Asia/Tokyo")));
    assert!(result.warnings.iter().any(|w| w.contains("timezone difference")));

    let check = ctx
        .scheduler
        .reconcile_timezones(practitioner, req.counterpart_id, at(2, 0))
        .await
        .unwrap();
    assert!(!check.is_valid);
    assert_eq!(check.counterpart_local_hour, 11);
    assert_eq!(check.practitioner_local_hour, 2);
}

#[tokio::test]
async fn unknown_preferences_fall_back_to_default_zone() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;
    ctx.preferences.set_timezone(practitioner, "Not/AZone").await;

    let check = ctx
        .scheduler
        .reconcile_timezones(practitioner, Uuid::new_v4(), at(11, 0))
        .await
        .unwrap();

    assert!(check.is_valid);
    assert_eq!(check.practitioner_timezone, "UTC");
}

#[tokio::test]
async fn booking_persists_only_valid_requests() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;

    let mut weekend = request(practitioner, on(2030, 5, 11, 11, 0), 50);
    weekend.notes = Some("intake".to_string());
    let decision = ctx.scheduler.book_at(weekend, now()).await.unwrap();
    let booked = assert_matches!(decision, BookingDecision::Booked { booking, warnings } => {
        assert_eq!(warnings, vec!["Scheduled on a weekend".to_string()]);
        booking
    });
    assert_eq!(booked.notes.as_deref(), Some("intake"));
    assert_eq!(ctx.store.all().await, vec![booked.clone()]);

    let clash = ctx
        .scheduler
        .book_at(request(practitioner, on(2030, 5, 11, 11, 55), 50), now())
        .await
        .unwrap();
    assert_matches!(clash, BookingDecision::Rejected(verdict) => {
        assert!(!verdict.valid);
        assert_eq!(verdict.conflicts[0].booking_id, booked.id);
        assert_eq!(verdict.conflicts[0].conflict_type, ConflictType::BreakViolation);
    });
    assert_eq!(ctx.store.all().await.len(), 1);
}

#[tokio::test]
async fn booking_an_occupied_slot_never_creates_a_second_active_booking() {
    let practitioner = Uuid::new_v4();
    let existing = booking(practitioner, at(10, 0), 50);
    let existing_id = existing.id;
    let ctx = scheduler_with(vec![existing]).await;

    for (hour, minute) in [(10, 0), (10, 25), (9, 15), (10, 50), (10, 55)] {
        let decision = ctx
            .scheduler
            .book_at(request(practitioner, at(hour, minute), 50), now())
            .await
            .unwrap();
        assert_matches!(decision, BookingDecision::Rejected(verdict) => {
            assert_eq!(verdict.conflicts[0].booking_id, existing_id);
        });
    }

    assert_eq!(ctx.store.all().await.len(), 1);
    assert_no_active_overlap(&ctx.store).await;
}

#[tokio::test]
async fn cancelled_slot_can_be_booked_again() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![booking(practitioner, at(10, 0), 50)]).await;
    let original = ctx.store.all().await[0].id;
    ctx.scheduler
        .delete_series(original, MutationScope::Single)
        .await
        .unwrap();

    let decision = ctx
        .scheduler
        .book_at(request(practitioner, at(10, 0), 50), now())
        .await
        .unwrap();
    assert_matches!(decision, BookingDecision::Booked { .. });
    assert_no_active_overlap(&ctx.store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_slot_cannot_both_succeed() {
    let practitioner = Uuid::new_v4();
    let ctx = scheduler_with(vec![]).await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&ctx.scheduler);
            tokio::spawn(async move {
                scheduler
                    .book_at(request(practitioner, at(11, 0), 50), now())
                    .await
            })
        })
        .collect();

    let mut booked = 0;
    for attempt in attempts {
        if let BookingDecision::Booked { .. } = attempt.await.unwrap().unwrap() {
            booked += 1;
        }
    }

    assert_eq!(booked, 1);
    assert_eq!(ctx.store.all().await.len(), 1);
    assert_no_active_overlap(&ctx.store).await;
}

#[tokio::test]
async fn insert_failures_surface_as_persistence_errors() {
    let mut store = MockStore::new();
    store.expect_find_overlapping().returning(|_, _, _, _| Ok(vec![]));
    store
        .expect_insert()
        .times(1)
        .returning(|_| Err(SchedulingError::Persistence("disk full".to_string())));

    let scheduler = SchedulerService::new(
        Arc::new(store),
        Arc::new(InMemoryPreferenceStore::new()),
        SchedulingRules::default(),
    );

    let result = scheduler
        .book_at(request(Uuid::new_v4(), at(11, 0), 50), now())
        .await;
    assert_matches!(result, Err(SchedulingError::Persistence(msg)) if msg == "disk full");
}
