#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use mockall::mock;
use uuid::Uuid;

use scheduling_cell::error::Result;
use scheduling_cell::models::{Booking, BookingPatch, SchedulingRequest, SchedulingRules};
use scheduling_cell::services::{
    BookingStore, InMemoryBookingStore, InMemoryPreferenceStore, SchedulerService,
};

mock! {
    pub Store {}

    #[async_trait]
    impl BookingStore for Store {
        async fn find_overlapping(
            &self,
            practitioner_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            exclude_id: Option<Uuid>,
        ) -> Result<Vec<Booking>>;
        async fn insert(&self, booking: Booking) -> Result<Booking>;
        async fn update_fields(&self, id: Uuid, patch: BookingPatch) -> Result<()>;
        async fn list_by_series_id(&self, series_id: Uuid) -> Result<Vec<Booking>>;
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    }
}

/// Monday.
pub const DAY: (i32, u32, u32) = (2030, 5, 6);

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(DAY.0, DAY.1, DAY.2, hour, minute, 0).unwrap()
}

pub fn on(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, minute, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// A fixed "now" a few months before the test day.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 9, 0, 0).unwrap()
}

pub fn booking(practitioner_id: Uuid, start: DateTime<Utc>, minutes: i64) -> Booking {
    Booking::new(practitioner_id, Uuid::new_v4(), start, minutes, "UTC")
}

pub fn request(practitioner_id: Uuid, start: DateTime<Utc>, minutes: i64) -> SchedulingRequest {
    SchedulingRequest {
        practitioner_id,
        counterpart_id: Uuid::new_v4(),
        start_time: start,
        duration_minutes: minutes,
        timezone: "UTC".to_string(),
        notes: None,
    }
}

pub struct TestScheduler {
    pub store: Arc<InMemoryBookingStore>,
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub scheduler: Arc<SchedulerService>,
}

pub async fn scheduler_with(bookings: Vec<Booking>) -> TestScheduler {
    let store = Arc::new(InMemoryBookingStore::with_bookings(bookings).await);
    let preferences = Arc::new(InMemoryPreferenceStore::new());
    let scheduler = Arc::new(SchedulerService::new(
        store.clone(),
        preferences.clone(),
        SchedulingRules::default(),
    ));

    TestScheduler {
        store,
        preferences,
        scheduler,
    }
}

/// Fails if two active bookings of the same practitioner intersect.
pub async fn assert_no_active_overlap(store: &InMemoryBookingStore) {
    let active: Vec<Booking> = store.all().await.into_iter().filter(|b| b.is_active()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            let overlaps = a.practitioner_id == b.practitioner_id
                && a.start_time < b.end_time()
                && b.start_time < a.end_time();
            assert!(!overlaps, "active bookings {} and {} overlap", a.id, b.id);
        }
    }
}
