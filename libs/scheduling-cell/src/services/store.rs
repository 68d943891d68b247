// libs/scheduling-cell/src/services/store.rs
//
// Collaborator seams. The core never talks to a database directly; it reads and
// writes through these traits so callers can plug in any persistence engine.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{Booking, BookingPatch};

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Active bookings of the practitioner whose interval touches or intersects
    /// the closed range `[start, end]`, ordered by start time.
    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Booking>>;

    async fn insert(&self, booking: Booking) -> Result<Booking>;

    async fn update_fields(&self, id: Uuid, patch: BookingPatch) -> Result<()>;

    /// All bookings of a series, cancelled ones included, ordered by start time.
    async fn list_by_series_id(&self, series_id: Uuid) -> Result<Vec<Booking>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn preferred_timezone(&self, party_id: Uuid) -> Result<Option<String>>;
}

// ==============================================================================
// IN-MEMORY COLLABORATORS
// ==============================================================================

#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_bookings(bookings: Vec<Booking>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.bookings.write().await;
            for booking in bookings {
                guard.insert(booking.id, booking);
            }
        }
        store
    }

    pub async fn all(&self) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        bookings.sort_by_key(|b| b.start_time);
        bookings
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let guard = self.bookings.read().await;
        let mut matches: Vec<Booking> = guard
            .values()
            .filter(|b| b.practitioner_id == practitioner_id)
            .filter(|b| b.is_active())
            .filter(|b| Some(b.id) != exclude_id)
            .filter(|b| b.start_time <= end && b.end_time() >= start)
            .cloned()
            .collect();
        matches.sort_by_key(|b| b.start_time);
        Ok(matches)
    }

    async fn insert(&self, booking: Booking) -> Result<Booking> {
        let mut guard = self.bookings.write().await;
        if guard.contains_key(&booking.id) {
            return Err(SchedulingError::Persistence(format!(
                "Booking {} already exists",
                booking.id
            )));
        }
        debug!("Inserting booking {} at {}", booking.id, booking.start_time);
        guard.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn update_fields(&self, id: Uuid, patch: BookingPatch) -> Result<()> {
        let mut guard = self.bookings.write().await;
        let booking = guard
            .get_mut(&id)
            .ok_or(SchedulingError::BookingNotFound(id))?;
        patch.apply_to(booking);
        Ok(())
    }

    async fn list_by_series_id(&self, series_id: Uuid) -> Result<Vec<Booking>> {
        let guard = self.bookings.read().await;
        let mut members: Vec<Booking> = guard
            .values()
            .filter(|b| b.series_id == Some(series_id))
            .cloned()
            .collect();
        members.sort_by_key(|b| b.start_time);
        Ok(members)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    timezones: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_timezone(&self, party_id: Uuid, timezone: impl Into<String>) {
        self.timezones.write().await.insert(party_id, timezone.into());
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn preferred_timezone(&self, party_id: Uuid) -> Result<Option<String>> {
        Ok(self.timezones.read().await.get(&party_id).cloned())
    }
}
