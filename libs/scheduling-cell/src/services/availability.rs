use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, instrument};

use crate::error::{Result, SchedulingError};
use crate::models::{AvailabilityQuery, AvailabilitySlot, Booking, SchedulingRules};
use crate::services::conflict::intervals_overlap;
use crate::services::store::BookingStore;
use crate::services::timezone::TimezoneConverter;

pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
    converter: Arc<dyn TimezoneConverter>,
    rules: SchedulingRules,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        converter: Arc<dyn TimezoneConverter>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            store,
            converter,
            rules,
        }
    }

    /// Partition the practitioner's working window on `date` into fixed slots.
    ///
    /// Slots are sized to one session plus the mandatory break. A slot is
    /// unavailable as soon as it intersects any active booking; the
    /// back-to-back and break distinctions of the conflict check do not apply
    /// here. Nothing is cached: bookings may change between calls.
    #[instrument(skip(self, query), fields(practitioner_id = %query.practitioner_id, date = %query.date))]
    pub async fn get_availability(&self, query: &AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> {
        self.converter.validate(&query.timezone)?;

        let hours = query.working_hours.unwrap_or(self.rules.working_hours);
        if hours.start >= hours.end {
            return Err(SchedulingError::Validation(format!(
                "Working hours start {} must be before end {}",
                hours.start, hours.end
            )));
        }

        let slot_length = Duration::minutes(self.rules.slot_minutes());
        if slot_length <= Duration::zero() {
            return Err(SchedulingError::Validation(
                "Slot length must be positive".to_string(),
            ));
        }

        let window_start = self.converter.to_utc(query.date, hours.start, &query.timezone)?;
        let window_end = self.converter.to_utc(query.date, hours.end, &query.timezone)?;

        let bookings = self
            .store
            .find_overlapping(query.practitioner_id, window_start, window_end, None)
            .await?;

        let mut slots = Vec::new();
        let mut cursor = window_start;

        while cursor + slot_length <= window_end {
            let slot_end = cursor + slot_length;
            let blocking = first_blocking(&bookings, cursor, slot_end);

            slots.push(AvailabilitySlot {
                start_time: cursor,
                end_time: slot_end,
                available: blocking.is_none(),
                reason: blocking.map(|b| format!("Booked until {}", b.end_time().format("%H:%M UTC"))),
            });

            cursor = slot_end;
        }

        debug!(
            "Generated {} slots ({} available) for {}",
            slots.len(),
            slots.iter().filter(|s| s.available).count(),
            query.date
        );

        Ok(slots)
    }
}

fn first_blocking<'a>(
    bookings: &'a [Booking],
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> Option<&'a Booking> {
    bookings
        .iter()
        .filter(|b| b.is_active())
        .find(|b| intervals_overlap(start, end, b.start_time, b.end_time()))
}
