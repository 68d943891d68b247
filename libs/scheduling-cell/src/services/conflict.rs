use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SchedulingError};
use crate::models::{
    Booking, ConflictCheckRequest, ConflictRecord, ConflictResult, ConflictType, SchedulingRules,
};
use crate::services::store::BookingStore;

/// Two half-open intervals `[start, end)` intersect.
pub fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

/// Distance between the nearest edges of two intervals, `None` when they overlap.
pub fn edge_gap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> Option<Duration> {
    if end1 <= start2 {
        Some(start2 - end1)
    } else if end2 <= start1 {
        Some(start1 - end2)
    } else {
        None
    }
}

pub struct ConflictDetectionService {
    store: Arc<dyn BookingStore>,
    buffer: Duration,
    min_break: Duration,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn BookingStore>, rules: &SchedulingRules) -> Self {
        Self {
            store,
            buffer: Duration::minutes(rules.buffer_minutes),
            min_break: Duration::minutes(rules.min_break_minutes),
        }
    }

    /// Check a candidate interval against the practitioner's active bookings.
    ///
    /// The candidate is widened by the safety buffer on both sides before the
    /// store lookup; every booking found is then classified against the
    /// unwidened candidate.
    #[instrument(skip(self, request), fields(practitioner_id = %request.practitioner_id))]
    pub async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<ConflictResult> {
        if request.duration_minutes <= 0 {
            return Err(SchedulingError::Validation(format!(
                "Duration must be positive, got {} minutes",
                request.duration_minutes
            )));
        }

        let start = request.start_time;
        let end = request.end_time();

        debug!("Checking conflicts from {} to {}", start, end);

        let candidates = self
            .store
            .find_overlapping(
                request.practitioner_id,
                start - self.buffer,
                end + self.buffer,
                request.exclude_booking_id,
            )
            .await?;

        let conflicts: Vec<ConflictRecord> = candidates
            .iter()
            .filter(|booking| booking.is_active())
            .filter_map(|booking| self.conflict_with(start, end, booking))
            .collect();

        if !conflicts.is_empty() {
            warn!(
                "Conflict detected for practitioner {} - {} conflicting booking(s)",
                request.practitioner_id,
                conflicts.len()
            );
        }

        Ok(ConflictResult::from_conflicts(conflicts))
    }

    /// Classify the relation between a candidate and one existing booking.
    pub fn classify(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        existing_start: DateTime<Utc>,
        existing_end: DateTime<Utc>,
    ) -> Option<ConflictType> {
        match edge_gap(start, end, existing_start, existing_end) {
            None => Some(ConflictType::Overlap),
            Some(gap) if gap == Duration::zero() => Some(ConflictType::BackToBack),
            Some(gap) if gap < self.min_break => Some(ConflictType::BreakViolation),
            Some(_) => None,
        }
    }

    fn conflict_with(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        booking: &Booking,
    ) -> Option<ConflictRecord> {
        self.classify(start, end, booking.start_time, booking.end_time())
            .map(|conflict_type| ConflictRecord {
                booking_id: booking.id,
                start_time: booking.start_time,
                end_time: booking.end_time(),
                conflict_type,
            })
    }
}
