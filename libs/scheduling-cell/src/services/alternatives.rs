use std::sync::Arc;

use chrono::{Duration, Timelike};
use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::error::{Result, SchedulingError};
use crate::models::{
    AlternativeQuery, AlternativeSlot, AvailabilityQuery, AvailabilitySlot, ConflictCheckRequest,
    SchedulingRules,
};
use crate::services::availability::AvailabilityService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::timezone::TimezoneConverter;

/// Local hours that get the "comfortable time of day" bonus: `[10, 16)`.
const PREFERRED_HOURS: std::ops::Range<u32> = 10..16;

/// `100 - 10*day - 5*|hour diff| + 15 (|hour diff| <= 1) + 10 (preferred hours)`,
/// clamped to `[0, 100]`.
pub fn score_slot(day_offset: i64, hour_diff: i64, slot_hour: u32) -> u8 {
    let hour_diff = hour_diff.abs();
    let mut score = 100 - 10 * day_offset - 5 * hour_diff;
    if hour_diff <= 1 {
        score += 15;
    }
    if PREFERRED_HOURS.contains(&slot_hour) {
        score += 10;
    }
    score.clamp(0, 100) as u8
}

pub struct AlternativeRankingService {
    availability: Arc<AvailabilityService>,
    detector: Arc<ConflictDetectionService>,
    converter: Arc<dyn TimezoneConverter>,
    rules: SchedulingRules,
}

impl AlternativeRankingService {
    pub fn new(
        availability: Arc<AvailabilityService>,
        detector: Arc<ConflictDetectionService>,
        converter: Arc<dyn TimezoneConverter>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            availability,
            detector,
            converter,
            rules,
        }
    }

    /// Rank open slots within the search horizon against the desired start.
    ///
    /// Day lookups are read-only and run concurrently. Results are sorted by
    /// descending score, earliest start first on ties, and never exceed `count`.
    /// Every returned slot passes the conflict detector, so break violations
    /// and back-to-back placements next to existing bookings are never offered.
    #[instrument(skip(self, query), fields(practitioner_id = %query.practitioner_id))]
    pub async fn suggest_alternatives(
        &self,
        query: &AlternativeQuery,
        count: usize,
    ) -> Result<Vec<AlternativeSlot>> {
        if count == 0 {
            return Ok(vec![]);
        }
        if query.duration_minutes <= 0 {
            return Err(SchedulingError::Validation(format!(
                "Duration must be positive, got {} minutes",
                query.duration_minutes
            )));
        }

        let desired_local = self.converter.to_local(query.desired_start, &query.timezone)?;
        let desired_hour = i64::from(desired_local.hour());
        let base_date = desired_local.date();
        let horizon = query.horizon_days.unwrap_or(self.rules.search_horizon_days).max(1);

        let lookups = (0..horizon).map(|offset| {
            let day_query = AvailabilityQuery {
                practitioner_id: query.practitioner_id,
                date: base_date + Duration::days(offset),
                timezone: query.timezone.clone(),
                working_hours: None,
            };
            async move {
                let slots = self.availability.get_availability(&day_query).await?;
                Ok::<_, SchedulingError>((offset, slots))
            }
        });
        let days = try_join_all(lookups).await?;

        let duration = Duration::minutes(query.duration_minutes);
        let mut ranked = Vec::new();

        for (offset, slots) in days {
            for start_index in 0..slots.len() {
                let Some(start_time) = fitting_start(&slots, start_index, duration) else {
                    continue;
                };
                if query.not_before.is_some_and(|earliest| start_time < earliest) {
                    continue;
                }

                let slot_hour = self.converter.to_local(start_time, &query.timezone)?.hour();
                let hour_diff = i64::from(slot_hour) - desired_hour;

                ranked.push(AlternativeSlot {
                    start_time,
                    end_time: start_time + duration,
                    timezone: query.timezone.clone(),
                    score: score_slot(offset, hour_diff, slot_hour),
                });
            }
        }

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.start_time.cmp(&b.start_time)));

        let mut accepted = Vec::with_capacity(count);
        for slot in ranked {
            if accepted.len() == count {
                break;
            }
            let check = ConflictCheckRequest {
                practitioner_id: query.practitioner_id,
                start_time: slot.start_time,
                duration_minutes: query.duration_minutes,
                timezone: query.timezone.clone(),
                exclude_booking_id: None,
            };
            if self.detector.check_conflicts(&check).await?.has_conflict {
                debug!("Dropping candidate {} that conflicts with an existing booking", slot.start_time);
                continue;
            }
            accepted.push(slot);
        }

        debug!("Suggesting {} alternative slot(s)", accepted.len());
        Ok(accepted)
    }
}

/// Start of `slots[index]` if it and the contiguous available slots after it
/// cover `duration`.
fn fitting_start(
    slots: &[AvailabilitySlot],
    index: usize,
    duration: Duration,
) -> Option<chrono::DateTime<chrono::Utc>> {
    let first = slots.get(index)?;
    if !first.available {
        return None;
    }

    let needed_end = first.start_time + duration;
    let mut covered_until = first.end_time;
    let mut next = index + 1;

    while covered_until < needed_end {
        let slot = slots.get(next)?;
        if !slot.available || slot.start_time != covered_until {
            return None;
        }
        covered_until = slot.end_time;
        next += 1;
    }

    Some(first.start_time)
}
