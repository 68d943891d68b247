// libs/scheduling-cell/src/services/validation.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, Timelike, Utc, Weekday};
use tracing::{info, instrument, warn};

use crate::error::{Result, SchedulingError};
use crate::models::{
    Booking, BookingDecision, SchedulingRequest, SchedulingRules, ValidationResult,
};
use crate::services::alternatives::AlternativeRankingService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::lock::PractitionerLocks;
use crate::services::store::BookingStore;
use crate::services::timezone::{TimezoneConverter, TimezoneService};

pub struct SchedulingValidationService {
    store: Arc<dyn BookingStore>,
    detector: Arc<ConflictDetectionService>,
    reconciler: Arc<TimezoneService>,
    ranker: Arc<AlternativeRankingService>,
    converter: Arc<dyn TimezoneConverter>,
    locks: Arc<PractitionerLocks>,
    rules: SchedulingRules,
}

impl SchedulingValidationService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        detector: Arc<ConflictDetectionService>,
        reconciler: Arc<TimezoneService>,
        ranker: Arc<AlternativeRankingService>,
        converter: Arc<dyn TimezoneConverter>,
        locks: Arc<PractitionerLocks>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            store,
            detector,
            reconciler,
            ranker,
            converter,
            locks,
            rules,
        }
    }

    pub async fn validate_scheduling(&self, request: &SchedulingRequest) -> Result<ValidationResult> {
        self.validate_scheduling_at(request, Utc::now()).await
    }

    /// Run every check against `request` as seen at `now`.
    ///
    /// Order: structural checks, conflict detection, timezone reconciliation,
    /// advisory checks. Blocking findings land in `errors`, advisory ones in
    /// `warnings`. Suggestions are only computed when the request is invalid.
    /// Only store failures come back as `Err`.
    #[instrument(skip(self, request, now), fields(practitioner_id = %request.practitioner_id, start = %request.start_time))]
    pub async fn validate_scheduling_at(
        &self,
        request: &SchedulingRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        // Structural
        if request.start_time < now {
            result.errors.push("Cannot schedule in the past".to_string());
        }
        if let Some(limit) = now.checked_add_months(Months::new(self.rules.max_lead_months)) {
            if request.start_time > limit {
                result.warnings.push(format!(
                    "Booking is more than {} months in advance",
                    self.rules.max_lead_months
                ));
            }
        }

        let duration_ok = request.duration_minutes >= self.rules.min_duration_minutes
            && request.duration_minutes <= self.rules.max_duration_minutes;
        if !duration_ok {
            result.errors.push(format!(
                "Duration must be between {} and {} minutes",
                self.rules.min_duration_minutes, self.rules.max_duration_minutes
            ));
        }

        let timezone_ok = match self.converter.validate(&request.timezone) {
            Ok(()) => true,
            Err(SchedulingError::InvalidTimezone(tz)) => {
                result.errors.push(format!("Invalid timezone: {}", tz));
                false
            }
            Err(e) => return Err(e),
        };

        // Conflicts
        if request.duration_minutes > 0 {
            let check = self.detector.check_conflicts(&request.conflict_check()).await?;
            for conflict in &check.conflicts {
                result.errors.push(format!(
                    "Conflicts with booking {} ({} to {}): {}",
                    conflict.booking_id,
                    conflict.start_time.format("%Y-%m-%d %H:%M UTC"),
                    conflict.end_time.format("%H:%M UTC"),
                    conflict.conflict_type
                ));
            }
            result.conflicts = check.conflicts;
        }

        // Timezones of both parties
        let timezones = self
            .reconciler
            .reconcile(request.practitioner_id, request.counterpart_id, request.start_time)
            .await?;
        result.errors.extend(timezones.conflicts);
        result.warnings.extend(timezones.warnings);

        // Advisory
        if timezone_ok {
            let local = self.converter.to_local(request.start_time, &request.timezone)?;
            let hour = local.hour();
            if hour < self.rules.business_start_hour || hour >= self.rules.business_end_hour {
                result.warnings.push(format!(
                    "Scheduled outside typical business hours ({:02}:00-{:02}:00)",
                    self.rules.business_start_hour, self.rules.business_end_hour
                ));
            }
            if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
                result.warnings.push("Scheduled on a weekend".to_string());
            }
        }

        result.valid = result.errors.is_empty();

        if !result.valid && timezone_ok && request.duration_minutes > 0 {
            let query = request.alternative_query(Some(now));
            result.suggestions = self
                .ranker
                .suggest_alternatives(&query, self.rules.max_suggestions)
                .await?;
        }

        if !result.valid {
            warn!(
                "Scheduling request rejected with {} error(s), {} suggestion(s)",
                result.errors.len(),
                result.suggestions.len()
            );
        }

        Ok(result)
    }

    pub async fn book(&self, request: SchedulingRequest) -> Result<BookingDecision> {
        self.book_at(request, Utc::now()).await
    }

    /// Validate, then re-check and insert while holding the practitioner lock.
    #[instrument(skip(self, request, now), fields(practitioner_id = %request.practitioner_id))]
    pub async fn book_at(&self, request: SchedulingRequest, now: DateTime<Utc>) -> Result<BookingDecision> {
        let _guard = self.locks.acquire(request.practitioner_id).await;

        let verdict = self.validate_scheduling_at(&request, now).await?;
        if !verdict.valid {
            return Ok(BookingDecision::Rejected(verdict));
        }

        let mut booking = Booking::new(
            request.practitioner_id,
            request.counterpart_id,
            request.start_time,
            request.duration_minutes,
            request.timezone,
        );
        booking.notes = request.notes;

        let booking = self.store.insert(booking).await?;
        info!("Booked {} for practitioner {}", booking.id, booking.practitioner_id);

        Ok(BookingDecision::Booked {
            booking,
            warnings: verdict.warnings,
        })
    }
}
