// libs/scheduling-cell/src/services/scheduler.rs
//
// Caller-facing surface of the scheduling core. Holds no state of its own
// beyond the injected collaborators; every call reads the store afresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AlternativeSlot, AvailabilityQuery, AvailabilitySlot, BookingDecision, ConflictCheckRequest,
    ConflictResult, MutationScope, SchedulingRequest, SchedulingRules, SeriesConfig,
    SeriesDeleteResult, SeriesResult, SeriesUpdate, SeriesUpdateResult, TimezoneCheck,
    ValidationResult,
};
use crate::services::alternatives::AlternativeRankingService;
use crate::services::availability::AvailabilityService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::lock::PractitionerLocks;
use crate::services::series::SeriesService;
use crate::services::store::{BookingStore, PreferenceStore};
use crate::services::timezone::{ChronoTzConverter, TimezoneConverter, TimezoneService};
use crate::services::validation::SchedulingValidationService;

pub struct SchedulerService {
    detector: Arc<ConflictDetectionService>,
    availability: Arc<AvailabilityService>,
    ranker: Arc<AlternativeRankingService>,
    reconciler: Arc<TimezoneService>,
    validator: SchedulingValidationService,
    series: SeriesService,
    rules: SchedulingRules,
}

impl SchedulerService {
    /// Wire the core against the given collaborators with the IANA converter.
    pub fn new(
        store: Arc<dyn BookingStore>,
        preferences: Arc<dyn PreferenceStore>,
        rules: SchedulingRules,
    ) -> Self {
        Self::with_converter(store, preferences, Arc::new(ChronoTzConverter), rules)
    }

    pub fn with_converter(
        store: Arc<dyn BookingStore>,
        preferences: Arc<dyn PreferenceStore>,
        converter: Arc<dyn TimezoneConverter>,
        rules: SchedulingRules,
    ) -> Self {
        let locks = Arc::new(PractitionerLocks::new());
        let detector = Arc::new(ConflictDetectionService::new(Arc::clone(&store), &rules));
        let availability = Arc::new(AvailabilityService::new(
            Arc::clone(&store),
            Arc::clone(&converter),
            rules.clone(),
        ));
        let ranker = Arc::new(AlternativeRankingService::new(
            Arc::clone(&availability),
            Arc::clone(&detector),
            Arc::clone(&converter),
            rules.clone(),
        ));
        let reconciler = Arc::new(TimezoneService::new(
            preferences,
            Arc::clone(&converter),
            rules.clone(),
        ));
        let validator = SchedulingValidationService::new(
            Arc::clone(&store),
            Arc::clone(&detector),
            Arc::clone(&reconciler),
            Arc::clone(&ranker),
            Arc::clone(&converter),
            Arc::clone(&locks),
            rules.clone(),
        );
        let series = SeriesService::new(
            store,
            Arc::clone(&detector),
            converter,
            locks,
            rules.clone(),
        );

        Self {
            detector,
            availability,
            ranker,
            reconciler,
            validator,
            series,
            rules,
        }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub async fn check_conflicts(&self, request: &ConflictCheckRequest) -> Result<ConflictResult> {
        self.detector.check_conflicts(request).await
    }

    pub async fn get_availability(&self, query: &AvailabilityQuery) -> Result<Vec<AvailabilitySlot>> {
        self.availability.get_availability(query).await
    }

    /// Alternatives to `request`, at most `count` (configured maximum when `None`).
    pub async fn suggest_alternatives(
        &self,
        request: &SchedulingRequest,
        count: Option<usize>,
    ) -> Result<Vec<AlternativeSlot>> {
        let count = count.unwrap_or(self.rules.max_suggestions);
        self.ranker
            .suggest_alternatives(&request.alternative_query(Some(Utc::now())), count)
            .await
    }

    pub async fn reconcile_timezones(
        &self,
        practitioner_id: Uuid,
        counterpart_id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<TimezoneCheck> {
        self.reconciler.reconcile(practitioner_id, counterpart_id, instant).await
    }

    pub async fn validate_scheduling(&self, request: &SchedulingRequest) -> Result<ValidationResult> {
        self.validator.validate_scheduling(request).await
    }

    pub async fn validate_scheduling_at(
        &self,
        request: &SchedulingRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult> {
        self.validator.validate_scheduling_at(request, now).await
    }

    pub async fn book(&self, request: SchedulingRequest) -> Result<BookingDecision> {
        self.validator.book(request).await
    }

    pub async fn book_at(&self, request: SchedulingRequest, now: DateTime<Utc>) -> Result<BookingDecision> {
        self.validator.book_at(request, now).await
    }

    pub async fn create_recurring_series(&self, config: SeriesConfig) -> Result<SeriesResult> {
        self.series.create_recurring_series(config).await
    }

    pub async fn create_recurring_series_at(
        &self,
        config: SeriesConfig,
        now: DateTime<Utc>,
    ) -> Result<SeriesResult> {
        self.series.create_recurring_series_at(config, now).await
    }

    pub async fn update_series(
        &self,
        booking_id: Uuid,
        scope: MutationScope,
        update: SeriesUpdate,
    ) -> Result<SeriesUpdateResult> {
        self.series.update_series(booking_id, scope, update).await
    }

    pub async fn delete_series(&self, booking_id: Uuid, scope: MutationScope) -> Result<SeriesDeleteResult> {
        self.series.delete_series(booking_id, scope).await
    }
}
