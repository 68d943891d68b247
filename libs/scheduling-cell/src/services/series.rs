// libs/scheduling-cell/src/services/series.rs
//
// Recurring series creation and scope-limited mutation. Every operation that
// can move or lengthen a booking holds the practitioner lock across its
// conflict checks and writes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{
    Booking, BookingPatch, ConflictCheckRequest, FailedInstance, InstanceOutcome, InstanceStatus,
    MutationScope, SchedulingRules, Series, SeriesConfig, SeriesDeleteResult, SeriesResult,
    SeriesUpdate, SeriesUpdateResult,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lock::PractitionerLocks;
use crate::services::recurrence::RecurrencePlanner;
use crate::services::store::BookingStore;
use crate::services::timezone::TimezoneConverter;

pub struct SeriesService {
    store: Arc<dyn BookingStore>,
    detector: Arc<ConflictDetectionService>,
    converter: Arc<dyn TimezoneConverter>,
    locks: Arc<PractitionerLocks>,
    planner: RecurrencePlanner,
    rules: SchedulingRules,
}

impl SeriesService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        detector: Arc<ConflictDetectionService>,
        converter: Arc<dyn TimezoneConverter>,
        locks: Arc<PractitionerLocks>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            store,
            detector,
            converter,
            locks,
            planner: RecurrencePlanner::new(&rules),
            rules,
        }
    }

    pub async fn create_recurring_series(&self, config: SeriesConfig) -> Result<SeriesResult> {
        self.create_recurring_series_at(config, Utc::now()).await
    }

    /// Expand the rule once, then check and persist each instance in order.
    ///
    /// Instances run sequentially under a single lock acquisition so every
    /// conflict check sees the instances created before it. A conflicting
    /// instance is skipped; the rest of the series still goes ahead.
    #[instrument(skip(self, config, now), fields(practitioner_id = %config.practitioner_id, pattern = %config.rule.pattern))]
    pub async fn create_recurring_series_at(
        &self,
        config: SeriesConfig,
        now: DateTime<Utc>,
    ) -> Result<SeriesResult> {
        self.converter.validate(&config.timezone)?;
        self.validate_duration(config.duration_minutes)?;

        let dates = self.planner.plan(&config.rule)?;
        let series = Series {
            id: Uuid::new_v4(),
            rule: config.rule.clone(),
        };

        let _guard = self.locks.acquire(config.practitioner_id).await;

        let mut instances = Vec::new();
        let (mut created, mut skipped, mut conflicted) = (0, 0, 0);

        for date in dates {
            let start_time = self.converter.to_utc(date, config.start_time, &config.timezone)?;

            if start_time < now {
                debug!("Skipping past series date {}", date);
                skipped += 1;
                instances.push(InstanceOutcome {
                    date,
                    start_time,
                    status: InstanceStatus::InPast,
                    booking_id: None,
                    conflicts: vec![],
                });
                continue;
            }

            let check = self
                .detector
                .check_conflicts(&ConflictCheckRequest {
                    practitioner_id: config.practitioner_id,
                    start_time,
                    duration_minutes: config.duration_minutes,
                    timezone: config.timezone.clone(),
                    exclude_booking_id: None,
                })
                .await?;

            if check.has_conflict {
                warn!("Series {} instance on {} conflicts, skipping", series.id, date);
                skipped += 1;
                conflicted += 1;
                instances.push(InstanceOutcome {
                    date,
                    start_time,
                    status: InstanceStatus::Conflict,
                    booking_id: None,
                    conflicts: check.conflicts,
                });
                continue;
            }

            let mut booking = Booking::new(
                config.practitioner_id,
                config.counterpart_id,
                start_time,
                config.duration_minutes,
                config.timezone.clone(),
            );
            booking.series_id = Some(series.id);
            booking.recurrence_pattern = Some(config.rule.pattern);
            booking.notes = config.notes.clone();

            let booking = self.store.insert(booking).await?;
            created += 1;
            instances.push(InstanceOutcome {
                date,
                start_time,
                status: InstanceStatus::Created,
                booking_id: Some(booking.id),
                conflicts: vec![],
            });
        }

        info!(
            series_id = %series.id,
            created,
            skipped,
            conflicts = conflicted,
            "Recurring series processed"
        );

        Ok(SeriesResult {
            series,
            instances,
            created_sessions: created,
            skipped,
            conflicts: conflicted,
        })
    }

    /// Apply `update` to the booking and, depending on `scope`, its siblings.
    ///
    /// `Single` is all-or-nothing and rejects with the conflicting bookings.
    /// `Future` and `All` are best effort: instances that would conflict are
    /// left untouched and reported in `failed_instances`.
    #[instrument(skip(self, update))]
    pub async fn update_series(
        &self,
        booking_id: Uuid,
        scope: MutationScope,
        update: SeriesUpdate,
    ) -> Result<SeriesUpdateResult> {
        if let Some(duration) = update.duration_minutes {
            self.validate_duration(duration)?;
        }
        if !update.changes_time() && update.notes.is_none() && update.status.is_none() {
            return Err(SchedulingError::Validation("No fields to update".to_string()));
        }

        let practitioner_id = self.load(booking_id).await?.practitioner_id;
        let _guard = self.locks.acquire(practitioner_id).await;
        // Reload under the lock; a concurrent edit may have moved the booking.
        let booking = self.load(booking_id).await?;

        let series_id = match (scope, booking.series_id) {
            (MutationScope::Single, _) | (_, None) => return self.update_single(&booking, &update).await,
            (_, Some(series_id)) => series_id,
        };

        let result = match scope {
            MutationScope::Future => self.update_future(&booking, series_id, &update).await?,
            _ => self.update_all(series_id, &update).await?,
        };

        if result.failed > 0 {
            warn!(
                "Series {} update ({}) partially applied: {} updated, {} failed",
                series_id, scope, result.updated, result.failed
            );
        }

        Ok(result)
    }

    /// Soft-cancel the booking and, depending on `scope`, its siblings.
    #[instrument(skip(self))]
    pub async fn delete_series(
        &self,
        booking_id: Uuid,
        scope: MutationScope,
    ) -> Result<SeriesDeleteResult> {
        let booking = self.load(booking_id).await?;

        let targets: Vec<Booking> = match (scope, booking.series_id) {
            (MutationScope::Single, _) | (_, None) => vec![booking.clone()],
            (MutationScope::Future, Some(series_id)) => self
                .store
                .list_by_series_id(series_id)
                .await?
                .into_iter()
                .filter(|b| b.start_time >= booking.start_time)
                .collect(),
            (MutationScope::All, Some(series_id)) => self.store.list_by_series_id(series_id).await?,
        };

        let mut cancelled = 0;
        for target in targets.iter().filter(|b| b.is_active()) {
            self.store.update_fields(target.id, BookingPatch::cancel()).await?;
            cancelled += 1;
        }

        info!("Cancelled {} booking(s) from {} with scope {}", cancelled, booking_id, scope);
        Ok(SeriesDeleteResult { cancelled })
    }

    async fn update_single(&self, booking: &Booking, update: &SeriesUpdate) -> Result<SeriesUpdateResult> {
        let new_start = update.start_time.unwrap_or(booking.start_time);
        let new_duration = update.duration_minutes.unwrap_or(booking.duration_minutes);
        let moves = new_start != booking.start_time || new_duration != booking.duration_minutes;
        let revives = reactivates(booking, update);

        if moves && !booking.is_active() && !revives {
            return Err(SchedulingError::Validation(
                "A cancelled booking cannot be rescheduled".to_string(),
            ));
        }

        if revives || (moves && booking.is_active()) {
            let check = self
                .detector
                .check_conflicts(&self.recheck(booking, new_start, new_duration))
                .await?;
            if check.has_conflict {
                return Err(SchedulingError::Conflict {
                    conflicts: check.conflicts,
                });
            }
        }

        self.store
            .update_fields(booking.id, patch_for(update, update.start_time))
            .await?;

        Ok(SeriesUpdateResult {
            updated: 1,
            ..SeriesUpdateResult::default()
        })
    }

    async fn update_future(
        &self,
        edited: &Booking,
        series_id: Uuid,
        update: &SeriesUpdate,
    ) -> Result<SeriesUpdateResult> {
        let delta = update
            .start_time
            .map(|start| start - edited.start_time)
            .unwrap_or_else(Duration::zero);

        let mut members: Vec<Booking> = self
            .store
            .list_by_series_id(series_id)
            .await?
            .into_iter()
            .filter(|b| b.is_active() && b.start_time >= edited.start_time)
            .collect();

        // Move the instance furthest along the shift first, so a sibling's old
        // position is already vacated when the next one lands on it.
        members.sort_by_key(|b| b.start_time);
        if delta > Duration::zero() {
            members.reverse();
        }

        let mut result = SeriesUpdateResult::default();
        for member in &members {
            let new_start = member.start_time + delta;
            let new_start_field = (delta != Duration::zero()).then_some(new_start);
            self.apply_checked(member, new_start, new_start_field, update, &mut result)
                .await?;
        }

        Ok(result)
    }

    async fn update_all(&self, series_id: Uuid, update: &SeriesUpdate) -> Result<SeriesUpdateResult> {
        if update.start_time.is_some() {
            return Err(SchedulingError::Validation(
                "Start time changes require single or future scope".to_string(),
            ));
        }

        let members: Vec<Booking> = self
            .store
            .list_by_series_id(series_id)
            .await?
            .into_iter()
            .filter(|b| b.is_active())
            .collect();

        let mut result = SeriesUpdateResult::default();
        for member in &members {
            self.apply_checked(member, member.start_time, None, update, &mut result)
                .await?;
        }

        Ok(result)
    }

    /// Re-check one instance at its new position and write it, or record it as failed.
    async fn apply_checked(
        &self,
        member: &Booking,
        new_start: DateTime<Utc>,
        new_start_field: Option<DateTime<Utc>>,
        update: &SeriesUpdate,
        result: &mut SeriesUpdateResult,
    ) -> Result<()> {
        let new_duration = update.duration_minutes.unwrap_or(member.duration_minutes);
        let needs_check = new_start != member.start_time
            || new_duration > member.duration_minutes
            || reactivates(member, update);

        if needs_check {
            let check = self
                .detector
                .check_conflicts(&self.recheck(member, new_start, new_duration))
                .await?;
            if check.has_conflict {
                debug!("Instance {} would conflict at {}, leaving it unchanged", member.id, new_start);
                result.failed += 1;
                result.failed_instances.push(FailedInstance {
                    booking_id: member.id,
                    start_time: member.start_time,
                    reason: format!("Would conflict with {} booking(s) at {}", check.conflicts.len(), new_start),
                    conflicts: check.conflicts,
                });
                return Ok(());
            }
        }

        self.store
            .update_fields(member.id, patch_for(update, new_start_field))
            .await?;
        result.updated += 1;
        Ok(())
    }

    fn recheck(&self, booking: &Booking, start_time: DateTime<Utc>, duration_minutes: i64) -> ConflictCheckRequest {
        ConflictCheckRequest {
            practitioner_id: booking.practitioner_id,
            start_time,
            duration_minutes,
            timezone: booking.timezone.clone(),
            exclude_booking_id: Some(booking.id),
        }
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.store
            .find_by_id(booking_id)
            .await?
            .ok_or(SchedulingError::BookingNotFound(booking_id))
    }

    fn validate_duration(&self, duration_minutes: i64) -> Result<()> {
        if duration_minutes < self.rules.min_duration_minutes
            || duration_minutes > self.rules.max_duration_minutes
        {
            return Err(SchedulingError::Validation(format!(
                "Duration must be between {} and {} minutes, got {}",
                self.rules.min_duration_minutes, self.rules.max_duration_minutes, duration_minutes
            )));
        }
        Ok(())
    }
}

fn patch_for(update: &SeriesUpdate, start_time: Option<DateTime<Utc>>) -> BookingPatch {
    BookingPatch {
        start_time,
        duration_minutes: update.duration_minutes,
        notes: update.notes.clone(),
        status: update.status,
    }
}

/// A cancelled booking going back to an active status claims its slot again.
fn reactivates(booking: &Booking, update: &SeriesUpdate) -> bool {
    !booking.is_active() && update.status.is_some_and(|status| status.is_active())
}
