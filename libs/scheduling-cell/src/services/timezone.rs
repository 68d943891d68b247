// libs/scheduling-cell/src/services/timezone.rs
use std::sync::Arc;

use chrono::{
    DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::models::{SchedulingRules, TimezoneCheck};
use crate::services::store::PreferenceStore;

/// Narrow timezone seam: the rest of the core only ever asks these questions.
pub trait TimezoneConverter: Send + Sync {
    fn validate(&self, timezone: &str) -> Result<()>;

    /// Local wall-clock time on `date` in `timezone`, as a UTC instant.
    fn to_utc(&self, date: NaiveDate, time: NaiveTime, timezone: &str) -> Result<DateTime<Utc>>;

    fn to_local(&self, instant: DateTime<Utc>, timezone: &str) -> Result<NaiveDateTime>;

    fn utc_offset_minutes(&self, instant: DateTime<Utc>, timezone: &str) -> Result<i64>;
}

/// IANA database backed converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChronoTzConverter;

impl ChronoTzConverter {
    fn parse(timezone: &str) -> Result<Tz> {
        timezone
            .parse::<Tz>()
            .map_err(|_| SchedulingError::InvalidTimezone(timezone.to_string()))
    }
}

impl TimezoneConverter for ChronoTzConverter {
    fn validate(&self, timezone: &str) -> Result<()> {
        Self::parse(timezone).map(|_| ())
    }

    fn to_utc(&self, date: NaiveDate, time: NaiveTime, timezone: &str) -> Result<DateTime<Utc>> {
        let tz = Self::parse(timezone)?;
        let local = date.and_time(time);

        // Ambiguous (fall back) takes the earlier instant; a DST gap resolves forward.
        tz.from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                SchedulingError::Validation(format!(
                    "Local time {} does not exist in {}",
                    local, timezone
                ))
            })
    }

    fn to_local(&self, instant: DateTime<Utc>, timezone: &str) -> Result<NaiveDateTime> {
        let tz = Self::parse(timezone)?;
        Ok(instant.with_timezone(&tz).naive_local())
    }

    fn utc_offset_minutes(&self, instant: DateTime<Utc>, timezone: &str) -> Result<i64> {
        let tz = Self::parse(timezone)?;
        let offset = tz.offset_from_utc_datetime(&instant.naive_utc()).fix();
        Ok(i64::from(offset.local_minus_utc()) / 60)
    }
}

// ==============================================================================
// TIMEZONE RECONCILIATION
// ==============================================================================

pub struct TimezoneService {
    preferences: Arc<dyn PreferenceStore>,
    converter: Arc<dyn TimezoneConverter>,
    rules: SchedulingRules,
}

impl TimezoneService {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        converter: Arc<dyn TimezoneConverter>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            preferences,
            converter,
            rules,
        }
    }

    /// Check the instant against both parties' local-hour windows.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        practitioner_id: Uuid,
        counterpart_id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<TimezoneCheck> {
        let practitioner_tz = self.resolve_timezone(practitioner_id).await?;
        let counterpart_tz = self.resolve_timezone(counterpart_id).await?;

        self.evaluate(&practitioner_tz, &counterpart_tz, instant)
    }

    /// Pure part of the reconciliation, once both zones are known.
    pub fn evaluate(
        &self,
        practitioner_tz: &str,
        counterpart_tz: &str,
        instant: DateTime<Utc>,
    ) -> Result<TimezoneCheck> {
        let practitioner_hour = self.converter.to_local(instant, practitioner_tz)?.hour();
        let counterpart_hour = self.converter.to_local(instant, counterpart_tz)?.hour();

        let mut conflicts = Vec::new();
        let mut warnings = Vec::new();

        for (party, tz, hour) in [
            ("practitioner", practitioner_tz, practitioner_hour),
            ("counterpart", counterpart_tz, counterpart_hour),
        ] {
            if !self.within_local_window(hour) {
                conflicts.push(format!(
                    "Local time for {} is {:02}:00 in {}, outside the allowed {:02}:00-{:02}:00 window",
                    party, hour, tz, self.rules.earliest_local_hour, self.rules.latest_local_hour
                ));
            }
        }

        let gap_minutes = (self.converter.utc_offset_minutes(instant, practitioner_tz)?
            - self.converter.utc_offset_minutes(instant, counterpart_tz)?)
            .abs();
        if gap_minutes > self.rules.timezone_gap_warning_hours * 60 {
            warnings.push(format!(
                "Large timezone difference between {} and {} ({}h{:02}m)",
                practitioner_tz,
                counterpart_tz,
                gap_minutes / 60,
                gap_minutes % 60
            ));
        }

        if !conflicts.is_empty() {
            debug!("Timezone conflicts for {}: {:?}", instant, conflicts);
        }

        Ok(TimezoneCheck {
            is_valid: conflicts.is_empty(),
            practitioner_timezone: practitioner_tz.to_string(),
            counterpart_timezone: counterpart_tz.to_string(),
            practitioner_local_hour: practitioner_hour,
            counterpart_local_hour: counterpart_hour,
            conflicts,
            warnings,
        })
    }

    fn within_local_window(&self, hour: u32) -> bool {
        hour >= self.rules.earliest_local_hour && hour < self.rules.latest_local_hour
    }

    async fn resolve_timezone(&self, party_id: Uuid) -> Result<String> {
        match self.preferences.preferred_timezone(party_id).await? {
            Some(tz) if self.converter.validate(&tz).is_ok() => Ok(tz),
            Some(tz) => {
                warn!(
                    "Party {} has unknown timezone preference '{}', falling back to {}",
                    party_id, tz, self.rules.default_timezone
                );
                Ok(self.rules.default_timezone.clone())
            }
            None => Ok(self.rules.default_timezone.clone()),
        }
    }
}
