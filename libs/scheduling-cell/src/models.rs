// libs/scheduling-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub counterpart_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    /// IANA zone used for display and local-hour checks only.
    pub timezone: String,
    pub status: BookingStatus,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        practitioner_id: Uuid,
        counterpart_id: Uuid,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        timezone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            counterpart_id,
            start_time,
            duration_minutes,
            timezone: timezone.into(),
            status: BookingStatus::Scheduled,
            series_id: None,
            recurrence_pattern: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Everything except a cancellation still occupies the practitioner's time.
    pub fn is_active(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Scheduled => write!(f, "scheduled"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Partial field update handed to the store. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub status: Option<BookingStatus>,
}

impl BookingPatch {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }

    pub fn cancel() -> Self {
        Self {
            status: Some(BookingStatus::Cancelled),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, booking: &mut Booking) {
        if let Some(start_time) = self.start_time {
            booking.start_time = start_time;
        }
        if let Some(duration) = self.duration_minutes {
            booking.duration_minutes = duration;
        }
        if let Some(ref notes) = self.notes {
            booking.notes = Some(notes.clone());
        }
        if let Some(status) = self.status {
            booking.status = status;
        }
        booking.updated_at = Utc::now();
    }
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    Overlap,
    BackToBack,
    BreakViolation,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::Overlap => write!(f, "overlap"),
            ConflictType::BackToBack => write!(f, "back-to-back"),
            ConflictType::BreakViolation => write!(f, "break-violation"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictRecord {
    pub booking_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub conflict_type: ConflictType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckRequest {
    pub practitioner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: String,
    pub exclude_booking_id: Option<Uuid>,
}

impl ConflictCheckRequest {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictRecord>,
}

impl ConflictResult {
    pub fn from_conflicts(conflicts: Vec<ConflictRecord>) -> Self {
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        }
    }
}

// ==============================================================================
// AVAILABILITY & SUGGESTION MODELS
// ==============================================================================

/// Local wall-clock window, interpreted in the query's timezone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn from_hours(start_hour: u32, end_hour: u32) -> Option<Self> {
        let start = NaiveTime::from_hms_opt(start_hour, 0, 0)?;
        let end = if end_hour == 24 {
            NaiveTime::from_hms_opt(23, 59, 59)?
        } else {
            NaiveTime::from_hms_opt(end_hour, 0, 0)?
        };
        Some(Self { start, end })
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub timezone: String,
    pub working_hours: Option<WorkingHours>,
}

/// Computed per query; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlternativeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeQuery {
    pub practitioner_id: Uuid,
    pub desired_start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: String,
    pub horizon_days: Option<i64>,
    /// Slots starting before this instant are never suggested.
    pub not_before: Option<DateTime<Utc>>,
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingRequest {
    pub practitioner_id: Uuid,
    pub counterpart_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: String,
    pub notes: Option<String>,
}

impl SchedulingRequest {
    /// A new booking never excludes an existing one; exclusion belongs to the edit paths.
    pub fn conflict_check(&self) -> ConflictCheckRequest {
        ConflictCheckRequest {
            practitioner_id: self.practitioner_id,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            timezone: self.timezone.clone(),
            exclude_booking_id: None,
        }
    }

    pub fn alternative_query(&self, not_before: Option<DateTime<Utc>>) -> AlternativeQuery {
        AlternativeQuery {
            practitioner_id: self.practitioner_id,
            desired_start: self.start_time,
            duration_minutes: self.duration_minutes,
            timezone: self.timezone.clone(),
            horizon_days: None,
            not_before,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Blocking reasons.
    pub errors: Vec<String>,
    /// Advisory only; surfaced to the caller for display.
    pub warnings: Vec<String>,
    pub conflicts: Vec<ConflictRecord>,
    pub suggestions: Vec<AlternativeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingDecision {
    Booked {
        booking: Booking,
        warnings: Vec<String>,
    },
    Rejected(ValidationResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneCheck {
    pub is_valid: bool,
    pub practitioner_timezone: String,
    pub counterpart_timezone: String,
    pub practitioner_local_hour: u32,
    pub counterpart_local_hour: u32,
    pub conflicts: Vec<String>,
    pub warnings: Vec<String>,
}

// ==============================================================================
// RECURRING SERIES MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Weekly,
    Biweekly,
    Monthly,
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Weekly => write!(f, "weekly"),
            RecurrencePattern::Biweekly => write!(f, "biweekly"),
            RecurrencePattern::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesHorizon {
    Occurrences(u32),
    Until(NaiveDate),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesRule {
    pub pattern: RecurrencePattern,
    pub anchor_date: NaiveDate,
    /// Without a horizon the expansion stops at the safety cap.
    pub horizon: Option<SeriesHorizon>,
    #[serde(default)]
    pub exception_dates: BTreeSet<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub id: Uuid,
    #[serde(flatten)]
    pub rule: SeriesRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub practitioner_id: Uuid,
    pub counterpart_id: Uuid,
    pub rule: SeriesRule,
    /// Local start time, applied to every generated date in `timezone`.
    pub start_time: NaiveTime,
    pub timezone: String,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Created,
    Conflict,
    InPast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceOutcome {
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub status: InstanceStatus,
    pub booking_id: Option<Uuid>,
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResult {
    pub series: Series,
    pub instances: Vec<InstanceOutcome>,
    pub created_sessions: usize,
    /// Every instance that was not persisted, whatever the reason.
    pub skipped: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MutationScope {
    Single,
    Future,
    All,
}

impl fmt::Display for MutationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationScope::Single => write!(f, "single"),
            MutationScope::Future => write!(f, "future"),
            MutationScope::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesUpdate {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub status: Option<BookingStatus>,
}

impl SeriesUpdate {
    pub fn changes_time(&self) -> bool {
        self.start_time.is_some() || self.duration_minutes.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedInstance {
    pub booking_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub reason: String,
    pub conflicts: Vec<ConflictRecord>,
}

/// Best-effort outcome: already-applied instances are never rolled back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesUpdateResult {
    pub updated: usize,
    pub failed: usize,
    pub failed_instances: Vec<FailedInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesDeleteResult {
    pub cancelled: usize,
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub buffer_minutes: i64,
    pub min_break_minutes: i64,
    pub session_minutes: i64,
    pub working_hours: WorkingHours,
    pub default_timezone: String,
    pub search_horizon_days: i64,
    pub max_suggestions: usize,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub earliest_local_hour: u32,
    pub latest_local_hour: u32,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub max_lead_months: u32,
    pub timezone_gap_warning_hours: i64,
    pub recurrence_cap_months: u32,
    pub max_series_occurrences: u32,
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            buffer_minutes: config.buffer_minutes,
            min_break_minutes: config.min_break_minutes,
            session_minutes: config.session_minutes,
            working_hours: WorkingHours::from_hours(config.workday_start_hour, config.workday_end_hour)
                .unwrap_or(defaults.working_hours),
            default_timezone: config.default_timezone.clone(),
            search_horizon_days: config.search_horizon_days,
            max_suggestions: config.max_suggestions,
            ..defaults
        }
    }

    /// Grid step for availability: one session plus the mandatory break.
    pub fn slot_minutes(&self) -> i64 {
        self.session_minutes + self.min_break_minutes
    }
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            buffer_minutes: 5,
            min_break_minutes: 10,
            session_minutes: 50,
            working_hours: WorkingHours::default(),
            default_timezone: "UTC".to_string(),
            search_horizon_days: 7,
            max_suggestions: 5,
            min_duration_minutes: 30,
            max_duration_minutes: 180,
            earliest_local_hour: 6,
            latest_local_hour: 22,
            business_start_hour: 8,
            business_end_hour: 18,
            max_lead_months: 6,
            timezone_gap_warning_hours: 8,
            recurrence_cap_months: 12,
            max_series_occurrences: 104,
        }
    }
}
