// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Timelike};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::error::SchedulingError;
use crate::models::{
    AvailabilityQuery, BookingDecision, ConflictCheckRequest, MutationScope, SchedulingRequest,
    SeriesConfig, SeriesUpdate, WorkingHours,
};
use crate::services::SchedulerService;

// ==============================================================================
// REQUEST BODIES AND QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub date: NaiveDate,
    pub timezone: Option<String>,
    pub start_hour: Option<u32>,
    pub end_hour: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AlternativesRequest {
    #[serde(flatten)]
    pub request: SchedulingRequest,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesUpdateRequest {
    pub scope: MutationScope,
    #[serde(flatten)]
    pub update: SeriesUpdate,
}

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
    pub scope: Option<MutationScope>,
}

/// Translate core failures into the HTTP error envelope.
pub fn to_app_error(error: SchedulingError) -> AppError {
    match error {
        SchedulingError::Validation(msg) => AppError::ValidationError(msg),
        SchedulingError::InvalidTimezone(tz) => AppError::BadRequest(format!("Invalid timezone: {}", tz)),
        SchedulingError::BookingNotFound(id) => AppError::NotFound(format!("Booking {} not found", id)),
        SchedulingError::Conflict { conflicts } => AppError::conflict(
            format!("Booking conflicts with {} existing booking(s)", conflicts.len()),
            json!(conflicts),
        ),
        SchedulingError::Persistence(msg) => AppError::Storage(msg),
    }
}

// ==============================================================================
// CONFLICTS, AVAILABILITY AND SUGGESTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_conflicts(
    State(scheduler): State<Arc<SchedulerService>>,
    Json(request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    let result = scheduler.check_conflicts(&request).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "has_conflict": result.has_conflict,
        "conflicts": result.conflicts,
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(scheduler): State<Arc<SchedulerService>>,
    Path(practitioner_id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Value>, AppError> {
    let working_hours = match (params.start_hour, params.end_hour) {
        (None, None) => None,
        (start, end) => {
            let defaults = scheduler.rules().working_hours;
            let start = start.unwrap_or(defaults.start.hour());
            let end = end.unwrap_or(defaults.end.hour());
            Some(WorkingHours::from_hours(start, end).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid working hours {}-{}", start, end))
            })?)
        }
    };

    let query = AvailabilityQuery {
        practitioner_id,
        date: params.date,
        timezone: params
            .timezone
            .unwrap_or_else(|| scheduler.rules().default_timezone.clone()),
        working_hours,
    };

    let slots = scheduler.get_availability(&query).await.map_err(to_app_error)?;
    let available = slots.iter().filter(|s| s.available).count();

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "date": query.date,
        "timezone": query.timezone,
        "available_count": available,
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn suggest_alternatives(
    State(scheduler): State<Arc<SchedulerService>>,
    Json(body): Json<AlternativesRequest>,
) -> Result<Json<Value>, AppError> {
    let suggestions = scheduler
        .suggest_alternatives(&body.request, body.count)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "suggestions": suggestions,
        "total": suggestions.len(),
    })))
}

// ==============================================================================
// VALIDATION AND BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn validate_scheduling(
    State(scheduler): State<Arc<SchedulerService>>,
    Json(request): Json<SchedulingRequest>,
) -> Result<Json<Value>, AppError> {
    let result = scheduler.validate_scheduling(&request).await.map_err(to_app_error)?;
    Ok(Json(json!(result)))
}

/// Accepted bookings return 201 with their warnings; rejected ones return 409
/// with the full validation verdict (errors, conflicts, suggestions) as details.
#[axum::debug_handler]
pub async fn book(
    State(scheduler): State<Arc<SchedulerService>>,
    Json(request): Json<SchedulingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match scheduler.book(request).await.map_err(to_app_error)? {
        BookingDecision::Booked { booking, warnings } => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "booking": booking,
                "warnings": warnings,
            })),
        )),
        BookingDecision::Rejected(verdict) => Err(AppError::conflict(
            format!("Booking rejected: {}", verdict.errors.join("; ")),
            json!(verdict),
        )),
    }
}

// ==============================================================================
// RECURRING SERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_series(
    State(scheduler): State<Arc<SchedulerService>>,
    Json(config): Json<SeriesConfig>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let result = scheduler
        .create_recurring_series(config)
        .await
        .map_err(to_app_error)?;

    Ok((StatusCode::CREATED, Json(json!(result))))
}

#[axum::debug_handler]
pub async fn update_series(
    State(scheduler): State<Arc<SchedulerService>>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<SeriesUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Updating booking {} with scope {}", booking_id, body.scope);

    let result = scheduler
        .update_series(booking_id, body.scope, body.update)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(result)))
}

#[axum::debug_handler]
pub async fn delete_series(
    State(scheduler): State<Arc<SchedulerService>>,
    Path(booking_id): Path<Uuid>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<Value>, AppError> {
    let scope = params.scope.unwrap_or(MutationScope::Single);
    let result = scheduler
        .delete_series(booking_id, scope)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(result)))
}
