use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{NaiveTime, Timelike};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::entity::subscription;
use crate::error::ApiError;
use crate::reconcile;
use crate::report::FREQUENCIES;
use crate::scheduler::JobInfo;

use super::{parse_date, required};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub start_date: Option<String>,
    pub frequency: Option<String>,
    pub report_time: Option<String>,
}

/// Parse an `HH:MM:SS` report time and enforce whole-hour granularity.
/// This is the only place the constraint is checked; everything downstream
/// trusts it.
fn parse_report_time(value: &str) -> Result<NaiveTime, ApiError> {
    let time = NaiveTime::parse_from_str(value, "%H:%M:%S")
        .map_err(|_| ApiError::Validation("invalid report_time: use HH:MM:SS, e.g. 10:00:00".into()))?;
    if time.minute() != 0 || time.second() != 0 {
        return Err(ApiError::Validation(
            "report_time must have zero minutes and seconds, e.g. 10:00:00".into(),
        ));
    }
    Ok(time)
}

pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let start_date = parse_date("start_date", required("start_date", &body.start_date)?)?;
    let frequency = required("frequency", &body.frequency)?;
    if !FREQUENCIES.contains(&frequency) {
        return Err(ApiError::Validation(
            "frequency must be daily, weekly, or monthly".into(),
        ));
    }
    let report_time = parse_report_time(required("report_time", &body.report_time)?)?;

    let existing = subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(account.id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("you are already subscribed".into()));
    }

    subscription::ActiveModel {
        user_id: Set(account.id),
        start_date: Set(start_date),
        frequency: Set(frequency.to_string()),
        report_time: Set(report_time),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    reconcile::resync_jobs(&state.db, &state.scheduler).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "subscribed to reports" })),
    ))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existing = subscription::Entity::find()
        .filter(subscription::Column::UserId.eq(account.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("no active subscription".into()))?;
    existing.delete(&state.db).await?;

    // The job set mirrors the subscription set, so dropping the row prunes
    // its job in the same pass.
    reconcile::resync_jobs(&state.db, &state.scheduler).await?;

    Ok(Json(json!({ "message": "unsubscribed" })))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    Json(state.scheduler.list().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_hour_report_time_is_accepted() {
        let time = parse_report_time("10:00:00").expect("whole hour");
        assert_eq!(time.hour(), 10);
    }

    #[test]
    fn nonzero_minutes_are_rejected() {
        assert!(parse_report_time("10:30:00").is_err());
    }

    #[test]
    fn nonzero_seconds_are_rejected() {
        assert!(parse_report_time("10:00:30").is_err());
    }

    #[test]
    fn unparseable_time_is_rejected() {
        assert!(parse_report_time("10 o'clock").is_err());
    }
}
