//! HTTP surface.
//!
//! Date and time fields cross the wire as strings (`YYYY-MM-DD`,
//! `HH:MM:SS`) and are parsed by hand, so malformed input always produces
//! the `{"message": ...}` error shape instead of a framework rejection.

mod subscriptions;
mod tasks;
mod users;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::json;

use crate::app::AppState;
use crate::error::ApiError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/signup", post(users::signup))
        .route("/signin", post(users::signin))
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/tasks/batch-delete", delete(tasks::batch_delete))
        .route("/tasks/undo-delete", post(tasks::undo_delete))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/subscribe", post(subscriptions::subscribe))
        .route("/unsubscribe", delete(subscriptions::unsubscribe))
        .route("/jobs", get(subscriptions::list_jobs))
        .route("/test-email", get(test_email))
        .with_state(state)
}

async fn banner() -> &'static str {
    "taskreport service is running"
}

/// Send a fixed test notification. Unlike scheduled reports, a delivery
/// failure here surfaces as a 500 with detail.
async fn test_email(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .notifier
        .send(
            &state.test_recipient,
            "taskreport test email",
            "This is a test email.",
        )
        .await?;
    Ok(Json(json!({ "message": "test email sent" })))
}

/// Parse a `YYYY-MM-DD` wire date.
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("invalid {field}: use YYYY-MM-DD")))
}

/// A required field, or a 400 naming it.
fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("missing required field '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_and_rejects_the_rest() {
        assert!(parse_date("start_date", "2024-06-10").is_ok());
        assert!(parse_date("start_date", "10-06-2024").is_err());
        assert!(parse_date("start_date", "2024-13-01").is_err());
        assert!(parse_date("start_date", "soon").is_err());
    }

    #[test]
    fn required_rejects_missing_and_empty() {
        assert_eq!(required("title", &Some("x".into())).unwrap(), "x");
        assert!(required("title", &Some(String::new())).is_err());
        assert!(required("title", &None).is_err());
    }
}
