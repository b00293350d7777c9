//! Report building: window computation, task fetch, rendering.
//!
//! The reporting window is computed at execution time, not at schedule
//! time, and never reaches back before the subscription began. Building a
//! report only reads tasks and writes nothing, so the same subscription
//! firing twice in quick succession is harmless.

use chrono::{Days, Local, NaiveDate};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use thiserror::Error;

use crate::entity::{subscription, task, user};
use crate::mailer::{Notifier, NotifyError};

/// The frequency values accepted at subscribe time.
pub const FREQUENCIES: [&str; 3] = ["daily", "weekly", "monthly"];

pub const REPORT_SUBJECT: &str = "Your scheduled task report";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("storage error: {0}")]
    Database(#[from] DbErr),

    #[error("subscription {0} refers to a missing user")]
    MissingUser(i32),

    #[error(transparent)]
    Delivery(#[from] NotifyError),
}

/// Compute the inclusive `[window_start, end_date]` reporting window.
///
/// `window_start` is `today` minus 1/7/30 days for daily/weekly/monthly
/// (a fixed 30-day month, deliberately ignoring calendar month lengths),
/// clamped so it never precedes the subscription's own start date. An
/// unrecognized frequency falls back to the subscription start date; the
/// enum check at subscribe time makes that branch unreachable in practice.
pub fn reporting_window(
    frequency: &str,
    subscription_start: NaiveDate,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let window_start = match frequency {
        "daily" => today.checked_sub_days(Days::new(1)),
        "weekly" => today.checked_sub_days(Days::new(7)),
        "monthly" => today.checked_sub_days(Days::new(30)),
        _ => None,
    }
    .unwrap_or(subscription_start);

    (window_start.max(subscription_start), today)
}

/// Fetch one user's tasks whose due date falls inside the window, inclusive
/// on both ends.
pub async fn tasks_in_window(
    db: &DatabaseConnection,
    user_id: i32,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<task::Model>, DbErr> {
    task::Entity::find()
        .filter(task::Column::UserId.eq(user_id))
        .filter(task::Column::DueDate.gte(from))
        .filter(task::Column::DueDate.lte(to))
        .all(db)
        .await
}

/// Render the HTML report body. An empty task list renders an empty list,
/// not an error.
pub fn render_report(
    username: &str,
    from: NaiveDate,
    to: NaiveDate,
    tasks: &[task::Model],
) -> String {
    let items: String = tasks
        .iter()
        .map(|task| {
            format!(
                "<li>{}: {} - Status: {}</li>",
                task.title,
                task.description.as_deref().unwrap_or(""),
                task.status
            )
        })
        .collect();

    format!(
        "<h2>Task report for {username}</h2>\n\
         <p>Here are your tasks (from {from} to {to}):</p>\n\
         <ul>{items}</ul>\n"
    )
}

/// Build and deliver one subscription's report.
pub async fn send_report(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    sub: &subscription::Model,
) -> Result<(), ReportError> {
    let owner = user::Entity::find_by_id(sub.user_id)
        .one(db)
        .await?
        .ok_or(ReportError::MissingUser(sub.id))?;

    let today = Local::now().date_naive();
    let (from, to) = reporting_window(&sub.frequency, sub.start_date, today);
    let tasks = tasks_in_window(db, owner.id, from, to).await?;
    let body = render_report(&owner.username, from, to, &tasks);

    notifier.send(&owner.email, REPORT_SUBJECT, &body).await?;
    log::info!(
        "delivered report for subscription {} to {} ({} tasks, {from} to {to})",
        sub.id,
        owner.email,
        tasks.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_window_is_one_day_back() {
        let window = reporting_window("daily", date(2024, 1, 1), date(2024, 6, 10));
        assert_eq!(window, (date(2024, 6, 9), date(2024, 6, 10)));
    }

    #[test]
    fn window_clamps_to_subscription_start() {
        let window = reporting_window("daily", date(2024, 1, 1), date(2024, 1, 1));
        assert_eq!(window, (date(2024, 1, 1), date(2024, 1, 1)));
    }

    #[test]
    fn weekly_window_is_seven_days_back() {
        let window = reporting_window("weekly", date(2024, 1, 1), date(2024, 6, 10));
        assert_eq!(window, (date(2024, 6, 3), date(2024, 6, 10)));
    }

    #[test]
    fn monthly_window_is_a_fixed_thirty_days() {
        // March has 31 days; the window is still exactly 30 days back.
        let window = reporting_window("monthly", date(2024, 1, 1), date(2024, 3, 31));
        assert_eq!(window, (date(2024, 3, 1), date(2024, 3, 31)));
    }

    #[test]
    fn unknown_frequency_falls_back_to_subscription_start() {
        let window = reporting_window("hourly", date(2024, 5, 1), date(2024, 6, 10));
        assert_eq!(window, (date(2024, 5, 1), date(2024, 6, 10)));
    }

    #[test]
    fn empty_task_list_renders_empty_report() {
        let body = render_report("alice", date(2024, 6, 9), date(2024, 6, 10), &[]);
        assert!(body.contains("<ul></ul>"));
        assert!(body.contains("alice"));
    }

    #[test]
    fn report_lists_title_description_and_status() {
        let task = task::Model {
            id: 1,
            title: "Write docs".into(),
            description: Some("user guide".into()),
            start_date: date(2024, 6, 1),
            due_date: date(2024, 6, 9),
            completion_date: None,
            status: "Pending".into(),
            user_id: 1,
        };
        let body = render_report("alice", date(2024, 6, 9), date(2024, 6, 10), &[task]);
        assert!(body.contains("<li>Write docs: user guide - Status: Pending</li>"));
    }
}
