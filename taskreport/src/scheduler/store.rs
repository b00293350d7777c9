//! Persistent job store.
//!
//! The `_report_jobs` table is the scheduler's own persisted state, kept in
//! the same database as the domain tables but with no transactional link to
//! them: creating a subscription row and installing its job are two
//! separate writes. Rows are addressed by job id (`subscription_{id}`) and
//! installed with INSERT OR REPLACE, so replacing an existing id never
//! duplicates it.

use chrono::NaiveDateTime;
use sea_orm::{ConnectionTrait, DbErr, ExecResult, FromQueryResult, Statement};

const NEXT_FIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Create the `_report_jobs` table if it does not already exist.
///
/// Called during [`TaskReportBuilder::build()`](crate::TaskReportBuilder::build).
pub async fn create_jobs_table(db: &impl ConnectionTrait) -> Result<ExecResult, DbErr> {
    db.execute_unprepared(
        "CREATE TABLE IF NOT EXISTS _report_jobs (
            job_id TEXT PRIMARY KEY,
            subscription_id INTEGER NOT NULL,
            fire_hour INTEGER NOT NULL,
            next_fire TEXT NOT NULL
        )",
    )
    .await
}

/// Install or replace a job row, idempotently by `job_id`.
pub async fn replace_job(
    db: &impl ConnectionTrait,
    job_id: &str,
    subscription_id: i32,
    fire_hour: u32,
    next_fire: NaiveDateTime,
) -> Result<ExecResult, DbErr> {
    db.execute_raw(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Sqlite,
        "INSERT OR REPLACE INTO _report_jobs (job_id, subscription_id, fire_hour, next_fire)
         VALUES ($1, $2, $3, $4)",
        [
            job_id.into(),
            subscription_id.into(),
            (fire_hour as i32).into(),
            next_fire.format(NEXT_FIRE_FORMAT).to_string().into(),
        ],
    ))
    .await
}

/// Remove a job row. Removing an absent id is a no-op.
pub async fn remove_job(db: &impl ConnectionTrait, job_id: &str) -> Result<ExecResult, DbErr> {
    db.execute_raw(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Sqlite,
        "DELETE FROM _report_jobs WHERE job_id = $1",
        [job_id.into()],
    ))
    .await
}

/// Persist a job's advanced next fire time after a firing.
pub async fn set_next_fire(
    db: &impl ConnectionTrait,
    job_id: &str,
    next_fire: NaiveDateTime,
) -> Result<ExecResult, DbErr> {
    db.execute_raw(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Sqlite,
        "UPDATE _report_jobs SET next_fire = $2 WHERE job_id = $1",
        [
            job_id.into(),
            next_fire.format(NEXT_FIRE_FORMAT).to_string().into(),
        ],
    ))
    .await
}

#[derive(Debug, FromQueryResult)]
struct JobRow {
    job_id: String,
    subscription_id: i32,
    fire_hour: i32,
    next_fire: String,
}

/// A persisted job row, decoded for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedJob {
    pub job_id: String,
    pub subscription_id: i32,
    pub fire_hour: u32,
    /// `None` when the stored text is unreadable; the engine recomputes it.
    pub next_fire: Option<NaiveDateTime>,
}

/// Load every persisted job, ordered by id.
pub async fn load_jobs(db: &impl ConnectionTrait) -> Result<Vec<PersistedJob>, DbErr> {
    let rows = JobRow::find_by_statement(Statement::from_string(
        sea_orm::DatabaseBackend::Sqlite,
        "SELECT job_id, subscription_id, fire_hour, next_fire
         FROM _report_jobs ORDER BY job_id",
    ))
    .all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PersistedJob {
            job_id: row.job_id,
            subscription_id: row.subscription_id,
            fire_hour: row.fire_hour as u32,
            next_fire: NaiveDateTime::parse_from_str(&row.next_fire, NEXT_FIRE_FORMAT).ok(),
        })
        .collect())
}
