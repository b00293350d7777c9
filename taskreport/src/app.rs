//! Service assembly.
//!
//! [`TaskReportBuilder`] connects storage, creates the tables, spawns the
//! scheduling engine and hands back a [`TaskReport`] carrying the shared
//! state and the HTTP router.

use std::sync::Arc;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::mailer::Notifier;
use crate::scheduler::{self, SchedulerHandle};
use crate::undo::UndoCache;
use crate::{reconcile, routes, schema};

const DEV_JWT_SECRET: &str = "taskreport-dev-secret";

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub scheduler: SchedulerHandle,
    pub undo: UndoCache,
    pub notifier: Arc<dyn Notifier>,
    pub jwt_secret: Arc<str>,
    pub test_recipient: Arc<str>,
}

/// Builder for the assembled service.
pub struct TaskReportBuilder {
    database_url: String,
    notifier: Arc<dyn Notifier>,
    jwt_secret: String,
    test_recipient: String,
    max_connections: Option<u32>,
}

impl TaskReportBuilder {
    pub fn new(database_url: &str, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            database_url: database_url.to_string(),
            notifier,
            jwt_secret: String::new(),
            test_recipient: String::new(),
            max_connections: None,
        }
    }

    pub fn with_jwt_secret(mut self, secret: &str) -> Self {
        self.jwt_secret = secret.to_string();
        self
    }

    /// Recipient of /test-email notifications.
    pub fn with_test_recipient(mut self, recipient: &str) -> Self {
        self.test_recipient = recipient.to_string();
        self
    }

    /// Cap the connection pool. Tests pass 1 so a `sqlite::memory:` URL
    /// keeps a single live database.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Connect storage, create tables, spawn the scheduling engine.
    pub async fn build(self) -> Result<TaskReport, DbErr> {
        let mut opts = ConnectOptions::new(&self.database_url);
        if let Some(max) = self.max_connections {
            opts.max_connections(max).min_connections(1);
        }
        let db = Database::connect(opts).await?;

        schema::create_tables(&db).await?;
        scheduler::store::create_jobs_table(&db).await?;

        let jwt_secret = if self.jwt_secret.is_empty() {
            log::warn!("no JWT secret configured; using an insecure development default");
            DEV_JWT_SECRET.to_string()
        } else {
            self.jwt_secret
        };

        let handle = scheduler::start_engine(db.clone(), self.notifier.clone());

        Ok(TaskReport {
            state: AppState {
                db,
                scheduler: handle,
                undo: UndoCache::new(),
                notifier: self.notifier,
                jwt_secret: jwt_secret.into(),
                test_recipient: self.test_recipient.into(),
            },
        })
    }
}

/// The assembled service.
pub struct TaskReport {
    state: AppState,
}

impl TaskReport {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Regenerate the job set from the subscriptions table. Run once at
    /// boot before serving.
    pub async fn resync_jobs(&self) -> Result<(), DbErr> {
        reconcile::resync_jobs(&self.state.db, &self.state.scheduler).await
    }
}
