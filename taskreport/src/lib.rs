//! # taskreport
//!
//! A task-management API with per-user authentication and scheduled email
//! report subscriptions.
//!
//! The interesting part is the report-scheduling subsystem: subscription
//! rows are materialized into recurring jobs owned by a background engine
//! (see [`scheduler`]); the job set is regenerated from the database
//! whenever subscriptions change and survives restarts through the
//! engine's own `_report_jobs` table. At fire time the engine builds a
//! report over a frequency-dependent window ([`report`]) and hands it to a
//! [`mailer::Notifier`].
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskreport::TaskReportBuilder;
//! use taskreport::mailer::HttpMailer;
//!
//! let mailer = HttpMailer::new("https://mail.example/send", "reports@example.com", "token");
//! let app = TaskReportBuilder::new("sqlite:./taskreport.db?mode=rwc", Arc::new(mailer))
//!     .with_jwt_secret("secret")
//!     .build()
//!     .await?;
//! app.resync_jobs().await?;
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app.router()).await?;
//! ```
//!
//! ## Key types
//!
//! - [`TaskReportBuilder`] — connects storage, creates tables, spawns the engine
//! - [`scheduler::SchedulerHandle`] — reconcile/list commands for the engine
//! - [`mailer::Notifier`] — the outbound delivery seam
//! - [`error::ApiError`] — the one error shape every handler answers with

pub mod app;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod mailer;
pub mod reconcile;
pub mod report;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod undo;

pub use app::{AppState, TaskReport, TaskReportBuilder};
pub use error::ApiError;

// Re-export for embedders driving the storage layer directly.
pub use sea_orm;
