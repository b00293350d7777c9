//! Bridges subscription lifecycle events to the scheduler.
//!
//! The strategy is deliberately simple: reload **all** subscriptions and
//! hand the full set to the engine, which replaces its job set with exactly
//! that. O(total subscriptions) per call, fine at this scale, and it keeps
//! the "one job per subscription, nothing else" invariant exact after both
//! subscribe and unsubscribe.

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};

use crate::entity::subscription;
use crate::scheduler::SchedulerHandle;

/// Regenerate the scheduler's job set from the subscriptions table.
///
/// Called after a successful subscribe, after unsubscribe, and once at
/// boot before the server starts accepting requests.
pub async fn resync_jobs(db: &DatabaseConnection, scheduler: &SchedulerHandle) -> Result<(), DbErr> {
    let subscriptions = subscription::Entity::find().all(db).await?;
    log::info!("reconciling {} subscription job(s)", subscriptions.len());
    scheduler.reconcile(subscriptions).await;
    Ok(())
}
