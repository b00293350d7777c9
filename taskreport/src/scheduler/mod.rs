//! The report-scheduling engine.
//!
//! A background task owns the full job set: one recurring job per
//! subscription, keyed `subscription_{id}`, firing every day at the
//! subscription's report hour. The engine is driven over an mpsc command
//! channel (reconcile replaces the whole set, list reads it) while a
//! deadline timer fires due jobs. Each firing runs on its own spawned
//! task, so a failing delivery is logged and cannot disturb other jobs or
//! the loop itself.
//!
//! The set is mirrored into the persistent [`store`] so it survives
//! process restart.

pub mod store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use tokio::select;
use tokio::sync::{mpsc, oneshot};

use crate::entity::subscription;
use crate::mailer::Notifier;
use crate::report;

/// How long the engine sleeps when it has no job to wake for.
const IDLE_POLL: Duration = Duration::from_secs(300);

/// Job identifier for a subscription.
pub fn job_id(subscription_id: i32) -> String {
    format!("subscription_{subscription_id}")
}

/// Identifier and next fire time of an installed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub next_fire_time: String,
}

#[derive(Debug)]
enum Command {
    Reconcile {
        subscriptions: Vec<subscription::Model>,
        done: oneshot::Sender<()>,
    },
    List {
        reply: oneshot::Sender<Vec<JobInfo>>,
    },
}

/// Cloneable handle for talking to the engine task.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Replace the job set with exactly one job per given subscription.
    /// Returns once the engine has applied and persisted the new set.
    pub async fn reconcile(&self, subscriptions: Vec<subscription::Model>) {
        let (done, ack) = oneshot::channel();
        if self
            .tx
            .send(Command::Reconcile {
                subscriptions,
                done,
            })
            .await
            .is_err()
        {
            log::error!("scheduler engine is gone; reconcile dropped");
            return;
        }
        let _ = ack.await;
    }

    /// Identifier and next fire time for every installed job. Read-only.
    pub async fn list(&self) -> Vec<JobInfo> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::List { reply }).await.is_err() {
            log::error!("scheduler engine is gone; reporting no jobs");
            return Vec::new();
        }
        response.await.unwrap_or_default()
    }
}

struct ScheduledJob {
    subscription: subscription::Model,
    next_fire: NaiveDateTime,
}

/// Background engine owning the job set. One per process, spawned by
/// [`start_engine`].
pub struct ReportEngine {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    jobs: HashMap<String, ScheduledJob>,
    rx: mpsc::Receiver<Command>,
}

/// Spawn the engine task and hand back its command handle.
///
/// Persisted jobs are restored before the loop starts, so the job set
/// survives restart even before the first reconcile.
pub fn start_engine(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> SchedulerHandle {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut engine = ReportEngine {
            db,
            notifier,
            jobs: HashMap::new(),
            rx,
        };
        if let Err(err) = engine.restore().await {
            log::warn!("could not restore persisted jobs: {err}");
        }
        engine.run().await;
    });
    SchedulerHandle { tx }
}

impl ReportEngine {
    /// Reload the persisted job set, dropping rows whose subscription has
    /// vanished and rolling stale fire times forward.
    async fn restore(&mut self) -> Result<(), sea_orm::DbErr> {
        let now = Local::now().naive_local();
        for persisted in store::load_jobs(&self.db).await? {
            let found = subscription::Entity::find_by_id(persisted.subscription_id)
                .one(&self.db)
                .await?;
            let Some(sub) = found else {
                log::warn!(
                    "dropping persisted job {} for vanished subscription",
                    persisted.job_id
                );
                store::remove_job(&self.db, &persisted.job_id).await?;
                continue;
            };
            let next_fire = match persisted.next_fire {
                Some(at) if at > now => at,
                // The process slept past the stored time; skip to the next
                // occurrence rather than firing a backlog.
                _ => next_fire_after(persisted.fire_hour, now),
            };
            log::info!("restored job {} (next fire {next_fire})", persisted.job_id);
            self.jobs.insert(
                persisted.job_id,
                ScheduledJob {
                    subscription: sub,
                    next_fire,
                },
            );
        }
        Ok(())
    }

    async fn run(&mut self) {
        loop {
            let wait = self.until_next_fire();
            select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Reconcile { subscriptions, done }) => {
                        self.reconcile(subscriptions).await;
                        let _ = done.send(());
                    }
                    Some(Command::List { reply }) => {
                        let _ = reply.send(self.list());
                    }
                    // Every handle dropped: nothing can reach us, stop.
                    None => break,
                },
                _ = tokio::time::sleep(wait) => self.fire_due().await,
            }
        }
    }

    fn until_next_fire(&self) -> Duration {
        let now = Local::now().naive_local();
        self.jobs
            .values()
            .map(|job| job.next_fire)
            .min()
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(IDLE_POLL)
    }

    /// Install-or-replace one job per subscription and prune every job
    /// whose subscription is gone, so the set always equals
    /// `{ job for s in subscriptions }`.
    async fn reconcile(&mut self, subscriptions: Vec<subscription::Model>) {
        if subscriptions.is_empty() {
            log::warn!("no subscriptions found for scheduling");
        }

        let now = Local::now().naive_local();
        let mut next_set = HashMap::with_capacity(subscriptions.len());
        for sub in subscriptions {
            let id = job_id(sub.id);
            let hour = sub.report_time.hour();
            let next_fire = next_fire_after(hour, now);
            if let Err(err) = store::replace_job(&self.db, &id, sub.id, hour, next_fire).await {
                log::error!("could not persist job {id}: {err}");
            }
            log::info!(
                "scheduled job {id} for user {} at hour {hour} (next fire {next_fire})",
                sub.user_id
            );
            next_set.insert(
                id,
                ScheduledJob {
                    subscription: sub,
                    next_fire,
                },
            );
        }

        let stale: Vec<String> = self
            .jobs
            .keys()
            .filter(|id| !next_set.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Err(err) = store::remove_job(&self.db, &id).await {
                log::error!("could not prune job {id}: {err}");
            }
            log::info!("pruned job {id}");
        }

        self.jobs = next_set;
    }

    fn list(&self) -> Vec<JobInfo> {
        let mut infos: Vec<JobInfo> = self
            .jobs
            .iter()
            .map(|(id, job)| JobInfo {
                id: id.clone(),
                next_fire_time: job.next_fire.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Fire every due job: advance its next fire time a full day first,
    /// then run the report on its own task. A job therefore never overlaps
    /// itself, and one failing delivery cannot disturb the others.
    async fn fire_due(&mut self) {
        let now = Local::now().naive_local();
        let due: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.next_fire <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in due {
            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            job.next_fire += TimeDelta::days(1);
            let next_fire = job.next_fire;
            let sub = job.subscription.clone();

            if let Err(err) = store::set_next_fire(&self.db, &id, next_fire).await {
                log::error!("could not persist next fire time for {id}: {err}");
            }
            log::info!("firing job {id} (next fire {next_fire})");

            let db = self.db.clone();
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                if let Err(err) = report::send_report(&db, notifier.as_ref(), &sub).await {
                    log::error!("report job for subscription {} failed: {err}", sub.id);
                }
            });
        }
    }
}

/// The next wall-clock occurrence of `hour:00:00` strictly after `now`.
fn next_fire_after(hour: u32, now: NaiveDateTime) -> NaiveDateTime {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn job_id_uses_subscription_prefix() {
        assert_eq!(job_id(7), "subscription_7");
    }

    #[test]
    fn fire_later_today_when_hour_is_ahead() {
        assert_eq!(next_fire_after(10, at(8, 30)), at(10, 0));
    }

    #[test]
    fn fire_tomorrow_when_hour_has_passed() {
        let next = next_fire_after(10, at(12, 0));
        assert_eq!(next, at(10, 0) + TimeDelta::days(1));
    }

    #[test]
    fn fire_exactly_at_the_hour_rolls_to_tomorrow() {
        // A job due at 10:00 firing at 10:00 must schedule the next day,
        // not fire twice.
        let next = next_fire_after(10, at(10, 0));
        assert_eq!(next, at(10, 0) + TimeDelta::days(1));
    }
}
