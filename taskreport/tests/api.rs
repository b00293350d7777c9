//! End-to-end tests: a real server on an ephemeral port, in-memory SQLite,
//! driven over HTTP. Delivery goes to a recording notifier so tests can
//! observe what would have been emailed.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Days, Local};
use sea_orm::EntityTrait;
use serde_json::{Value, json};

use taskreport::mailer::{Notifier, NotifyError};
use taskreport::{TaskReport, TaskReportBuilder};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.into(), subject.into(), html_body.into()));
        Ok(())
    }
}

struct TestApp {
    base: String,
    client: reqwest::Client,
    notifier: Arc<RecordingNotifier>,
    app: TaskReport,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

async fn spawn_app() -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TaskReportBuilder::new("sqlite::memory:", notifier.clone())
        .with_jwt_secret("test-secret")
        .with_test_recipient("probe@example.com")
        .with_max_connections(1)
        .build()
        .await
        .expect("failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no local addr");
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server crashed");
    });

    TestApp {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        notifier,
        app,
    }
}

async fn register_and_signin(app: &TestApp, username: &str, email: &str) -> anyhow::Result<String> {
    let response = app
        .client
        .post(app.url("/signup"))
        .json(&json!({ "username": username, "email": email, "password": "hunter2" }))
        .send()
        .await?;
    anyhow::ensure!(response.status().as_u16() == 201, "signup failed");

    let response = app
        .client
        .post(app.url("/signin"))
        .json(&json!({ "email": email, "password": "hunter2" }))
        .send()
        .await?;
    anyhow::ensure!(response.status().as_u16() == 200, "signin failed");

    let body: Value = response.json().await?;
    Ok(body["access_token"]
        .as_str()
        .context("signin returned no access_token")?
        .to_string())
}

async fn create_task(
    app: &TestApp,
    token: &str,
    title: &str,
    start_date: &str,
    due_date: &str,
    status: &str,
) -> anyhow::Result<Value> {
    let response = app
        .client
        .post(app.url("/tasks"))
        .bearer_auth(token)
        .json(&json!({
            "title": title,
            "start_date": start_date,
            "due_date": due_date,
            "status": status,
        }))
        .send()
        .await?;
    anyhow::ensure!(response.status().as_u16() == 201, "task create failed");
    Ok(response.json().await?)
}

#[tokio::test]
async fn signup_rejects_duplicate_email() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let signup = json!({ "username": "alice", "email": "alice@example.com", "password": "pw" });
    let first = app.client.post(app.url("/signup")).json(&signup).send().await?;
    assert_eq!(first.status().as_u16(), 201);

    let second = app.client.post(app.url("/signup")).json(&signup).send().await?;
    assert_eq!(second.status().as_u16(), 409);
    let body: Value = second.json().await?;
    assert!(body["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn signin_rejects_bad_credentials() -> anyhow::Result<()> {
    let app = spawn_app().await;
    register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .post(app.url("/signin"))
        .json(&json!({ "email": "alice@example.com", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn authenticated_routes_require_a_token() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/tasks")).send().await?;
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(app.url("/tasks"))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn task_crud_round_trip() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let created = create_task(&app, &token, "Write docs", "2024-06-01", "2024-06-09", "Pending").await?;
    let id = created["id"].as_i64().context("created task has no id")?;

    let fetched: Value = app
        .client
        .get(app.url(&format!("/tasks/{id}")))
        .bearer_auth(&token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched["title"], "Write docs");
    assert_eq!(fetched["status"], "Pending");

    let response = app
        .client
        .put(app.url(&format!("/tasks/{id}")))
        .bearer_auth(&token)
        .json(&json!({ "title": "Write the docs", "description": "user guide" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await?;
    assert_eq!(updated["title"], "Write the docs");
    assert_eq!(updated["description"], "user guide");

    let response = app
        .client
        .delete(app.url(&format!("/tasks/{id}")))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .get(app.url(&format!("/tasks/{id}")))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn task_create_requires_all_fields() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .post(app.url("/tasks"))
        .bearer_auth(&token)
        .json(&json!({ "title": "no dates" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .post(app.url("/tasks"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "bad date",
            "start_date": "01-06-2024",
            "due_date": "2024-06-09",
            "status": "Pending",
        }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
async fn status_filter_is_exact_and_scoped_to_the_user() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let alice = register_and_signin(&app, "alice", "alice@example.com").await?;
    let bob = register_and_signin(&app, "bob", "bob@example.com").await?;

    create_task(&app, &alice, "done", "2024-06-01", "2024-06-02", "Completed").await?;
    create_task(&app, &alice, "open", "2024-06-01", "2024-06-02", "Pending").await?;
    create_task(&app, &bob, "bob done", "2024-06-01", "2024-06-02", "Completed").await?;

    let tasks: Vec<Value> = app
        .client
        .get(app.url("/tasks"))
        .bearer_auth(&alice)
        .query(&[("status", "Completed")])
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "done");
    assert_eq!(tasks[0]["status"], "Completed");
    Ok(())
}

#[tokio::test]
async fn batch_delete_then_undo_restores_the_last_task_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    create_task(&app, &token, "first", "2024-06-01", "2024-06-02", "Pending").await?;
    create_task(&app, &token, "second", "2024-06-03", "2024-06-04", "Pending").await?;
    let last = create_task(&app, &token, "third", "2024-06-05", "2024-06-06", "Pending").await?;
    let last_id = last["id"].as_i64().context("no id")?;

    let response = app
        .client
        .delete(app.url("/tasks/batch-delete"))
        .bearer_auth(&token)
        .query(&[("start_date", "2024-06-01"), ("end_date", "2024-06-30")])
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "3 tasks deleted");

    let response = app
        .client
        .post(app.url("/tasks/undo-delete"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["task"]["title"], "third");
    let restored_id = body["task"]["id"].as_i64().context("no restored id")?;
    assert_ne!(restored_id, last_id, "restore must mint a new identity");

    // The slot is one-shot: a second undo has nothing to restore.
    let response = app
        .client
        .post(app.url("/tasks/undo-delete"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn batch_delete_with_no_matches_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .delete(app.url("/tasks/batch-delete"))
        .bearer_auth(&token)
        .query(&[("start_date", "2024-06-01"), ("end_date", "2024-06-30")])
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn undo_slots_are_isolated_per_user() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let alice = register_and_signin(&app, "alice", "alice@example.com").await?;
    let bob = register_and_signin(&app, "bob", "bob@example.com").await?;

    create_task(&app, &alice, "alice task", "2024-06-01", "2024-06-02", "Pending").await?;
    create_task(&app, &bob, "bob task", "2024-06-01", "2024-06-02", "Pending").await?;

    for token in [&alice, &bob] {
        let response = app
            .client
            .delete(app.url("/tasks/batch-delete"))
            .bearer_auth(token)
            .query(&[("start_date", "2024-06-01"), ("end_date", "2024-06-30")])
            .send()
            .await?;
        assert_eq!(response.status().as_u16(), 200);
    }

    let alice_restore: Value = app
        .client
        .post(app.url("/tasks/undo-delete"))
        .bearer_auth(&alice)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(alice_restore["task"]["title"], "alice task");

    let bob_restore: Value = app
        .client
        .post(app.url("/tasks/undo-delete"))
        .bearer_auth(&bob)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(bob_restore["task"]["title"], "bob task");
    Ok(())
}

#[tokio::test]
async fn subscribe_validates_frequency_and_report_time() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "hourly", "report_time": "10:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 400);

    // Whole hours only.
    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "daily", "report_time": "10:30:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "daily", "report_time": "10:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 201);

    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "daily", "report_time": "11:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 409);
    Ok(())
}

#[tokio::test]
async fn subscribe_installs_a_job_and_unsubscribe_prunes_it() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "weekly", "report_time": "10:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 201);

    let jobs: Vec<Value> = app.client.get(app.url("/jobs")).send().await?.json().await?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "subscription_1");
    let next_fire = jobs[0]["next_fire_time"].as_str().context("no next fire")?;
    assert!(
        next_fire.ends_with("10:00:00"),
        "job must fire at the subscribed hour, got {next_fire}"
    );

    let response = app
        .client
        .delete(app.url("/unsubscribe"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 200);

    let jobs: Vec<Value> = app.client.get(app.url("/jobs")).send().await?.json().await?;
    assert!(jobs.is_empty(), "unsubscribe must prune the job");

    let response = app
        .client
        .delete(app.url("/unsubscribe"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn reconcile_is_idempotent_for_an_unchanged_set() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let token = register_and_signin(&app, "alice", "alice@example.com").await?;

    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "start_date": "2024-01-01", "frequency": "daily", "report_time": "09:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 201);

    let state = app.app.state();
    taskreport::reconcile::resync_jobs(&state.db, &state.scheduler).await?;
    let first = state.scheduler.list().await;
    taskreport::reconcile::resync_jobs(&state.db, &state.scheduler).await?;
    let second = state.scheduler.list().await;

    let first_ids: Vec<&str> = first.iter().map(|job| job.id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|job| job.id.as_str()).collect();
    assert_eq!(first_ids, vec!["subscription_1"]);
    assert_eq!(first_ids, second_ids);
    Ok(())
}

#[tokio::test]
async fn report_delivery_covers_the_window_and_only_the_owner() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let alice = register_and_signin(&app, "alice", "alice@example.com").await?;
    let bob = register_and_signin(&app, "bob", "bob@example.com").await?;

    let today = Local::now().date_naive();
    let recent = (today - Days::new(2)).format("%Y-%m-%d").to_string();
    let ancient = (today - Days::new(60)).format("%Y-%m-%d").to_string();

    create_task(&app, &alice, "due recently", &recent, &recent, "Pending").await?;
    create_task(&app, &alice, "due long ago", &ancient, &ancient, "Overdue").await?;
    create_task(&app, &bob, "bob task", &recent, &recent, "Pending").await?;

    let start = (today - Days::new(365)).format("%Y-%m-%d").to_string();
    let response = app
        .client
        .post(app.url("/subscribe"))
        .bearer_auth(&alice)
        .json(&json!({ "start_date": start, "frequency": "weekly", "report_time": "10:00:00" }))
        .send()
        .await?;
    assert_eq!(response.status().as_u16(), 201);

    let state = app.app.state();
    let subscription = taskreport::entity::subscription::Entity::find()
        .one(&state.db)
        .await?
        .context("subscription missing")?;
    taskreport::report::send_report(&state.db, app.notifier.as_ref(), &subscription).await?;

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    let (recipient, subject, body) = &sent[0];
    assert_eq!(recipient, "alice@example.com");
    assert_eq!(subject, taskreport::report::REPORT_SUBJECT);
    assert!(body.contains("due recently"));
    assert!(!body.contains("due long ago"), "outside the weekly window");
    assert!(!body.contains("bob task"), "other users' tasks must not leak");
    Ok(())
}

#[tokio::test]
async fn test_email_goes_to_the_configured_recipient() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/test-email")).send().await?;
    assert_eq!(response.status().as_u16(), 200);

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "probe@example.com");
    Ok(())
}
