use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::entity::task;
use crate::error::ApiError;
use crate::undo::TaskSnapshot;

use super::{parse_date, required};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub completion_date: Option<String>,
    pub status: Option<String>,
}

pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<task::Model>), ApiError> {
    let title = required("title", &body.title)?;
    let status = required("status", &body.status)?;
    let start_date = parse_date("start_date", required("start_date", &body.start_date)?)?;
    let due_date = parse_date("due_date", required("due_date", &body.due_date)?)?;
    let completion_date = match body.completion_date.as_deref() {
        Some(value) if !value.is_empty() => Some(parse_date("completion_date", value)?),
        _ => None,
    };

    let created = task::ActiveModel {
        title: Set(title.to_string()),
        description: Set(body.description.clone()),
        start_date: Set(start_date),
        due_date: Set(due_date),
        completion_date: Set(completion_date),
        status: Set(status.to_string()),
        user_id: Set(account.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct TaskFilters {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// List the authenticated user's tasks. `status` filters by exact match;
/// the date filters only apply when both bounds are present.
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Query(filters): Query<TaskFilters>,
) -> Result<Json<Vec<task::Model>>, ApiError> {
    let mut query = task::Entity::find().filter(task::Column::UserId.eq(account.id));

    if let Some(status) = filters.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(task::Column::Status.eq(status));
    }
    if let (Some(start), Some(end)) = (filters.start_date.as_deref(), filters.end_date.as_deref())
    {
        let start = parse_date("start_date", start)?;
        let end = parse_date("end_date", end)?;
        query = query
            .filter(task::Column::StartDate.gte(start))
            .filter(task::Column::DueDate.lte(end));
    }

    Ok(Json(query.all(&state.db).await?))
}

async fn owned_task(state: &AppState, user_id: i32, task_id: i32) -> Result<task::Model, ApiError> {
    task::Entity::find_by_id(task_id)
        .filter(task::Column::UserId.eq(user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".into()))
}

pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<Json<task::Model>, ApiError> {
    Ok(Json(owned_task(&state, account.id, task_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Only title and description are mutable after creation.
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Path(task_id): Path<i32>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<task::Model>, ApiError> {
    let existing = owned_task(&state, account.id, task_id).await?;

    let mut active: task::ActiveModel = existing.into();
    if let Some(title) = body.title {
        active.title = Set(title);
    }
    if let Some(description) = body.description {
        active.description = Set(Some(description));
    }

    Ok(Json(active.update(&state.db).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existing = owned_task(&state, account.id, task_id).await?;
    existing.delete(&state.db).await?;
    Ok(Json(json!({ "message": "task deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Delete every task starting on or after `start_date` and due on or
/// before `end_date`. Only the last matched task is recoverable afterwards,
/// by design of the single-slot undo cache.
pub async fn batch_delete(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Query(params): Query<BatchDeleteParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = parse_date("start_date", required("start_date", &params.start_date)?)?;
    let end = parse_date("end_date", required("end_date", &params.end_date)?)?;

    let matched = task::Entity::find()
        .filter(task::Column::UserId.eq(account.id))
        .filter(task::Column::StartDate.gte(start))
        .filter(task::Column::DueDate.lte(end))
        .order_by_asc(task::Column::Id)
        .all(&state.db)
        .await?;

    if matched.is_empty() {
        return Err(ApiError::NotFound(
            "no tasks found in the given date range".into(),
        ));
    }

    if let Some(last) = matched.last() {
        state.undo.remember(account.id, TaskSnapshot::from(last));
    }

    let deleted = matched.len();
    task::Entity::delete_many()
        .filter(task::Column::UserId.eq(account.id))
        .filter(task::Column::StartDate.gte(start))
        .filter(task::Column::DueDate.lte(end))
        .exec(&state.db)
        .await?;

    Ok(Json(json!({ "message": format!("{deleted} tasks deleted") })))
}

/// Restore the last batch-deleted task as a new row. The slot is cleared
/// only when the insert succeeds.
pub async fn undo_delete(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state
        .undo
        .take(account.id)
        .ok_or_else(|| ApiError::NotFound("no deleted task to restore".into()))?;

    let insert = task::ActiveModel {
        title: Set(snapshot.title.clone()),
        description: Set(snapshot.description.clone()),
        start_date: Set(snapshot.start_date),
        due_date: Set(snapshot.due_date),
        completion_date: Set(snapshot.completion_date),
        status: Set(snapshot.status.clone()),
        user_id: Set(account.id),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    let restored = match insert {
        Ok(model) => model,
        Err(err) => {
            // Put the snapshot back so the undo is not lost to a transient
            // storage failure.
            state.undo.remember(account.id, snapshot);
            return Err(err.into());
        }
    };

    Ok(Json(json!({ "message": "task restored", "task": restored })))
}
