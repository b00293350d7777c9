use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::auth;
use crate::entity::user;
use crate::error::ApiError;

use super::required;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let username = required("username", &body.username)?;
    let email = required("email", &body.email)?;
    let password = required("password", &body.password)?;

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "a user with this email already exists".into(),
        ));
    }

    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(auth::hash_password(password)?),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user registered" })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn signin(
    State(state): State<AppState>,
    Json(body): Json<SigninRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = required("email", &body.email)?;
    let password = required("password", &body.password)?;

    let account = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !auth::verify_password(password, &account.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = auth::issue_token(&account.email, &state.jwt_secret)?;
    Ok(Json(json!({ "access_token": token })))
}
