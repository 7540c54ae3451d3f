use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::users::{create, NewUserPayload};
use super::{ApiJson, AppState};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::User;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewUserPayload>,
) -> Result<(StatusCode, Json<User>)> {
    let user = create(&state, payload).await?;
    info!(username = %user.username, role = %user.role, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

/// POST /auth/login - パスワードを確認するだけ（トークンは発行しない）
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<Json<User>> {
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let mut conn = state.pool.acquire().await?;
    let user = db::users::find_by_username(&mut conn, &payload.username)
        .await?
        .ok_or_else(invalid)?;

    // 壊れたハッシュも「パスワード違い」と同じ扱い
    let hashed = user.hashed_password.clone();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(payload.password, &hashed))
        .await?
        .unwrap_or(false);
    if !matches {
        return Err(invalid());
    }
    Ok(Json(user))
}
