use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::{Role, User};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/traffic_managers", get(list_traffic_managers))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

/// ユーザー作成の入力（/users と /auth/register で共通）
#[derive(Debug, Deserialize)]
pub(super) struct NewUserPayload {
    pub username: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub password: String,
    pub role: Role,
}

/// bcrypt はCPUを食うのでブロッキング用スレッドで計算する
pub(super) async fn hash_password(password: String) -> Result<String> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST)).await??;
    Ok(hashed)
}

/// 検証してパスワードをハッシュ化し、保存する
pub(super) async fn create(state: &AppState, payload: NewUserPayload) -> Result<User> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("password is required".to_string()));
    }

    let mut conn = state.pool.acquire().await?;
    if db::users::find_by_username(&mut conn, username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let hashed_password = hash_password(payload.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        firstname: payload.firstname,
        lastname: payload.lastname,
        hashed_password,
        role: payload.role,
    };
    db::users::insert(&mut conn, &user).await?;
    Ok(user)
}

/// GET /users
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::users::list(&mut conn).await?))
}

/// GET /users/traffic_managers
async fn list_traffic_managers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(
        db::users::list_by_role(&mut conn, Role::TrafficManager).await?,
    ))
}

/// GET /users/{id}
async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<User>> {
    let id = parse_id(&id, "user id")?;
    let mut conn = state.pool.acquire().await?;
    db::users::find(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User"))
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewUserPayload>,
) -> Result<(StatusCode, Json<User>)> {
    let user = create(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct UpdateUserPayload {
    username: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    password: Option<String>,
    role: Option<Role>,
}

/// PATCH /users/{id} - 指定されたフィールドだけ更新する
async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserPayload>,
) -> Result<Json<User>> {
    let id = parse_id(&id, "user id")?;
    let mut conn = state.pool.acquire().await?;
    let mut user = db::users::find(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if let Some(username) = payload.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest("username must not be empty".to_string()));
        }
        user.username = username.to_string();
    }
    if let Some(firstname) = payload.firstname {
        user.firstname = firstname;
    }
    if let Some(lastname) = payload.lastname {
        user.lastname = lastname;
    }
    if let Some(password) = payload.password {
        if password.is_empty() {
            return Err(AppError::BadRequest("password must not be empty".to_string()));
        }
        user.hashed_password = hash_password(password).await?;
    }
    if let Some(role) = payload.role {
        user.role = role;
    }

    db::users::update(&mut conn, &user).await?;
    Ok(Json(user))
}

/// DELETE /users/{id}
async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode> {
    let id = parse_id(&id, "user id")?;
    let mut conn = state.pool.acquire().await?;
    if db::users::delete(&mut conn, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("User"))
    }
}
