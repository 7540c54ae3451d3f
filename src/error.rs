//! APIとDB層で共通のエラー型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// リクエストの形式・値がおかしい
    #[error("{0}")]
    BadRequest(String),

    /// ログイン失敗
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// 一意制約・外部キー制約に反する
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// DBに入っている値が読めない（UUIDやDecimalが壊れている）
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// spawn_blocking に投げた処理が落ちた
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// シミュレーションエンジンのアクターが止まっている
    #[error("Simulation engine unavailable")]
    EngineUnavailable,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Corrupt(_)
            | AppError::Hash(_)
            | AppError::Task(_)
            | AppError::EngineUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict("Record already exists".to_string());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::Conflict(
                    "Record is referenced by or references a missing record".to_string(),
                );
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
