// =============================================================================
// Web API層
// =============================================================================
//
// すべてのエンドポイントは /api/v1 の下にぶら下がる（/ws だけ直下）。
// ハンドラーはどれも同じ形:
//   1. パスやJSONを受け取って検証する
//   2. db / dispatch / market の関数を1つか2つ呼ぶ
//   3. JSONとステータスコードを返す
// エラーは AppError がそのまま {"error": "..."} になる。
// =============================================================================

mod auth;
mod checkpoints;
mod lots;
mod market;
mod routes;
mod simulation;
mod tractors;
mod transactions;
mod users;
mod ws;

use std::path::Path;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::db::DbPool;
use crate::engine::{SimulationHandle, TickReport};
use crate::error::AppError;

/// APIハンドラーが持つ共有状態
pub struct AppState {
    pub pool: DbPool,
    /// シミュレーションエンジンへの送信側
    pub engine: SimulationHandle,
    /// 1日ごとの処理結果の配信チャンネル
    pub broadcast_tx: broadcast::Sender<TickReport>,
}

/// ルーターを構築する
pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .merge(checkpoints::routes())
        .merge(users::routes())
        .merge(auth::routes())
        .merge(routes::routes())
        .merge(tractors::routes())
        .merge(lots::routes())
        .merge(transactions::routes())
        .merge(market::routes())
        .merge(simulation::routes());

    let mut app = Router::new()
        .nest("/api/v1", api)
        .route("/ws", get(ws::ws_handler));

    // フロントエンドのビルド成果物があれば、それ以外のパスで配信する
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // CORS許可（開発用に全許可）
        .with_state(state)
}

// =============================================================================
// 共通の入力ヘルパー
// =============================================================================

/// JSONボディ。読めなければ 400 {"error": ...}
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
        }
    }
}

/// パスやボディで受け取ったIDをUUIDとして読む
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {what}")))
}

/// {"limit_date": "YYYY-MM-DD"}
#[derive(Debug, Deserialize)]
pub(crate) struct LimitDatePayload {
    pub limit_date: chrono::NaiveDate,
}
