use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{parse_id, AppState};
use crate::db;
use crate::error::Result;
use crate::models::Transaction;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions/tractor/{id}", get(transactions_of_tractor))
        .route("/transactions/lot/{id}", get(transactions_of_lot))
}

/// GET /transactions/tractor/{id}
async fn transactions_of_tractor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Transaction>>> {
    let id = parse_id(&id, "tractor id")?;
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::transactions::list_by_tractor(&mut conn, id).await?))
}

/// GET /transactions/lot/{id}
async fn transactions_of_lot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Transaction>>> {
    let id = parse_id(&id, "lot id")?;
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::transactions::list_by_lot(&mut conn, id).await?))
}
