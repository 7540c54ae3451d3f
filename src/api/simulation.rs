use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;

use super::AppState;
use crate::engine::TickReport;
use crate::error::Result;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/simulations/date", get(get_date).patch(advance_date))
}

#[derive(Debug, Serialize)]
struct DateResponse {
    simulation_date: NaiveDate,
}

/// GET /simulations/date
async fn get_date(State(state): State<Arc<AppState>>) -> Result<Json<DateResponse>> {
    let simulation_date = state.engine.current_date().await?;
    Ok(Json(DateResponse { simulation_date }))
}

#[derive(Debug, Serialize)]
struct AdvanceResponse {
    message: &'static str,
    simulation_date: NaiveDate,
    report: TickReport,
}

/// PATCH /simulations/date - 1日進める（移動 → 取引所の締め）
async fn advance_date(State(state): State<Arc<AppState>>) -> Result<Json<AdvanceResponse>> {
    let report = state.engine.advance_day().await?;
    Ok(Json(AdvanceResponse {
        message: "Simulation date updated",
        simulation_date: report.simulation_date,
        report,
    }))
}
