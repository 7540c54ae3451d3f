use std::sync::Arc;

use axum::extract::{Path, State as AxumState};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState};
use crate::db;
use crate::db::tractors::TractorFilter;
use crate::error::{AppError, Result};
use crate::models::{ResourceType, Role, State, Tractor};
use crate::movement::MovementReport;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tractors", post(create_tractor))
        .route("/tractors/{id}", get(get_tractor))
        .route("/tractors/owner/{id}", get(tractors_of_owner))
        .route("/tractors/traffic_manager/{id}", get(tractors_of_traffic_manager))
        .route("/tractors/state/{state}", get(tractors_in_state))
        .route("/tractors/route/{id}", get(tractors_on_route))
        .route("/tractors/traffic_manager", post(add_traffic_manager))
        .route("/tractors/route", patch(set_route))
        .route("/tractors/state", patch(update_state))
        .route("/tractors/next_checkpoint", post(next_checkpoint))
}

#[derive(Debug, Deserialize)]
struct CreateTractorPayload {
    name: String,
    resource_type: ResourceType,
    #[serde(rename = "max_units")]
    max_volume: Decimal,
    #[serde(rename = "current_units")]
    current_volume: Option<Decimal>,
    state: Option<State>,
    current_checkpoint_id: Option<Uuid>,
    owner_id: Option<Uuid>,
    min_price_by_km: Option<Decimal>,
}

/// POST /tractors
async fn create_tractor(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateTractorPayload>,
) -> Result<(StatusCode, Json<Tractor>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if payload.max_volume <= Decimal::ZERO {
        return Err(AppError::BadRequest("max_units must be positive".to_string()));
    }
    let current_volume = payload.current_volume.unwrap_or(Decimal::ZERO);
    if current_volume < Decimal::ZERO || current_volume > payload.max_volume {
        return Err(AppError::BadRequest(
            "current_units must be between 0 and max_units".to_string(),
        ));
    }
    let min_price_by_km = payload.min_price_by_km.unwrap_or(Decimal::ZERO);
    if min_price_by_km < Decimal::ZERO {
        return Err(AppError::BadRequest("min_price_by_km must not be negative".to_string()));
    }

    let mut conn = state.pool.acquire().await?;
    if let Some(checkpoint_id) = payload.current_checkpoint_id {
        if db::checkpoints::find(&mut conn, checkpoint_id).await?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown checkpoint {checkpoint_id}")));
        }
    }
    if let Some(owner_id) = payload.owner_id {
        if db::users::find(&mut conn, owner_id).await?.is_none() {
            return Err(AppError::not_found("Owner"));
        }
    }

    let tractor = Tractor {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        resource_type: payload.resource_type,
        max_volume: payload.max_volume,
        current_volume,
        state: payload.state.unwrap_or(State::Available),
        current_checkpoint_id: payload.current_checkpoint_id,
        route_id: None,
        owner_id: payload.owner_id,
        traffic_manager_id: None,
        trader_id: None,
        min_price_by_km,
        created_at: db::simulation::current_date(&mut conn).await?,
    };
    db::tractors::insert(&mut conn, &tractor).await?;
    Ok((StatusCode::CREATED, Json(tractor)))
}

/// GET /tractors/{id}
async fn get_tractor(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tractor>> {
    let id = parse_id(&id, "tractor id")?;
    let mut conn = state.pool.acquire().await?;
    db::tractors::find(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Tractor"))
}

async fn list(state: &AppState, filter: TractorFilter) -> Result<Json<Vec<Tractor>>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::tractors::list(&mut conn, filter).await?))
}

/// GET /tractors/owner/{id}
async fn tractors_of_owner(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Tractor>>> {
    let id = parse_id(&id, "owner id")?;
    list(&state, TractorFilter::Owner(id)).await
}

/// GET /tractors/traffic_manager/{id}
async fn tractors_of_traffic_manager(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Tractor>>> {
    let id = parse_id(&id, "traffic manager id")?;
    list(&state, TractorFilter::TrafficManager(id)).await
}

/// GET /tractors/state/{state}
async fn tractors_in_state(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<Tractor>>> {
    let wanted: State = raw
        .parse()
        .map_err(|e: crate::ParseEnumError| AppError::BadRequest(e.to_string()))?;
    list(&state, TractorFilter::State(wanted)).await
}

/// GET /tractors/route/{id}
async fn tractors_on_route(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Tractor>>> {
    let id = parse_id(&id, "route id")?;
    list(&state, TractorFilter::Route(id)).await
}

#[derive(Debug, Deserialize)]
struct AddTrafficManagerPayload {
    tractor_id: Uuid,
    traffic_manager_id: Uuid,
}

/// POST /tractors/traffic_manager - 交通管理者に預ける（pending になる）
async fn add_traffic_manager(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<AddTrafficManagerPayload>,
) -> Result<Json<Tractor>> {
    let mut conn = state.pool.acquire().await?;
    let mut tractor = db::tractors::find(&mut conn, payload.tractor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;
    db::users::find_with_role(&mut conn, payload.traffic_manager_id, Role::TrafficManager)
        .await?
        .ok_or_else(|| AppError::not_found("Traffic manager"))?;

    tractor.traffic_manager_id = Some(payload.traffic_manager_id);
    tractor.state = State::Pending;
    db::tractors::update(&mut conn, &tractor).await?;

    info!(tractor_id = %tractor.id, traffic_manager_id = %payload.traffic_manager_id, "tractor handed to traffic manager");
    Ok(Json(tractor))
}

#[derive(Debug, Deserialize)]
struct SetRoutePayload {
    tractor_id: Uuid,
    route_id: Uuid,
}

/// PATCH /tractors/route
///
/// 現在地があるならルート上にあること。無ければルートの最初の地点に置く。
async fn set_route(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<SetRoutePayload>,
) -> Result<Json<Tractor>> {
    let mut conn = state.pool.acquire().await?;
    let mut tractor = db::tractors::find(&mut conn, payload.tractor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;
    if tractor.state == State::InTransit {
        return Err(AppError::BadRequest(
            "Cannot change the route of a tractor in transit".to_string(),
        ));
    }
    db::routes::find(&mut conn, payload.route_id)
        .await?
        .ok_or_else(|| AppError::not_found("Route"))?;

    let stops = db::routes::checkpoints_of(&mut conn, payload.route_id).await?;
    match tractor.current_checkpoint_id {
        Some(current) => {
            if !stops.iter().any(|stop| stop.checkpoint_id == current) {
                return Err(AppError::BadRequest(
                    "Tractor's current checkpoint is not on the route".to_string(),
                ));
            }
        }
        None => {
            let first = stops
                .first()
                .ok_or_else(|| AppError::BadRequest("Route has no checkpoints".to_string()))?;
            tractor.current_checkpoint_id = Some(first.checkpoint_id);
        }
    }

    tractor.route_id = Some(payload.route_id);
    db::tractors::update(&mut conn, &tractor).await?;
    Ok(Json(tractor))
}

#[derive(Debug, Deserialize)]
struct UpdateStatePayload {
    id: Uuid,
    state: State,
}

/// PATCH /tractors/state
async fn update_state(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<UpdateStatePayload>,
) -> Result<Json<Tractor>> {
    let mut conn = state.pool.acquire().await?;
    let mut tractor = db::tractors::find(&mut conn, payload.id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;
    tractor.state = payload.state;
    db::tractors::update(&mut conn, &tractor).await?;
    Ok(Json(tractor))
}

/// POST /tractors/next_checkpoint - 日付は進めずに1地点だけ動かす
async fn next_checkpoint(AxumState(state): AxumState<Arc<AppState>>) -> Result<Json<MovementReport>> {
    Ok(Json(state.engine.move_tractors().await?))
}
