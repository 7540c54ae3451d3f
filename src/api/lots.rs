use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State as AxumState};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState, LimitDatePayload};
use crate::db::lots::LotFilter;
use crate::error::{AppError, Result};
use crate::models::{Bid, Checkpoint, Lot, LotView, Offer, ResourceType, Role, State, TraderLotView, Tractor};
use crate::{db, dispatch, market};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/lots", post(create_lot))
        .route("/lots/{id}", get(get_lot).delete(delete_lot))
        .route("/lots/owner/{id}", get(lots_of_owner))
        .route("/lots/traffic_manager/{id}", get(lots_of_traffic_manager))
        .route("/lots/trader/{id}", get(lots_of_trader))
        .route("/lots/state", patch(update_state))
        .route("/lots/traffic_manager", post(add_traffic_manager))
        .route("/lots/compatible", post(check_compatible))
        .route(
            "/lots/tractors/compatible/{traffic_manager_id}/{lot_id}",
            get(compatible_tractors),
        )
        .route("/lots/assign", put(assign_tractor))
        .route("/lots/assign/{lot_id}/trader", post(assign_trader))
        .route("/lots/bids/{owner_id}", get(bids_of_owner))
}

/// ロットにチェックポイントを埋め込む
fn view(lot: Lot, checkpoints: &HashMap<Uuid, Checkpoint>) -> LotView {
    let lookup = |id: Option<Uuid>| id.and_then(|id| checkpoints.get(&id).cloned());
    LotView {
        start_checkpoint: lookup(Some(lot.start_checkpoint_id)),
        end_checkpoint: lookup(Some(lot.end_checkpoint_id)),
        current_checkpoint: lookup(lot.current_checkpoint_id),
        lot,
    }
}

async fn views(state: &AppState, filter: LotFilter) -> Result<Vec<LotView>> {
    let mut conn = state.pool.acquire().await?;
    let lots = db::lots::list(&mut conn, filter).await?;
    let checkpoints = db::checkpoints::map(&mut conn).await?;
    Ok(lots.into_iter().map(|lot| view(lot, &checkpoints)).collect())
}

#[derive(Debug, Deserialize)]
struct CreateLotPayload {
    resource_type: ResourceType,
    volume: Decimal,
    start_checkpoint_id: Uuid,
    end_checkpoint_id: Uuid,
    owner_id: Uuid,
    max_price_by_km: Option<Decimal>,
    state: Option<State>,
}

/// POST /lots
async fn create_lot(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateLotPayload>,
) -> Result<(StatusCode, Json<LotView>)> {
    if payload.volume <= Decimal::ZERO {
        return Err(AppError::BadRequest("volume must be positive".to_string()));
    }
    if payload.start_checkpoint_id == payload.end_checkpoint_id {
        return Err(AppError::BadRequest(
            "start and end checkpoints must differ".to_string(),
        ));
    }
    let max_price_by_km = payload.max_price_by_km.unwrap_or(Decimal::ZERO);
    if max_price_by_km < Decimal::ZERO {
        return Err(AppError::BadRequest("max_price_by_km must not be negative".to_string()));
    }

    let mut conn = state.pool.acquire().await?;
    for checkpoint_id in [payload.start_checkpoint_id, payload.end_checkpoint_id] {
        if db::checkpoints::find(&mut conn, checkpoint_id).await?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown checkpoint {checkpoint_id}")));
        }
    }
    db::users::find(&mut conn, payload.owner_id)
        .await?
        .ok_or_else(|| AppError::not_found("Owner"))?;

    let lot = Lot {
        id: Uuid::new_v4(),
        resource_type: payload.resource_type,
        volume: payload.volume,
        state: payload.state.unwrap_or(State::Available),
        start_checkpoint_id: payload.start_checkpoint_id,
        end_checkpoint_id: payload.end_checkpoint_id,
        current_checkpoint_id: Some(payload.start_checkpoint_id),
        tractor_id: None,
        in_tractor: false,
        owner_id: payload.owner_id,
        traffic_manager_id: None,
        trader_id: None,
        max_price_by_km,
        created_at: db::simulation::current_date(&mut conn).await?,
    };
    db::lots::insert(&mut conn, &lot).await?;

    let checkpoints = db::checkpoints::map(&mut conn).await?;
    Ok((StatusCode::CREATED, Json(view(lot, &checkpoints))))
}

/// GET /lots/{id}
async fn get_lot(AxumState(state): AxumState<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<LotView>> {
    let id = parse_id(&id, "lot id")?;
    let mut conn = state.pool.acquire().await?;
    let lot = db::lots::find(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    let checkpoints = db::checkpoints::map(&mut conn).await?;
    Ok(Json(view(lot, &checkpoints)))
}

/// DELETE /lots/{id} - 積まれていたらトラクターの積載量も戻す
async fn delete_lot(AxumState(state): AxumState<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode> {
    let id = parse_id(&id, "lot id")?;
    let mut tx = state.pool.begin().await?;
    if !dispatch::delete_lot(&mut tx, id).await? {
        return Err(AppError::not_found("Lot"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /lots/owner/{id}
async fn lots_of_owner(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LotView>>> {
    let id = parse_id(&id, "owner id")?;
    Ok(Json(views(&state, LotFilter::Owner(id)).await?))
}

/// GET /lots/traffic_manager/{id}
async fn lots_of_traffic_manager(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LotView>>> {
    let id = parse_id(&id, "traffic manager id")?;
    {
        let mut conn = state.pool.acquire().await?;
        db::users::find_with_role(&mut conn, id, Role::TrafficManager)
            .await?
            .ok_or_else(|| AppError::not_found("Traffic manager"))?;
    }
    Ok(Json(views(&state, LotFilter::TrafficManager(id)).await?))
}

/// GET /lots/trader/{id} - 最良入札と出品期限を付ける
async fn lots_of_trader(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TraderLotView>>> {
    let id = parse_id(&id, "trader id")?;
    let mut conn = state.pool.acquire().await?;
    let lots = db::lots::list(&mut conn, LotFilter::Trader(id)).await?;
    let checkpoints = db::checkpoints::map(&mut conn).await?;

    let mut result = Vec::with_capacity(lots.len());
    for lot in lots {
        let (current_price, limit_date) = match db::market::latest_offer_for_lot(&mut conn, lot.id).await? {
            Some(offer) => {
                let bids = db::market::list_bids(&mut conn, offer.id).await?;
                (
                    market::winning_lot_bid(&bids).map(|bid| bid.bid),
                    Some(offer.limit_date),
                )
            }
            None => (None, None),
        };
        result.push(TraderLotView {
            lot: view(lot, &checkpoints),
            current_price,
            limit_date,
        });
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct UpdateStatePayload {
    lot_id: Uuid,
    state: State,
}

/// PATCH /lots/state
async fn update_state(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<UpdateStatePayload>,
) -> Result<Json<Lot>> {
    let mut conn = state.pool.acquire().await?;
    let mut lot = db::lots::find(&mut conn, payload.lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    lot.state = payload.state;
    db::lots::update(&mut conn, &lot).await?;
    Ok(Json(lot))
}

#[derive(Debug, Deserialize)]
struct AddTrafficManagerPayload {
    lot_id: Uuid,
    traffic_manager_id: Uuid,
}

/// POST /lots/traffic_manager - 交通管理者に預ける（pending になる）
async fn add_traffic_manager(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<AddTrafficManagerPayload>,
) -> Result<Json<Lot>> {
    let mut conn = state.pool.acquire().await?;
    let mut lot = db::lots::find(&mut conn, payload.lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    db::users::find_with_role(&mut conn, payload.traffic_manager_id, Role::TrafficManager)
        .await?
        .ok_or_else(|| AppError::not_found("Traffic manager"))?;

    lot.traffic_manager_id = Some(payload.traffic_manager_id);
    lot.state = State::Pending;
    db::lots::update(&mut conn, &lot).await?;
    Ok(Json(lot))
}

#[derive(Debug, Deserialize)]
struct LotTractorPayload {
    lot_id: Uuid,
    tractor_id: Uuid,
}

/// POST /lots/compatible - 空き容量と積荷の種類だけを見る
async fn check_compatible(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<LotTractorPayload>,
) -> Result<Json<Value>> {
    let mut conn = state.pool.acquire().await?;
    let lot = db::lots::find(&mut conn, payload.lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    let tractor = db::tractors::find(&mut conn, payload.tractor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;

    dispatch::fits(&lot, &tractor).map_err(|reason| AppError::BadRequest(reason.to_string()))?;
    Ok(Json(json!({ "message": "Lot is compatible with the tractor" })))
}

/// GET /lots/tractors/compatible/{traffic_manager_id}/{lot_id}
async fn compatible_tractors(
    AxumState(state): AxumState<Arc<AppState>>,
    Path((traffic_manager_id, lot_id)): Path<(String, String)>,
) -> Result<Json<Vec<Tractor>>> {
    let traffic_manager_id = parse_id(&traffic_manager_id, "traffic manager id")?;
    let lot_id = parse_id(&lot_id, "lot id")?;

    let mut conn = state.pool.acquire().await?;
    let lot = db::lots::find(&mut conn, lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    Ok(Json(
        dispatch::compatible_tractors(&mut conn, traffic_manager_id, &lot).await?,
    ))
}

/// PUT /lots/assign - トラクターに割り当てる
async fn assign_tractor(
    AxumState(state): AxumState<Arc<AppState>>,
    ApiJson(payload): ApiJson<LotTractorPayload>,
) -> Result<Json<LotView>> {
    let mut tx = state.pool.begin().await?;
    let today = db::simulation::current_date(&mut tx).await?;
    let lot = dispatch::assign_tractor(&mut tx, payload.lot_id, payload.tractor_id, today).await?;
    let checkpoints = db::checkpoints::map(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(view(lot, &checkpoints)))
}

#[derive(Debug, Serialize)]
struct TraderAssignment {
    lot: Lot,
    offer: Offer,
}

/// POST /lots/assign/{lot_id}/trader - 一番空いているトレーダーに預けて出品する
async fn assign_trader(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(lot_id): Path<String>,
    ApiJson(payload): ApiJson<LimitDatePayload>,
) -> Result<Json<TraderAssignment>> {
    let lot_id = parse_id(&lot_id, "lot id")?;
    let mut tx = state.pool.begin().await?;
    let today = db::simulation::current_date(&mut tx).await?;
    let (lot, offer) = dispatch::assign_trader(&mut tx, lot_id, payload.limit_date, today).await?;
    tx.commit().await?;

    info!(lot_id = %lot.id, offer_id = %offer.id, "lot put on the market through a trader");
    Ok(Json(TraderAssignment { lot, offer }))
}

/// GET /lots/bids/{owner_id} - ロットの出品に出した入札
async fn bids_of_owner(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<Bid>>> {
    let owner_id = parse_id(&owner_id, "owner id")?;
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::market::list_lot_bids_by_owner(&mut conn, owner_id).await?))
}
