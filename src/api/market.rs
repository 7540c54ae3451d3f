use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState};
use crate::db::market::OfferKind;
use crate::error::{AppError, Result};
use crate::market::{NewBid, Settlement};
use crate::models::{Bid, Offer, OfferView};
use crate::{db, market};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/stock_exchange/lot_offers",
            get(list_lot_offers).post(create_lot_offer),
        )
        .route(
            "/stock_exchange/tractor_offers",
            get(list_tractor_offers).post(create_tractor_offer),
        )
        .route("/stock_exchange/bids", post(place_bid))
        .route("/stock_exchange/offers/{id}/bids", get(bids_of_offer))
        .route("/stock_exchange/return_from_market", post(return_from_market))
}

#[derive(Debug, Deserialize)]
struct LotOfferPayload {
    lot_id: Uuid,
    limit_date: NaiveDate,
}

/// POST /stock_exchange/lot_offers
async fn create_lot_offer(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LotOfferPayload>,
) -> Result<(StatusCode, Json<Offer>)> {
    let mut tx = state.pool.begin().await?;
    let today = db::simulation::current_date(&mut tx).await?;
    let offer = market::publish_lot(&mut tx, payload.lot_id, payload.limit_date, today).await?;
    tx.commit().await?;

    info!(offer_id = %offer.id, lot_id = %payload.lot_id, limit_date = %offer.limit_date, "lot offered");
    Ok((StatusCode::CREATED, Json(offer)))
}

#[derive(Debug, Deserialize)]
struct TractorOfferPayload {
    tractor_id: Uuid,
    limit_date: NaiveDate,
}

/// POST /stock_exchange/tractor_offers
async fn create_tractor_offer(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<TractorOfferPayload>,
) -> Result<(StatusCode, Json<Offer>)> {
    let mut tx = state.pool.begin().await?;
    let today = db::simulation::current_date(&mut tx).await?;
    let offer = market::publish_tractor(&mut tx, payload.tractor_id, payload.limit_date, today).await?;
    tx.commit().await?;

    info!(offer_id = %offer.id, tractor_id = %payload.tractor_id, limit_date = %offer.limit_date, "tractor offered");
    Ok((StatusCode::CREATED, Json(offer)))
}

/// 出品に対象の資産を埋め込む
async fn offer_views(state: &AppState, kind: OfferKind) -> Result<Vec<OfferView>> {
    let mut conn = state.pool.acquire().await?;
    let offers = db::market::list_offers(&mut conn, kind).await?;

    let mut views = Vec::with_capacity(offers.len());
    for offer in offers {
        let lot = match offer.lot_id {
            Some(id) => db::lots::find(&mut conn, id).await?,
            None => None,
        };
        let tractor = match offer.tractor_id {
            Some(id) => db::tractors::find(&mut conn, id).await?,
            None => None,
        };
        views.push(OfferView { offer, lot, tractor });
    }
    Ok(views)
}

/// GET /stock_exchange/lot_offers
async fn list_lot_offers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OfferView>>> {
    Ok(Json(offer_views(&state, OfferKind::Lot).await?))
}

/// GET /stock_exchange/tractor_offers
async fn list_tractor_offers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OfferView>>> {
    Ok(Json(offer_views(&state, OfferKind::Tractor).await?))
}

#[derive(Debug, Deserialize)]
struct BidPayload {
    offer_id: Uuid,
    owner_id: Uuid,
    bid: Decimal,
    volume: Option<Decimal>,
}

/// POST /stock_exchange/bids
async fn place_bid(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<BidPayload>,
) -> Result<(StatusCode, Json<Bid>)> {
    let mut tx = state.pool.begin().await?;
    let today = db::simulation::current_date(&mut tx).await?;
    let bid = market::place_bid(
        &mut tx,
        NewBid {
            offer_id: payload.offer_id,
            owner_id: payload.owner_id,
            bid: payload.bid,
            volume: payload.volume,
        },
        today,
    )
    .await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

/// GET /stock_exchange/offers/{id}/bids
async fn bids_of_offer(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Vec<Bid>>> {
    let id = parse_id(&id, "offer id")?;
    let mut conn = state.pool.acquire().await?;
    db::market::find_offer(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;
    Ok(Json(db::market::list_bids(&mut conn, id).await?))
}

/// POST /stock_exchange/return_from_market - 日付は進めずに期限切れの出品を締める
async fn return_from_market(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Settlement>>> {
    Ok(Json(state.engine.return_from_market().await?))
}
