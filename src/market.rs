// =============================================================================
// 取引所（ストックエクスチェンジ）
// =============================================================================
//
// ロットとトラクターを出品し、入札を受け付け、期限が来たら落札者を決める。
//
// 【落札ルール】
// - ロットの出品: 一番安い運賃の入札が勝つ（同額なら先に入札した方）
// - トラクターの出品: 空き容量に収まる入札のうち、一番大きい volume が勝つ
//   （同じ volume なら高い bid、それも同じなら先に入札した方）
//
// 【期限切れの処理（return from market）】
// limit_date < シミュレーション日付 になった open の出品について
// 1. 落札者を決めて offer を sold / unsold にする
// 2. 出品中(on_market)やトレーダー預かり(at_trader)の資産を returned_from_market に戻す
// =============================================================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::models::{Bid, Offer, OfferStatus, State};

/// ロット出品の落札者: 最安値、同額なら先着
pub fn winning_lot_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().fold(None, |best: Option<&Bid>, bid| match best {
        Some(current) if current.bid <= bid.bid => Some(current),
        _ => Some(bid),
    })
}

/// トラクター出品の落札者: 空き容量に収まる最大 volume、同じなら高値、それも同じなら先着
pub fn winning_tractor_bid(bids: &[Bid], remaining_volume: Decimal) -> Option<&Bid> {
    bids.iter()
        .filter(|bid| {
            bid.volume
                .is_some_and(|volume| volume > Decimal::ZERO && volume <= remaining_volume)
        })
        .fold(None, |best: Option<&Bid>, bid| match best {
            Some(current) if (current.volume, current.bid) >= (bid.volume, bid.bid) => Some(current),
            _ => Some(bid),
        })
}

/// 期限切れ出品1件の精算結果
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub offer_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub tractor_id: Option<Uuid>,
    pub status: OfferStatus,
    pub winning_bid: Option<Bid>,
}

/// 期限切れの出品をすべて精算する
pub async fn return_from_market(conn: &mut SqliteConnection, today: NaiveDate) -> Result<Vec<Settlement>> {
    let expired = db::market::list_expired_open(&mut *conn, today).await?;
    let mut settlements = Vec::with_capacity(expired.len());

    for offer in expired {
        let bids = db::market::list_bids(&mut *conn, offer.id).await?;

        let winning_bid = if let Some(lot_id) = offer.lot_id {
            match db::lots::find(&mut *conn, lot_id).await? {
                Some(mut lot) => {
                    if returns_from_market(lot.state) {
                        lot.state = State::ReturnedFromMarket;
                        db::lots::update(&mut *conn, &lot).await?;
                    }
                    winning_lot_bid(&bids).cloned()
                }
                None => {
                    warn!(offer_id = %offer.id, %lot_id, "offered lot no longer exists");
                    None
                }
            }
        } else if let Some(tractor_id) = offer.tractor_id {
            match db::tractors::find(&mut *conn, tractor_id).await? {
                Some(mut tractor) => {
                    let winner = winning_tractor_bid(&bids, tractor.remaining_volume()).cloned();
                    if returns_from_market(tractor.state) {
                        tractor.state = State::ReturnedFromMarket;
                        db::tractors::update(&mut *conn, &tractor).await?;
                    }
                    winner
                }
                None => {
                    warn!(offer_id = %offer.id, %tractor_id, "offered tractor no longer exists");
                    None
                }
            }
        } else {
            None
        };

        let status = if winning_bid.is_some() {
            OfferStatus::Sold
        } else {
            OfferStatus::Unsold
        };
        db::market::close_offer(&mut *conn, offer.id, status, winning_bid.as_ref().map(|b| b.id)).await?;

        info!(
            offer_id = %offer.id,
            status = %status,
            bids = bids.len(),
            "offer returned from market"
        );

        settlements.push(Settlement {
            offer_id: offer.id,
            lot_id: offer.lot_id,
            tractor_id: offer.tractor_id,
            status,
            winning_bid,
        });
    }

    Ok(settlements)
}

fn returns_from_market(state: State) -> bool {
    matches!(state, State::OnMarket | State::AtTrader)
}

// =============================================================================
// 出品と入札
// =============================================================================

fn check_limit_date(limit_date: NaiveDate, today: NaiveDate) -> Result<()> {
    if limit_date < today {
        return Err(AppError::BadRequest(
            "limit_date must not be before the simulation date".to_string(),
        ));
    }
    Ok(())
}

fn check_listable(state: State, what: &str) -> Result<()> {
    match state {
        State::InTransit | State::Archived => Err(AppError::BadRequest(format!(
            "{what} cannot be put on the market while {state}"
        ))),
        State::OnMarket => Err(AppError::Conflict(format!("{what} is already on the market"))),
        _ => Ok(()),
    }
}

/// ロットを出品する（ロットは on_market になる）
pub async fn publish_lot(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    limit_date: NaiveDate,
    today: NaiveDate,
) -> Result<Offer> {
    check_limit_date(limit_date, today)?;

    let mut lot = db::lots::find(&mut *conn, lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    check_listable(lot.state, "Lot")?;

    lot.state = State::OnMarket;
    db::lots::update(&mut *conn, &lot).await?;

    let offer = Offer {
        id: Uuid::new_v4(),
        lot_id: Some(lot_id),
        tractor_id: None,
        limit_date,
        created_at: today,
        status: OfferStatus::Open,
        winning_bid_id: None,
    };
    db::market::insert_offer(conn, &offer).await?;
    Ok(offer)
}

/// トラクターを出品する（トラクターは on_market になる）
pub async fn publish_tractor(
    conn: &mut SqliteConnection,
    tractor_id: Uuid,
    limit_date: NaiveDate,
    today: NaiveDate,
) -> Result<Offer> {
    check_limit_date(limit_date, today)?;

    let mut tractor = db::tractors::find(&mut *conn, tractor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;
    check_listable(tractor.state, "Tractor")?;

    tractor.state = State::OnMarket;
    db::tractors::update(&mut *conn, &tractor).await?;

    let offer = Offer {
        id: Uuid::new_v4(),
        lot_id: None,
        tractor_id: Some(tractor_id),
        limit_date,
        created_at: today,
        status: OfferStatus::Open,
        winning_bid_id: None,
    };
    db::market::insert_offer(conn, &offer).await?;
    Ok(offer)
}

/// 入札内容
#[derive(Debug, Clone)]
pub struct NewBid {
    pub offer_id: Uuid,
    pub owner_id: Uuid,
    pub bid: Decimal,
    pub volume: Option<Decimal>,
}

/// 入札する
///
/// - 出品が open で、期限（limit_date 当日まで）を過ぎていないこと
/// - bid は正の値
/// - トラクターの出品には正の volume が必要
pub async fn place_bid(conn: &mut SqliteConnection, new_bid: NewBid, today: NaiveDate) -> Result<Bid> {
    let offer = db::market::find_offer(&mut *conn, new_bid.offer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;

    if offer.status != OfferStatus::Open || offer.limit_date < today {
        return Err(AppError::BadRequest("Offer is closed".to_string()));
    }
    if new_bid.bid <= Decimal::ZERO {
        return Err(AppError::BadRequest("bid must be positive".to_string()));
    }
    if offer.tractor_id.is_some() && !new_bid.volume.is_some_and(|v| v > Decimal::ZERO) {
        return Err(AppError::BadRequest(
            "volume is required when bidding on a tractor".to_string(),
        ));
    }
    if db::users::find(&mut *conn, new_bid.owner_id).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let bid = Bid {
        id: Uuid::new_v4(),
        offer_id: offer.id,
        owner_id: new_bid.owner_id,
        bid: new_bid.bid,
        volume: new_bid.volume,
        created_at: today,
    };
    db::market::insert_bid(conn, &bid).await?;
    Ok(bid)
}
