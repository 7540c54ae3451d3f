use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{opt_uuid_text, parse_decimal, parse_enum, parse_opt_decimal, parse_opt_uuid, parse_uuid};
use crate::error::{AppError, Result};
use crate::models::{Bid, Offer, OfferStatus};

const OFFER_COLUMNS: &str = "id, lot_id, tractor_id, limit_date, created_at, status, winning_bid_id";
const BID_COLUMNS: &str = "id, offer_id, owner_id, bid, volume, created_at";

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: String,
    lot_id: Option<String>,
    tractor_id: Option<String>,
    limit_date: NaiveDate,
    created_at: NaiveDate,
    status: String,
    winning_bid_id: Option<String>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = AppError;

    fn try_from(row: OfferRow) -> Result<Self> {
        Ok(Offer {
            id: parse_uuid(&row.id)?,
            lot_id: parse_opt_uuid(row.lot_id)?,
            tractor_id: parse_opt_uuid(row.tractor_id)?,
            limit_date: row.limit_date,
            created_at: row.created_at,
            status: parse_enum(&row.status)?,
            winning_bid_id: parse_opt_uuid(row.winning_bid_id)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BidRow {
    id: String,
    offer_id: String,
    owner_id: String,
    bid: String,
    volume: Option<String>,
    created_at: NaiveDate,
}

impl TryFrom<BidRow> for Bid {
    type Error = AppError;

    fn try_from(row: BidRow) -> Result<Self> {
        Ok(Bid {
            id: parse_uuid(&row.id)?,
            offer_id: parse_uuid(&row.offer_id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            bid: parse_decimal(&row.bid)?,
            volume: parse_opt_decimal(row.volume)?,
            created_at: row.created_at,
        })
    }
}

/// 出品対象の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    Lot,
    Tractor,
}

// --- offers ---

pub async fn insert_offer(conn: &mut SqliteConnection, offer: &Offer) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO offers ({OFFER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(offer.id.to_string())
    .bind(opt_uuid_text(offer.lot_id))
    .bind(opt_uuid_text(offer.tractor_id))
    .bind(offer.limit_date)
    .bind(offer.created_at)
    .bind(offer.status.as_str())
    .bind(opt_uuid_text(offer.winning_bid_id))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_offer(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Offer>> {
    let row: Option<OfferRow> =
        sqlx::query_as(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(conn)
            .await?;
    row.map(Offer::try_from).transpose()
}

/// ロットの最新の出品
pub async fn latest_offer_for_lot(conn: &mut SqliteConnection, lot_id: Uuid) -> Result<Option<Offer>> {
    let row: Option<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE lot_id = ? ORDER BY rowid DESC LIMIT 1"
    ))
    .bind(lot_id.to_string())
    .fetch_optional(conn)
    .await?;
    row.map(Offer::try_from).transpose()
}

pub async fn list_offers(conn: &mut SqliteConnection, kind: OfferKind) -> Result<Vec<Offer>> {
    let condition = match kind {
        OfferKind::Lot => "lot_id IS NOT NULL",
        OfferKind::Tractor => "tractor_id IS NOT NULL",
    };
    let rows: Vec<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE {condition} ORDER BY rowid"
    ))
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Offer::try_from).collect()
}

/// 期限切れ（limit_date < today）でまだ open の出品
pub async fn list_expired_open(conn: &mut SqliteConnection, today: NaiveDate) -> Result<Vec<Offer>> {
    let rows: Vec<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE status = ? AND limit_date < ? ORDER BY rowid"
    ))
    .bind(OfferStatus::Open.as_str())
    .bind(today)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Offer::try_from).collect()
}

pub async fn close_offer(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: OfferStatus,
    winning_bid_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query("UPDATE offers SET status = ?, winning_bid_id = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(opt_uuid_text(winning_bid_id))
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

// --- bids ---

pub async fn insert_bid(conn: &mut SqliteConnection, bid: &Bid) -> Result<()> {
    sqlx::query(&format!("INSERT INTO bids ({BID_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
        .bind(bid.id.to_string())
        .bind(bid.offer_id.to_string())
        .bind(bid.owner_id.to_string())
        .bind(bid.bid.to_string())
        .bind(bid.volume.map(|v| v.to_string()))
        .bind(bid.created_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// 出品への入札を入札順に
pub async fn list_bids(conn: &mut SqliteConnection, offer_id: Uuid) -> Result<Vec<Bid>> {
    let rows: Vec<BidRow> = sqlx::query_as(&format!(
        "SELECT {BID_COLUMNS} FROM bids WHERE offer_id = ? ORDER BY rowid"
    ))
    .bind(offer_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Bid::try_from).collect()
}

/// ユーザーがロットの出品に出した入札
pub async fn list_lot_bids_by_owner(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<Vec<Bid>> {
    let rows: Vec<BidRow> = sqlx::query_as(
        "SELECT bids.id, bids.offer_id, bids.owner_id, bids.bid, bids.volume, bids.created_at \
         FROM bids JOIN offers ON offers.id = bids.offer_id \
         WHERE bids.owner_id = ? AND offers.lot_id IS NOT NULL ORDER BY bids.rowid",
    )
    .bind(owner_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Bid::try_from).collect()
}
