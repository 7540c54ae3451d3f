use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{opt_uuid_text, parse_decimal, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::{AppError, Result};
use crate::models::{Lot, State};

const COLUMNS: &str = "id, resource_type, volume, state, start_checkpoint_id, end_checkpoint_id, \
    current_checkpoint_id, tractor_id, in_tractor, owner_id, traffic_manager_id, trader_id, \
    max_price_by_km, created_at";

#[derive(sqlx::FromRow)]
struct LotRow {
    id: String,
    resource_type: String,
    volume: String,
    state: String,
    start_checkpoint_id: String,
    end_checkpoint_id: String,
    current_checkpoint_id: Option<String>,
    tractor_id: Option<String>,
    in_tractor: bool,
    owner_id: String,
    traffic_manager_id: Option<String>,
    trader_id: Option<String>,
    max_price_by_km: String,
    created_at: NaiveDate,
}

impl TryFrom<LotRow> for Lot {
    type Error = AppError;

    fn try_from(row: LotRow) -> Result<Self> {
        Ok(Lot {
            id: parse_uuid(&row.id)?,
            resource_type: parse_enum(&row.resource_type)?,
            volume: parse_decimal(&row.volume)?,
            state: parse_enum(&row.state)?,
            start_checkpoint_id: parse_uuid(&row.start_checkpoint_id)?,
            end_checkpoint_id: parse_uuid(&row.end_checkpoint_id)?,
            current_checkpoint_id: parse_opt_uuid(row.current_checkpoint_id)?,
            tractor_id: parse_opt_uuid(row.tractor_id)?,
            in_tractor: row.in_tractor,
            owner_id: parse_uuid(&row.owner_id)?,
            traffic_manager_id: parse_opt_uuid(row.traffic_manager_id)?,
            trader_id: parse_opt_uuid(row.trader_id)?,
            max_price_by_km: parse_decimal(&row.max_price_by_km)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LotFilter {
    All,
    Owner(Uuid),
    TrafficManager(Uuid),
    Trader(Uuid),
    Tractor(Uuid),
    /// トラクターに積まれている（in_tractor = 1）ロットだけ
    LoadedOn(Uuid),
}

pub async fn insert(conn: &mut SqliteConnection, lot: &Lot) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO lots ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(lot.id.to_string())
    .bind(lot.resource_type.as_str())
    .bind(lot.volume.to_string())
    .bind(lot.state.as_str())
    .bind(lot.start_checkpoint_id.to_string())
    .bind(lot.end_checkpoint_id.to_string())
    .bind(opt_uuid_text(lot.current_checkpoint_id))
    .bind(opt_uuid_text(lot.tractor_id))
    .bind(lot.in_tractor)
    .bind(lot.owner_id.to_string())
    .bind(opt_uuid_text(lot.traffic_manager_id))
    .bind(opt_uuid_text(lot.trader_id))
    .bind(lot.max_price_by_km.to_string())
    .bind(lot.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Lot>> {
    let row: Option<LotRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM lots WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await?;
    row.map(Lot::try_from).transpose()
}

pub async fn list(conn: &mut SqliteConnection, filter: LotFilter) -> Result<Vec<Lot>> {
    let (condition, value) = match filter {
        LotFilter::All => ("1 = 1", None),
        LotFilter::Owner(id) => ("owner_id = ?", Some(id)),
        LotFilter::TrafficManager(id) => ("traffic_manager_id = ?", Some(id)),
        LotFilter::Trader(id) => ("trader_id = ?", Some(id)),
        LotFilter::Tractor(id) => ("tractor_id = ?", Some(id)),
        LotFilter::LoadedOn(id) => ("tractor_id = ? AND in_tractor = 1", Some(id)),
    };

    let sql = format!("SELECT {COLUMNS} FROM lots WHERE {condition} ORDER BY created_at, id");
    let mut query = sqlx::query_as::<_, LotRow>(&sql);
    if let Some(value) = value {
        query = query.bind(value.to_string());
    }
    let rows = query.fetch_all(conn).await?;
    rows.into_iter().map(Lot::try_from).collect()
}

pub async fn update(conn: &mut SqliteConnection, lot: &Lot) -> Result<()> {
    sqlx::query(
        "UPDATE lots SET resource_type = ?, volume = ?, state = ?, start_checkpoint_id = ?, \
         end_checkpoint_id = ?, current_checkpoint_id = ?, tractor_id = ?, in_tractor = ?, owner_id = ?, \
         traffic_manager_id = ?, trader_id = ?, max_price_by_km = ? WHERE id = ?",
    )
    .bind(lot.resource_type.as_str())
    .bind(lot.volume.to_string())
    .bind(lot.state.as_str())
    .bind(lot.start_checkpoint_id.to_string())
    .bind(lot.end_checkpoint_id.to_string())
    .bind(opt_uuid_text(lot.current_checkpoint_id))
    .bind(opt_uuid_text(lot.tractor_id))
    .bind(lot.in_tractor)
    .bind(lot.owner_id.to_string())
    .bind(opt_uuid_text(lot.traffic_manager_id))
    .bind(opt_uuid_text(lot.trader_id))
    .bind(lot.max_price_by_km.to_string())
    .bind(lot.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM lots WHERE id = ?")
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// トレーダーごとの at_trader ロット数
pub async fn count_by_trader_in_state(
    conn: &mut SqliteConnection,
    state: State,
) -> Result<HashMap<Uuid, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT trader_id, COUNT(*) FROM lots WHERE state = ? AND trader_id IS NOT NULL GROUP BY trader_id",
    )
    .bind(state.as_str())
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|(trader_id, count)| Ok((parse_uuid(&trader_id)?, count)))
        .collect()
}
