use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{opt_uuid_text, parse_decimal, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::{AppError, Result};
use crate::models::{State, Tractor};

const COLUMNS: &str = "id, name, resource_type, max_volume, current_volume, state, \
    current_checkpoint_id, route_id, owner_id, traffic_manager_id, trader_id, min_price_by_km, created_at";

#[derive(sqlx::FromRow)]
struct TractorRow {
    id: String,
    name: String,
    resource_type: String,
    max_volume: String,
    current_volume: String,
    state: String,
    current_checkpoint_id: Option<String>,
    route_id: Option<String>,
    owner_id: Option<String>,
    traffic_manager_id: Option<String>,
    trader_id: Option<String>,
    min_price_by_km: String,
    created_at: NaiveDate,
}

impl TryFrom<TractorRow> for Tractor {
    type Error = AppError;

    fn try_from(row: TractorRow) -> Result<Self> {
        Ok(Tractor {
            id: parse_uuid(&row.id)?,
            name: row.name,
            resource_type: parse_enum(&row.resource_type)?,
            max_volume: parse_decimal(&row.max_volume)?,
            current_volume: parse_decimal(&row.current_volume)?,
            state: parse_enum(&row.state)?,
            current_checkpoint_id: parse_opt_uuid(row.current_checkpoint_id)?,
            route_id: parse_opt_uuid(row.route_id)?,
            owner_id: parse_opt_uuid(row.owner_id)?,
            traffic_manager_id: parse_opt_uuid(row.traffic_manager_id)?,
            trader_id: parse_opt_uuid(row.trader_id)?,
            min_price_by_km: parse_decimal(&row.min_price_by_km)?,
            created_at: row.created_at,
        })
    }
}

/// 一覧の絞り込み条件
#[derive(Debug, Clone, Copy)]
pub enum TractorFilter {
    All,
    Owner(Uuid),
    TrafficManager(Uuid),
    State(State),
    Route(Uuid),
}

pub async fn insert(conn: &mut SqliteConnection, tractor: &Tractor) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO tractors ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(tractor.id.to_string())
    .bind(&tractor.name)
    .bind(tractor.resource_type.as_str())
    .bind(tractor.max_volume.to_string())
    .bind(tractor.current_volume.to_string())
    .bind(tractor.state.as_str())
    .bind(opt_uuid_text(tractor.current_checkpoint_id))
    .bind(opt_uuid_text(tractor.route_id))
    .bind(opt_uuid_text(tractor.owner_id))
    .bind(opt_uuid_text(tractor.traffic_manager_id))
    .bind(opt_uuid_text(tractor.trader_id))
    .bind(tractor.min_price_by_km.to_string())
    .bind(tractor.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Tractor>> {
    let row: Option<TractorRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM tractors WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(conn)
            .await?;
    row.map(Tractor::try_from).transpose()
}

pub async fn list(conn: &mut SqliteConnection, filter: TractorFilter) -> Result<Vec<Tractor>> {
    let (condition, value) = match filter {
        TractorFilter::All => ("1 = 1", None),
        TractorFilter::Owner(id) => ("owner_id = ?", Some(id.to_string())),
        TractorFilter::TrafficManager(id) => ("traffic_manager_id = ?", Some(id.to_string())),
        TractorFilter::State(state) => ("state = ?", Some(state.as_str().to_string())),
        TractorFilter::Route(id) => ("route_id = ?", Some(id.to_string())),
    };

    let sql = format!("SELECT {COLUMNS} FROM tractors WHERE {condition} ORDER BY id");
    let mut query = sqlx::query_as::<_, TractorRow>(&sql);
    if let Some(value) = value {
        query = query.bind(value);
    }
    let rows = query.fetch_all(conn).await?;
    rows.into_iter().map(Tractor::try_from).collect()
}

/// 行全体を書き戻す
pub async fn update(conn: &mut SqliteConnection, tractor: &Tractor) -> Result<()> {
    sqlx::query(
        "UPDATE tractors SET name = ?, resource_type = ?, max_volume = ?, current_volume = ?, state = ?, \
         current_checkpoint_id = ?, route_id = ?, owner_id = ?, traffic_manager_id = ?, trader_id = ?, \
         min_price_by_km = ? WHERE id = ?",
    )
    .bind(&tractor.name)
    .bind(tractor.resource_type.as_str())
    .bind(tractor.max_volume.to_string())
    .bind(tractor.current_volume.to_string())
    .bind(tractor.state.as_str())
    .bind(opt_uuid_text(tractor.current_checkpoint_id))
    .bind(opt_uuid_text(tractor.route_id))
    .bind(opt_uuid_text(tractor.owner_id))
    .bind(opt_uuid_text(tractor.traffic_manager_id))
    .bind(opt_uuid_text(tractor.trader_id))
    .bind(tractor.min_price_by_km.to_string())
    .bind(tractor.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}
