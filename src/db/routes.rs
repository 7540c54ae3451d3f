use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::{AppError, Result};
use crate::models::{Route, RouteCheckpoint};

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: String,
    name: String,
    traffic_manager_id: String,
    created_at: NaiveDate,
}

impl TryFrom<RouteRow> for Route {
    type Error = AppError;

    fn try_from(row: RouteRow) -> Result<Self> {
        Ok(Route {
            id: parse_uuid(&row.id)?,
            name: row.name,
            traffic_manager_id: parse_uuid(&row.traffic_manager_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RouteCheckpointRow {
    id: String,
    route_id: String,
    checkpoint_id: String,
    position: i64,
}

impl TryFrom<RouteCheckpointRow> for RouteCheckpoint {
    type Error = AppError;

    fn try_from(row: RouteCheckpointRow) -> Result<Self> {
        Ok(RouteCheckpoint {
            id: parse_uuid(&row.id)?,
            route_id: parse_uuid(&row.route_id)?,
            checkpoint_id: parse_uuid(&row.checkpoint_id)?,
            position: row.position,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, route: &Route) -> Result<()> {
    sqlx::query("INSERT INTO routes (id, name, traffic_manager_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(route.id.to_string())
        .bind(&route.name)
        .bind(route.traffic_manager_id.to_string())
        .bind(route.created_at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_checkpoint(conn: &mut SqliteConnection, stop: &RouteCheckpoint) -> Result<()> {
    sqlx::query(
        "INSERT INTO route_checkpoints (id, route_id, checkpoint_id, position) VALUES (?, ?, ?, ?)",
    )
    .bind(stop.id.to_string())
    .bind(stop.route_id.to_string())
    .bind(stop.checkpoint_id.to_string())
    .bind(stop.position)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Route>> {
    let row: Option<RouteRow> = sqlx::query_as(
        "SELECT id, name, traffic_manager_id, created_at FROM routes WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?;
    row.map(Route::try_from).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Route>> {
    let rows: Vec<RouteRow> = sqlx::query_as(
        "SELECT id, name, traffic_manager_id, created_at FROM routes ORDER BY rowid",
    )
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Route::try_from).collect()
}

pub async fn list_by_traffic_manager(
    conn: &mut SqliteConnection,
    traffic_manager_id: Uuid,
) -> Result<Vec<Route>> {
    let rows: Vec<RouteRow> = sqlx::query_as(
        "SELECT id, name, traffic_manager_id, created_at FROM routes WHERE traffic_manager_id = ? ORDER BY rowid",
    )
    .bind(traffic_manager_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Route::try_from).collect()
}

/// ルートのチェックポイントを position 昇順で
pub async fn checkpoints_of(conn: &mut SqliteConnection, route_id: Uuid) -> Result<Vec<RouteCheckpoint>> {
    let rows: Vec<RouteCheckpointRow> = sqlx::query_as(
        "SELECT id, route_id, checkpoint_id, position FROM route_checkpoints WHERE route_id = ? ORDER BY position",
    )
    .bind(route_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(RouteCheckpoint::try_from).collect()
}

/// ルート上でそのチェックポイントに当たる地点（同じ都市を複数回通るなら最初のもの）
pub async fn find_checkpoint(
    conn: &mut SqliteConnection,
    route_id: Uuid,
    checkpoint_id: Uuid,
) -> Result<Option<RouteCheckpoint>> {
    let row: Option<RouteCheckpointRow> = sqlx::query_as(
        "SELECT id, route_id, checkpoint_id, position FROM route_checkpoints \
         WHERE route_id = ? AND checkpoint_id = ? ORDER BY position LIMIT 1",
    )
    .bind(route_id.to_string())
    .bind(checkpoint_id.to_string())
    .fetch_optional(conn)
    .await?;
    row.map(RouteCheckpoint::try_from).transpose()
}
