use std::collections::HashMap;

use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::error::{AppError, Result};
use crate::geography::City;
use crate::models::Checkpoint;

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: String,
    name: String,
    country: String,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = AppError;

    fn try_from(row: CheckpointRow) -> Result<Self> {
        Ok(Checkpoint {
            id: parse_uuid(&row.id)?,
            name: parse_enum(&row.name)?,
            country: parse_enum(&row.country)?,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, checkpoint: &Checkpoint) -> Result<()> {
    sqlx::query("INSERT INTO checkpoints (id, name, country) VALUES (?, ?, ?)")
        .bind(checkpoint.id.to_string())
        .bind(checkpoint.name.as_str())
        .bind(checkpoint.country.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn find(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Checkpoint>> {
    let row: Option<CheckpointRow> =
        sqlx::query_as("SELECT id, name, country FROM checkpoints WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(conn)
            .await?;
    row.map(Checkpoint::try_from).transpose()
}

pub async fn find_by_city(conn: &mut SqliteConnection, city: City) -> Result<Option<Checkpoint>> {
    let row: Option<CheckpointRow> =
        sqlx::query_as("SELECT id, name, country FROM checkpoints WHERE name = ?")
            .bind(city.as_str())
            .fetch_optional(conn)
            .await?;
    row.map(Checkpoint::try_from).transpose()
}

/// 登録順に全件
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Checkpoint>> {
    let rows: Vec<CheckpointRow> =
        sqlx::query_as("SELECT id, name, country FROM checkpoints ORDER BY rowid")
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(Checkpoint::try_from).collect()
}

/// ID -> チェックポイント。レスポンスに埋め込むときに使う
pub async fn map(conn: &mut SqliteConnection) -> Result<HashMap<Uuid, Checkpoint>> {
    Ok(list(conn)
        .await?
        .into_iter()
        .map(|checkpoint| (checkpoint.id, checkpoint))
        .collect())
}
