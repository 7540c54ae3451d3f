use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::{AppError, Result};
use crate::models::Simulation;

#[derive(sqlx::FromRow)]
struct SimulationRow {
    id: String,
    simulation_date: NaiveDate,
}

pub async fn get(conn: &mut SqliteConnection) -> Result<Option<Simulation>> {
    let row: Option<SimulationRow> =
        sqlx::query_as("SELECT id, simulation_date FROM simulation ORDER BY rowid LIMIT 1")
            .fetch_optional(conn)
            .await?;
    row.map(|row| {
        Ok(Simulation {
            id: parse_uuid(&row.id)?,
            simulation_date: row.simulation_date,
        })
    })
    .transpose()
}

/// 現在のシミュレーション日付。行が無ければ 500 扱い
pub async fn current_date(conn: &mut SqliteConnection) -> Result<NaiveDate> {
    get(conn)
        .await?
        .map(|simulation| simulation.simulation_date)
        .ok_or_else(|| AppError::Corrupt("Unable to fetch simulation date".to_string()))
}

/// simulation 行を確保する（無ければ start で作成）
pub async fn ensure(conn: &mut SqliteConnection, start: NaiveDate) -> Result<Simulation> {
    if let Some(existing) = get(&mut *conn).await? {
        return Ok(existing);
    }

    let simulation = Simulation {
        id: Uuid::new_v4(),
        simulation_date: start,
    };
    sqlx::query("INSERT INTO simulation (id, simulation_date) VALUES (?, ?)")
        .bind(simulation.id.to_string())
        .bind(simulation.simulation_date)
        .execute(conn)
        .await?;
    Ok(simulation)
}

pub async fn set_date(conn: &mut SqliteConnection, id: Uuid, date: NaiveDate) -> Result<()> {
    sqlx::query("UPDATE simulation SET simulation_date = ? WHERE id = ?")
        .bind(date)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
