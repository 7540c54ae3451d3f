use chrono::NaiveDate;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{opt_uuid_text, parse_enum, parse_opt_uuid, parse_uuid};
use crate::error::{AppError, Result};
use crate::models::Transaction;

const COLUMNS: &str = "id, transaction_type, lot_id, tractor_id, route_id, checkpoint_id, \
    route_checkpoint_id, traffic_manager_id, created_at, executed_at";

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    transaction_type: String,
    lot_id: String,
    tractor_id: String,
    route_id: String,
    checkpoint_id: String,
    route_checkpoint_id: String,
    traffic_manager_id: Option<String>,
    created_at: NaiveDate,
    executed_at: Option<NaiveDate>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Transaction {
            id: parse_uuid(&row.id)?,
            transaction_type: parse_enum(&row.transaction_type)?,
            lot_id: parse_uuid(&row.lot_id)?,
            tractor_id: parse_uuid(&row.tractor_id)?,
            route_id: parse_uuid(&row.route_id)?,
            checkpoint_id: parse_uuid(&row.checkpoint_id)?,
            route_checkpoint_id: parse_uuid(&row.route_checkpoint_id)?,
            traffic_manager_id: parse_opt_uuid(row.traffic_manager_id)?,
            created_at: row.created_at,
            executed_at: row.executed_at,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, transaction: &Transaction) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO transactions ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(transaction.id.to_string())
    .bind(transaction.transaction_type.as_str())
    .bind(transaction.lot_id.to_string())
    .bind(transaction.tractor_id.to_string())
    .bind(transaction.route_id.to_string())
    .bind(transaction.checkpoint_id.to_string())
    .bind(transaction.route_checkpoint_id.to_string())
    .bind(opt_uuid_text(transaction.traffic_manager_id))
    .bind(transaction.created_at)
    .bind(transaction.executed_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// ある (ルート, チェックポイント, トラクター) で未実行の予定
pub async fn list_pending_at(
    conn: &mut SqliteConnection,
    route_id: Uuid,
    checkpoint_id: Uuid,
    tractor_id: Uuid,
) -> Result<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM transactions \
         WHERE route_id = ? AND checkpoint_id = ? AND tractor_id = ? AND executed_at IS NULL \
         ORDER BY rowid"
    ))
    .bind(route_id.to_string())
    .bind(checkpoint_id.to_string())
    .bind(tractor_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Transaction::try_from).collect()
}

/// トラクターの未実行の予定すべて
pub async fn list_pending_for_tractor(
    conn: &mut SqliteConnection,
    tractor_id: Uuid,
) -> Result<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE tractor_id = ? AND executed_at IS NULL ORDER BY rowid"
    ))
    .bind(tractor_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Transaction::try_from).collect()
}

pub async fn list_by_tractor(conn: &mut SqliteConnection, tractor_id: Uuid) -> Result<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE tractor_id = ? ORDER BY rowid"
    ))
    .bind(tractor_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Transaction::try_from).collect()
}

pub async fn list_by_lot(conn: &mut SqliteConnection, lot_id: Uuid) -> Result<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE lot_id = ? ORDER BY rowid"
    ))
    .bind(lot_id.to_string())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Transaction::try_from).collect()
}

pub async fn mark_executed(conn: &mut SqliteConnection, id: Uuid, date: NaiveDate) -> Result<()> {
    sqlx::query("UPDATE transactions SET executed_at = ? WHERE id = ?")
        .bind(date)
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
