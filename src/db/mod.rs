// =============================================================================
// データベースモジュール (SQLite)
// =============================================================================
//
// 永続化層。テーブルごとにサブモジュールを分けている。
//
// - 起動時に migrations/schema.sql を適用する（IF NOT EXISTS なので何度でも可）
// - UUID と Decimal は TEXT で保存し、読み出し時にパースする
// - 各関数は &mut SqliteConnection を受け取るので、
//   プールから借りた接続でもトランザクションでも同じように呼べる
// =============================================================================

pub mod checkpoints;
pub mod lots;
pub mod market;
pub mod routes;
pub mod simulation;
pub mod tractors;
pub mod transactions;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::text_enum::ParseEnumError;

/// データベース接続プール
pub type DbPool = Pool<Sqlite>;

const SCHEMA: &str = include_str!("../../migrations/schema.sql");

/// データベースを初期化する
///
/// 1. SQLiteファイルに接続（なければ作成）
/// 2. 外部キー制約を有効化
/// 3. スキーマを適用
///
/// ":memory:" を渡すとインメモリDBになる。
/// この場合、接続ごとに別のDBになってしまうので接続数は1に絞る。
pub async fn init_database(db_path: &str) -> std::result::Result<DbPool, sqlx::Error> {
    let in_memory = db_path == ":memory:";

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    } else {
        pool_options = pool_options.acquire_timeout(Duration::from_secs(10));
    }

    let pool = pool_options.connect_with(options).await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;

    info!(path = db_path, "database initialised");
    Ok(pool)
}

// --- 読み出し時の変換ヘルパー ---

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Corrupt(format!("uuid '{raw}'")))
}

pub(crate) fn parse_opt_uuid(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal> {
    raw.parse()
        .map_err(|_| AppError::Corrupt(format!("decimal '{raw}'")))
}

pub(crate) fn parse_opt_decimal(raw: Option<String>) -> Result<Option<Decimal>> {
    raw.as_deref().map(parse_decimal).transpose()
}

pub(crate) fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse().map_err(|e: ParseEnumError| AppError::Corrupt(e.to_string()))
}

pub(crate) fn opt_uuid_text(id: Option<Uuid>) -> Option<String> {
    id.map(|u| u.to_string())
}
