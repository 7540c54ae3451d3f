// =============================================================================
// tms-backend - 輸送管理シミュレーションのWebサーバー
// =============================================================================
//
// 起動の流れ:
//   1. ログと設定（環境変数 / .env）
//   2. データベース初期化 + 初期データ投入
//   3. シミュレーションエンジン（アクター）を起動
//   4. （設定があれば）自動で日付を進めるタイマーを起動
//   5. Webサーバーを起動
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tms_backend::api::{self, AppState};
use tms_backend::config::Config;
use tms_backend::engine::{self, TickReport};
use tms_backend::{db, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tms_backend=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    // =========================================================================
    // Step 1: データベース
    // =========================================================================
    let pool = db::init_database(&config.database_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    {
        let mut conn = pool.acquire().await?;
        seed::run(&mut conn, config.simulation_start, config.seed_demo)
            .await
            .context("failed to seed the database")?;
    }

    // =========================================================================
    // Step 2: シミュレーションエンジン
    // =========================================================================
    let (broadcast_tx, _) = broadcast::channel::<TickReport>(64);
    let handle = engine::spawn(pool.clone(), broadcast_tx.clone());

    if let Some(period) = config.tick_interval {
        info!(seconds = period.as_secs(), "automatic simulation clock enabled");
        tokio::spawn(engine::run_clock(handle.clone(), period));
    }

    // =========================================================================
    // Step 3: Webサーバー
    // =========================================================================
    let state = Arc::new(AppState {
        pool,
        engine: handle,
        broadcast_tx,
    });
    let app = api::router(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;
    info!(addr = %config.http_addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
