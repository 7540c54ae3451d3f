//! 環境変数（と .env）から読む設定

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLiteファイルのパス
    pub database_path: String,
    pub http_addr: SocketAddr,
    /// simulation 行がまだ無いときの開始日
    pub simulation_start: NaiveDate,
    /// デモ用トラクターを投入するか
    pub seed_demo: bool,
    /// フロントエンドのビルド成果物（あれば配信する）
    pub static_dir: Option<PathBuf>,
    /// 設定されていれば、この間隔で1日ずつ自動で進める
    pub tick_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path =
            std::env::var("TMS_DATABASE_PATH").unwrap_or_else(|_| "tms.db".to_string());

        let port: u16 = std::env::var("TMS_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let simulation_start = match std::env::var("TMS_SIMULATION_START") {
            Ok(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| ConfigError::InvalidDate(raw))?,
            Err(_) => default_simulation_start(),
        };

        let seed_demo = std::env::var("TMS_SEED_DEMO")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let static_dir = std::env::var("TMS_STATIC_DIR").ok().map(PathBuf::from);

        let tick_interval = match std::env::var("TMS_TICK_SECONDS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => return Err(ConfigError::InvalidTick(raw)),
            },
            Err(_) => None,
        };

        Ok(Self {
            database_path,
            http_addr,
            simulation_start,
            seed_demo,
            static_dir,
            tick_interval,
        })
    }
}

pub fn default_simulation_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid simulation start date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("Invalid tick interval (expected whole seconds): {0}")]
    InvalidTick(String),
}
