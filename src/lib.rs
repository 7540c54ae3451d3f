// =============================================================================
// tms-backend - 輸送管理シミュレーション
// =============================================================================
//
// 【アーキテクチャの概要】
// ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────────┐
// │  Web API層      │────▶│   チャネル      │────▶│ シミュレーション     │
// │  (axum)        │◀────│   (mpsc)       │◀────│ エンジン（アクター） │
// └─────────────────┘     └─────────────────┘     └──────────────────────┘
//          │                                              │
//          └──────────────▶  SQLite (sqlx)  ◀─────────────┘
//
// - geography: 国と都市のカタログ
// - models: データ型（ロット、トラクター、ルート、出品、入札…）
// - db: 永続化（テーブルごとのクエリ）
// - dispatch: ロットの割り当て（トラクター / トレーダー）
// - movement: トラクター移動のバッチ処理
// - market: 取引所（出品・入札・落札）
// - engine: 日付を進めるアクター
// - api: HTTPハンドラー
// =============================================================================

mod text_enum;

pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod geography;
pub mod market;
pub mod models;
pub mod movement;
pub mod seed;

pub use text_enum::ParseEnumError;
