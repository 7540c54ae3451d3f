use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geography::{City, Country};
use crate::text_enum::text_enum;

text_enum! {
    /// 積荷の種類。ロットとトラクターで一致していないと積めない
    pub enum ResourceType ("resource type") {
        Bulk => "Bulk",
        Solid => "Solid",
        Liquid => "Liquid",
    }
}

text_enum! {
    /// ロットとトラクター共通の状態
    ///
    /// - available: 何にも紐づいていない
    /// - pending: 交通管理者に割り当て済み、出発待ち
    /// - in_transit: 輸送中（トラクターは毎日1チェックポイント進む）
    /// - archived: 到着済み / ルート終端
    /// - on_market: 取引所に出品中
    /// - at_trader: トレーダーが預かっている
    /// - returned_from_market: 出品期限が過ぎて取引所から戻ってきた
    pub enum State ("state") {
        Available => "available",
        Pending => "pending",
        InTransit => "in_transit",
        Archived => "archived",
        OnMarket => "on_market",
        AtTrader => "at_trader",
        ReturnedFromMarket => "returned_from_market",
    }
}

text_enum! {
    pub enum Role ("role") {
        Admin => "admin",
        TrafficManager => "traffic_manager",
        Client => "client",
        Trader => "trader",
    }
}

text_enum! {
    /// 積み込み(in)か荷下ろし(out)か
    pub enum TransactionType ("transaction type") {
        In => "in",
        Out => "out",
    }
}

text_enum! {
    pub enum OfferStatus ("offer status") {
        Open => "open",
        Sold => "sold",
        Unsold => "unsold",
    }
}

/// チェックポイント（都市）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub name: City,
    pub country: Country,
}

impl Checkpoint {
    /// "Paris, France" 形式の表示名
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }
}

/// ユーザー。パスワードハッシュはJSONに出さない
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub traffic_manager_id: Uuid,
    pub created_at: NaiveDate,
}

/// ルート上の1地点（ルートID, チェックポイントID, 順番）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCheckpoint {
    pub id: Uuid,
    pub route_id: Uuid,
    pub checkpoint_id: Uuid,
    pub position: i64,
}

/// チェックポイントを埋め込んだルート
#[derive(Debug, Clone, Serialize)]
pub struct RouteDetail {
    #[serde(flatten)]
    pub route: Route,
    pub checkpoints: Vec<RouteStop>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteStop {
    pub route_checkpoint_id: Uuid,
    pub position: i64,
    pub checkpoint: Checkpoint,
}

/// トラクター（運搬車両）
///
/// max_volume / current_volume はJSONでは max_units / current_units
#[derive(Debug, Clone, Serialize)]
pub struct Tractor {
    pub id: Uuid,
    pub name: String,
    pub resource_type: ResourceType,
    #[serde(rename = "max_units", with = "rust_decimal::serde::str")]
    pub max_volume: Decimal,
    #[serde(rename = "current_units", with = "rust_decimal::serde::str")]
    pub current_volume: Decimal,
    pub state: State,
    pub current_checkpoint_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub traffic_manager_id: Option<Uuid>,
    pub trader_id: Option<Uuid>,
    #[serde(with = "rust_decimal::serde::str")]
    pub min_price_by_km: Decimal,
    pub created_at: NaiveDate,
}

impl Tractor {
    /// 空き容量
    pub fn remaining_volume(&self) -> Decimal {
        self.max_volume - self.current_volume
    }
}

/// ロット（積荷）
#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub id: Uuid,
    pub resource_type: ResourceType,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    pub state: State,
    pub start_checkpoint_id: Uuid,
    pub end_checkpoint_id: Uuid,
    pub current_checkpoint_id: Option<Uuid>,
    pub tractor_id: Option<Uuid>,
    pub in_tractor: bool,
    pub owner_id: Uuid,
    pub traffic_manager_id: Option<Uuid>,
    pub trader_id: Option<Uuid>,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_price_by_km: Decimal,
    pub created_at: NaiveDate,
}

/// チェックポイントを埋め込んだロット
#[derive(Debug, Clone, Serialize)]
pub struct LotView {
    #[serde(flatten)]
    pub lot: Lot,
    pub start_checkpoint: Option<Checkpoint>,
    pub end_checkpoint: Option<Checkpoint>,
    pub current_checkpoint: Option<Checkpoint>,
}

/// トレーダー向け: 現在の最良入札と出品期限を付けたロット
#[derive(Debug, Clone, Serialize)]
pub struct TraderLotView {
    #[serde(flatten)]
    pub lot: LotView,
    /// 最安の入札（落札される値）。最高値ではない。入札が無ければ null
    #[serde(with = "rust_decimal::serde::str_option")]
    pub current_price: Option<Decimal>,
    pub limit_date: Option<NaiveDate>,
}

/// 積み込み / 荷下ろしの予定
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub lot_id: Uuid,
    pub tractor_id: Uuid,
    pub route_id: Uuid,
    pub checkpoint_id: Uuid,
    pub route_checkpoint_id: Uuid,
    pub traffic_manager_id: Option<Uuid>,
    pub created_at: NaiveDate,
    /// 実行済みならその日付
    pub executed_at: Option<NaiveDate>,
}

/// 取引所への出品。lot_id と tractor_id のどちらか一方だけが入る
#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub id: Uuid,
    pub lot_id: Option<Uuid>,
    pub tractor_id: Option<Uuid>,
    pub limit_date: NaiveDate,
    pub created_at: NaiveDate,
    pub status: OfferStatus,
    pub winning_bid_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: Offer,
    pub lot: Option<Lot>,
    pub tractor: Option<Tractor>,
}

/// 入札
///
/// - ロットの出品: bid は運賃。安い方が勝つ
/// - トラクターの出品: volume は借りたい容量。空きに収まる最大の volume が勝つ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bid {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub owner_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub volume: Option<Decimal>,
    pub created_at: NaiveDate,
}

/// シミュレーション時計（1行だけ）
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    pub id: Uuid,
    pub simulation_date: NaiveDate,
}
