// =============================================================================
// 配車（ロットをトラクター / トレーダーに割り当てる）
// =============================================================================
//
// 【トラクターへの割り当て】
// 1. 相性チェック（ルート・積荷の種類・状態・位置・容量）
// 2. ロットの出発地に in、到着地に out の予定を作る
// 3. トラクターがもう出発地にいれば、その場で積み込む
//
// 【容量の見積もり】
// トラクターには未実行の予定（in/out）が溜まっている。
// ルート上の各地点での積載量 = 現在の積載量 + その地点までの予定の増減。
// ロットが乗っている区間 [出発地, 到着地) の最大積載量 + ロットの量 が
// max_volume 以下なら積める。
// =============================================================================

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, Result};
use crate::models::{Lot, Offer, OfferStatus, Role, State, Tractor, Transaction, TransactionType, User};

/// 単純な相性チェックで弾かれた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Incompatibility {
    #[error("Lot exceeds tractor's capacity")]
    Capacity,
    #[error("Lot is not the same resource type as the tractor")]
    ResourceType,
}

/// 空き容量と積荷の種類だけを見る単純なチェック
pub fn fits(lot: &Lot, tractor: &Tractor) -> std::result::Result<(), Incompatibility> {
    if lot.volume > tractor.remaining_volume() {
        return Err(Incompatibility::Capacity);
    }
    if lot.resource_type != tractor.resource_type {
        return Err(Incompatibility::ResourceType);
    }
    Ok(())
}

/// ルート上の1地点での積載量の増減
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStop {
    pub position: i64,
    pub delta: Decimal,
}

/// ロットが乗っている区間 [from, to) での最大積載量
///
/// 積載量が変わるのは予定のある地点だけなので、from と区間内の予定地点だけ見ればよい。
pub fn peak_load(current: Decimal, planned: &[PlannedStop], from: i64, to: i64) -> Decimal {
    let load_at = |position: i64| {
        current
            + planned
                .iter()
                .filter(|stop| stop.position <= position)
                .map(|stop| stop.delta)
                .sum::<Decimal>()
    };

    std::iter::once(from)
        .chain(
            planned
                .iter()
                .map(|stop| stop.position)
                .filter(|&position| position > from && position < to),
        )
        .map(load_at)
        .max()
        .unwrap_or(current)
}

/// トラクターの未実行の予定を、ルート上の位置ごとの増減に直す
async fn planned_stops(conn: &mut SqliteConnection, tractor: &Tractor, route_id: Uuid) -> Result<Vec<PlannedStop>> {
    let positions: HashMap<Uuid, i64> = db::routes::checkpoints_of(&mut *conn, route_id)
        .await?
        .into_iter()
        .map(|stop| (stop.id, stop.position))
        .collect();

    let mut planned = Vec::new();
    for transaction in db::transactions::list_pending_for_tractor(&mut *conn, tractor.id).await? {
        // 別のルートの古い予定は数えない
        let Some(&position) = positions.get(&transaction.route_checkpoint_id) else {
            continue;
        };
        let Some(lot) = db::lots::find(&mut *conn, transaction.lot_id).await? else {
            continue;
        };
        let delta = match transaction.transaction_type {
            TransactionType::In => lot.volume,
            TransactionType::Out => -lot.volume,
        };
        planned.push(PlannedStop { position, delta });
    }
    Ok(planned)
}

/// ロットをこのトラクターで運べるか
///
/// - トラクターにルートがある
/// - 積荷の種類が同じ
/// - トラクターが pending（出発待ち）
/// - トラクターの現在地がロットの現在地より先に進んでいない
/// - ルート上でロットの到着地が出発地より後ろにある
/// - 区間中の最大積載量 + ロットの量 <= max_volume
pub async fn check_compatibility(conn: &mut SqliteConnection, lot: &Lot, tractor: &Tractor) -> Result<bool> {
    let Some(route_id) = tractor.route_id else {
        return Ok(false);
    };
    if lot.resource_type != tractor.resource_type || tractor.state != State::Pending {
        return Ok(false);
    }

    let stops = db::routes::checkpoints_of(&mut *conn, route_id).await?;
    let position_of = |checkpoint_id: Uuid| {
        stops
            .iter()
            .find(|stop| stop.checkpoint_id == checkpoint_id)
            .map(|stop| stop.position)
    };

    let Some(tractor_position) = tractor.current_checkpoint_id.and_then(position_of) else {
        return Ok(false);
    };
    let lot_checkpoint = lot.current_checkpoint_id.unwrap_or(lot.start_checkpoint_id);
    let Some(lot_position) = position_of(lot_checkpoint) else {
        return Ok(false);
    };
    if tractor_position > lot_position {
        return Ok(false);
    }

    let (Some(start), Some(end)) = (
        position_of(lot.start_checkpoint_id),
        position_of(lot.end_checkpoint_id),
    ) else {
        return Ok(false);
    };
    if end <= start {
        return Ok(false);
    }

    let planned = planned_stops(&mut *conn, tractor, route_id).await?;
    let peak = peak_load(tractor.current_volume, &planned, start, end);
    debug!(lot_id = %lot.id, tractor_id = %tractor.id, %peak, "projected load");

    Ok(peak + lot.volume <= tractor.max_volume)
}

/// 交通管理者のトラクターのうち、このロットを運べるもの
pub async fn compatible_tractors(
    conn: &mut SqliteConnection,
    traffic_manager_id: Uuid,
    lot: &Lot,
) -> Result<Vec<Tractor>> {
    let tractors = db::tractors::list(
        &mut *conn,
        db::tractors::TractorFilter::TrafficManager(traffic_manager_id),
    )
    .await?;

    let mut compatible = Vec::new();
    for tractor in tractors {
        if check_compatibility(&mut *conn, lot, &tractor).await? {
            compatible.push(tractor);
        }
    }
    Ok(compatible)
}

/// ロットをトラクターに割り当てる
pub async fn assign_tractor(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    tractor_id: Uuid,
    today: NaiveDate,
) -> Result<Lot> {
    let mut lot = db::lots::find(&mut *conn, lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    let mut tractor = db::tractors::find(&mut *conn, tractor_id)
        .await?
        .ok_or_else(|| AppError::not_found("Tractor"))?;

    if lot.tractor_id.is_some() {
        return Err(AppError::Conflict("Lot is already assigned to a tractor".to_string()));
    }
    if !check_compatibility(&mut *conn, &lot, &tractor).await? {
        return Err(AppError::BadRequest("Lot is not compatible with the tractor".to_string()));
    }

    let route_id = tractor
        .route_id
        .ok_or_else(|| AppError::BadRequest("Tractor has no route".to_string()))?;
    let pickup = db::routes::find_checkpoint(&mut *conn, route_id, lot.start_checkpoint_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Lot start is not on the tractor's route".to_string()))?;
    let drop_off = db::routes::find_checkpoint(&mut *conn, route_id, lot.end_checkpoint_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Lot end is not on the tractor's route".to_string()))?;

    // 出発地にもういるなら、その場で積み込む
    let load_now = tractor.current_checkpoint_id == Some(lot.start_checkpoint_id);

    let transaction_in = Transaction {
        id: Uuid::new_v4(),
        transaction_type: TransactionType::In,
        lot_id: lot.id,
        tractor_id: tractor.id,
        route_id,
        checkpoint_id: pickup.checkpoint_id,
        route_checkpoint_id: pickup.id,
        traffic_manager_id: lot.traffic_manager_id,
        created_at: today,
        executed_at: load_now.then_some(today),
    };
    let transaction_out = Transaction {
        id: Uuid::new_v4(),
        transaction_type: TransactionType::Out,
        lot_id: lot.id,
        tractor_id: tractor.id,
        route_id,
        checkpoint_id: drop_off.checkpoint_id,
        route_checkpoint_id: drop_off.id,
        traffic_manager_id: lot.traffic_manager_id,
        created_at: today,
        executed_at: None,
    };
    db::transactions::insert(&mut *conn, &transaction_in).await?;
    db::transactions::insert(&mut *conn, &transaction_out).await?;

    lot.tractor_id = Some(tractor.id);
    if load_now {
        lot.in_tractor = true;
        lot.state = State::InTransit;
        lot.current_checkpoint_id = Some(lot.start_checkpoint_id);
        tractor.current_volume += lot.volume;
        db::tractors::update(&mut *conn, &tractor).await?;
    }
    db::lots::update(&mut *conn, &lot).await?;

    info!(
        lot_id = %lot.id,
        tractor_id = %tractor.id,
        loaded = load_now,
        "lot assigned to tractor"
    );
    Ok(lot)
}

/// ロットを削除する。トラクターに積まれていれば、その分の積載量も下ろす
///
/// 未実行の予定は外部キーの CASCADE で一緒に消える。
pub async fn delete_lot(conn: &mut SqliteConnection, lot_id: Uuid) -> Result<bool> {
    let Some(lot) = db::lots::find(&mut *conn, lot_id).await? else {
        return Ok(false);
    };

    if let (true, Some(tractor_id)) = (lot.in_tractor, lot.tractor_id) {
        if let Some(mut tractor) = db::tractors::find(&mut *conn, tractor_id).await? {
            tractor.current_volume = (tractor.current_volume - lot.volume).max(Decimal::ZERO);
            db::tractors::update(&mut *conn, &tractor).await?;
            info!(lot_id = %lot.id, tractor_id = %tractor.id, "loaded lot deleted, tractor unloaded");
        }
    }

    db::lots::delete(conn, lot.id).await
}

/// at_trader のロットが一番少ないトレーダー（同数ならユーザー名順で先の方）
pub async fn select_trader(conn: &mut SqliteConnection) -> Result<Option<User>> {
    let traders = db::users::list_by_role(&mut *conn, Role::Trader).await?;
    let counts = db::lots::count_by_trader_in_state(conn, State::AtTrader).await?;

    Ok(traders
        .into_iter()
        .min_by_key(|trader| counts.get(&trader.id).copied().unwrap_or(0)))
}

/// ロットをトレーダーに預け、期限付きで出品する
pub async fn assign_trader(
    conn: &mut SqliteConnection,
    lot_id: Uuid,
    limit_date: NaiveDate,
    today: NaiveDate,
) -> Result<(Lot, Offer)> {
    if limit_date < today {
        return Err(AppError::BadRequest(
            "limit_date must not be before the simulation date".to_string(),
        ));
    }

    let mut lot = db::lots::find(&mut *conn, lot_id)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?;
    if matches!(lot.state, State::InTransit | State::Archived) {
        return Err(AppError::BadRequest(format!(
            "Lot cannot be given to a trader while {}",
            lot.state
        )));
    }
    if let Some(offer) = db::market::latest_offer_for_lot(&mut *conn, lot.id).await? {
        if offer.status == OfferStatus::Open {
            return Err(AppError::Conflict("Lot is already on the market".to_string()));
        }
    }

    let trader = select_trader(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("No trader available".to_string()))?;

    lot.trader_id = Some(trader.id);
    lot.state = State::AtTrader;
    db::lots::update(&mut *conn, &lot).await?;

    let offer = Offer {
        id: Uuid::new_v4(),
        lot_id: Some(lot.id),
        tractor_id: None,
        limit_date,
        created_at: today,
        status: OfferStatus::Open,
        winning_bid_id: None,
    };
    db::market::insert_offer(conn, &offer).await?;

    info!(lot_id = %lot.id, trader = %trader.username, %limit_date, "lot assigned to trader");
    Ok((lot, offer))
}

