// =============================================================================
// トラクター移動（1日分のバッチ処理）
// =============================================================================
//
// シミュレーション日付が1日進むたびに呼ばれる。
//
// 【流れ】 in_transit のトラクターを id 順に1台ずつ
// 1. ルートと現在位置を調べる（ルートが無ければ警告を出して飛ばす）
// 2. 次のチェックポイントへ進める。次が無ければルート終端なので archived
// 3. 積んでいるロットの現在地も一緒に進める
// 4. その地点の予定を実行する（荷下ろし(out) → 積み込み(in) の順）
// 5. 最後の地点に着いたら archived
//
// 1台ずつ順番に処理するだけなので、並行性は考えていない。
// 呼び出し側（シミュレーションエンジン）が1つずつ直列に流す。
// =============================================================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::db::lots::LotFilter;
use crate::db::tractors::TractorFilter;
use crate::error::Result;
use crate::models::{RouteCheckpoint, State, Tractor, Transaction, TransactionType};

/// 次の一手
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    /// 次の地点へ進む。last = その地点がルートの最後
    Move { to: &'a RouteCheckpoint, last: bool },
    /// もう進む先が無い
    EndOfRoute,
}

/// ルート（position 昇順）と現在の position から次の一手を決める
///
/// 現在地が無い（ルート外にいる）トラクターは最初の地点へ向かう。
pub fn next_step(stops: &[RouteCheckpoint], current_position: Option<i64>) -> Step<'_> {
    let next = stops
        .iter()
        .find(|stop| current_position.is_none_or(|position| stop.position > position));

    match next {
        Some(to) => Step::Move {
            to,
            last: stops.last().is_some_and(|last| last.position == to.position),
        },
        None => Step::EndOfRoute,
    }
}

/// トラクターが1地点進んだ記録
#[derive(Debug, Clone, Serialize)]
pub struct TractorMove {
    pub tractor_id: Uuid,
    pub from_checkpoint_id: Option<Uuid>,
    pub to_checkpoint_id: Uuid,
    pub position: i64,
}

/// 実行した予定
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedTransaction {
    pub transaction_id: Uuid,
    pub transaction_type: TransactionType,
    pub lot_id: Uuid,
    pub tractor_id: Uuid,
    pub checkpoint_id: Uuid,
}

/// 1回分の移動結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct MovementReport {
    pub moves: Vec<TractorMove>,
    pub executed: Vec<ExecutedTransaction>,
    pub archived: Vec<Uuid>,
    /// ルートが無いなどで動かせなかったトラクター
    pub skipped: Vec<Uuid>,
}

/// in_transit のトラクターをすべて1地点進める
pub async fn advance_tractors(conn: &mut SqliteConnection, today: NaiveDate) -> Result<MovementReport> {
    let tractors = db::tractors::list(&mut *conn, TractorFilter::State(State::InTransit)).await?;
    let mut report = MovementReport::default();

    for mut tractor in tractors {
        let Some(route_id) = tractor.route_id else {
            warn!(tractor_id = %tractor.id, "in-transit tractor has no route, skipping");
            report.skipped.push(tractor.id);
            continue;
        };

        let stops = db::routes::checkpoints_of(&mut *conn, route_id).await?;
        if stops.is_empty() {
            warn!(tractor_id = %tractor.id, %route_id, "route has no checkpoints, skipping");
            report.skipped.push(tractor.id);
            continue;
        }

        let current_position = tractor.current_checkpoint_id.and_then(|checkpoint_id| {
            stops
                .iter()
                .find(|stop| stop.checkpoint_id == checkpoint_id)
                .map(|stop| stop.position)
        });

        match next_step(&stops, current_position) {
            Step::EndOfRoute => {
                tractor.state = State::Archived;
                db::tractors::update(&mut *conn, &tractor).await?;
                info!(tractor_id = %tractor.id, "tractor reached the end of its route");
                report.archived.push(tractor.id);
            }
            Step::Move { to, last } => {
                let from = tractor.current_checkpoint_id;
                tractor.current_checkpoint_id = Some(to.checkpoint_id);

                // 積んでいるロットも一緒に動く
                for mut lot in db::lots::list(&mut *conn, LotFilter::LoadedOn(tractor.id)).await? {
                    lot.current_checkpoint_id = Some(to.checkpoint_id);
                    db::lots::update(&mut *conn, &lot).await?;
                }

                let mut pending =
                    db::transactions::list_pending_at(&mut *conn, route_id, to.checkpoint_id, tractor.id)
                        .await?;
                // out を先に（false < true）
                pending.sort_by_key(|t| t.transaction_type == TransactionType::In);

                for transaction in &pending {
                    if execute_transaction(&mut *conn, &mut tractor, transaction, today).await? {
                        report.executed.push(ExecutedTransaction {
                            transaction_id: transaction.id,
                            transaction_type: transaction.transaction_type,
                            lot_id: transaction.lot_id,
                            tractor_id: tractor.id,
                            checkpoint_id: transaction.checkpoint_id,
                        });
                    }
                }

                if last {
                    tractor.state = State::Archived;
                    report.archived.push(tractor.id);
                }
                db::tractors::update(&mut *conn, &tractor).await?;

                debug!(
                    tractor_id = %tractor.id,
                    position = to.position,
                    executed = pending.len(),
                    "tractor moved"
                );
                report.moves.push(TractorMove {
                    tractor_id: tractor.id,
                    from_checkpoint_id: from,
                    to_checkpoint_id: to.checkpoint_id,
                    position: to.position,
                });
            }
        }
    }

    info!(
        moved = report.moves.len(),
        executed = report.executed.len(),
        archived = report.archived.len(),
        "tractor movement done"
    );
    Ok(report)
}

/// 予定を1件実行する。ロットが消えていたら false
async fn execute_transaction(
    conn: &mut SqliteConnection,
    tractor: &mut Tractor,
    transaction: &Transaction,
    today: NaiveDate,
) -> Result<bool> {
    let Some(mut lot) = db::lots::find(&mut *conn, transaction.lot_id).await? else {
        warn!(transaction_id = %transaction.id, lot_id = %transaction.lot_id, "lot of transaction is gone");
        return Ok(false);
    };

    match transaction.transaction_type {
        TransactionType::In => {
            lot.in_tractor = true;
            lot.state = State::InTransit;
            lot.tractor_id = Some(tractor.id);
            tractor.current_volume += lot.volume;
        }
        TransactionType::Out => {
            lot.in_tractor = false;
            lot.state = State::Archived;
            tractor.current_volume = (tractor.current_volume - lot.volume).max(Decimal::ZERO);
        }
    }
    lot.current_checkpoint_id = Some(transaction.checkpoint_id);

    db::lots::update(&mut *conn, &lot).await?;
    db::transactions::mark_executed(conn, transaction.id, today).await?;
    Ok(true)
}

