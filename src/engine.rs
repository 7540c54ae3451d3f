use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

use crate::db::{self, DbPool};
use crate::error::{AppError, Result};
use crate::market::{self, Settlement};
use crate::movement::{self, MovementReport};

// =============================================================================
// Actorパターンのメッセージ定義
// =============================================================================
//
// シミュレーション（日付を進める・トラクターを動かす・取引所を締める）は
// すべてこのアクターに依頼する。
// アクターはメッセージを1つずつ順番に処理するので、
// 「日付を進める」リクエストが同時に2つ来ても処理が混ざることはない。

/// シミュレーションエンジンに送るメッセージ
pub enum SimulationMessage {
    /// 1日進めて、移動 → 取引所の締めを行う
    AdvanceDay {
        respond_to: oneshot::Sender<Result<TickReport>>,
    },
    /// 日付は進めずにトラクターだけ動かす
    MoveTractors {
        respond_to: oneshot::Sender<Result<MovementReport>>,
    },
    /// 日付は進めずに期限切れの出品だけ締める
    ReturnFromMarket {
        respond_to: oneshot::Sender<Result<Vec<Settlement>>>,
    },
    /// 現在のシミュレーション日付
    GetDate {
        respond_to: oneshot::Sender<Result<NaiveDate>>,
    },
}

/// 1日分の処理結果（WebSocketにも流す）
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub simulation_date: NaiveDate,
    pub movement: MovementReport,
    pub settlements: Vec<Settlement>,
}

/// シミュレーションエンジンを実行する（Actor Loop）
pub async fn run_simulation_engine(
    mut rx: mpsc::Receiver<SimulationMessage>,
    pool: DbPool,
    broadcast_tx: broadcast::Sender<TickReport>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            SimulationMessage::AdvanceDay { respond_to } => {
                let result = advance_day(&pool).await;
                match &result {
                    Ok(report) => {
                        // 購読者がいないときの送信エラーは無視してよい
                        let _ = broadcast_tx.send(report.clone());
                    }
                    Err(e) => error!(error = %e, "advancing the simulation failed"),
                }
                let _ = respond_to.send(result);
            }
            SimulationMessage::MoveTractors { respond_to } => {
                let _ = respond_to.send(move_tractors(&pool).await);
            }
            SimulationMessage::ReturnFromMarket { respond_to } => {
                let _ = respond_to.send(return_from_market(&pool).await);
            }
            SimulationMessage::GetDate { respond_to } => {
                let result = match pool.acquire().await {
                    Ok(mut conn) => db::simulation::current_date(&mut conn).await,
                    Err(e) => Err(e.into()),
                };
                let _ = respond_to.send(result);
            }
        }
    }
    info!("simulation engine stopped");
}

/// 1日進める。全部1つのDBトランザクションの中で行い、途中で失敗したら何も変わらない
async fn advance_day(pool: &DbPool) -> Result<TickReport> {
    let mut tx = pool.begin().await?;

    let simulation = db::simulation::get(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Corrupt("Unable to fetch simulation date".to_string()))?;
    let simulation_date = simulation
        .simulation_date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::BadRequest("Simulation date is out of range".to_string()))?;
    db::simulation::set_date(&mut *tx, simulation.id, simulation_date).await?;

    let movement = movement::advance_tractors(&mut *tx, simulation_date).await?;
    let settlements = market::return_from_market(&mut *tx, simulation_date).await?;

    tx.commit().await?;

    info!(%simulation_date, "simulation advanced by one day");
    Ok(TickReport {
        simulation_date,
        movement,
        settlements,
    })
}

async fn move_tractors(pool: &DbPool) -> Result<MovementReport> {
    let mut tx = pool.begin().await?;
    let today = db::simulation::current_date(&mut *tx).await?;
    let report = movement::advance_tractors(&mut *tx, today).await?;
    tx.commit().await?;
    Ok(report)
}

async fn return_from_market(pool: &DbPool) -> Result<Vec<Settlement>> {
    let mut tx = pool.begin().await?;
    let today = db::simulation::current_date(&mut *tx).await?;
    let settlements = market::return_from_market(&mut *tx, today).await?;
    tx.commit().await?;
    Ok(settlements)
}

// =============================================================================
// ハンドル（APIハンドラーから使う）
// =============================================================================

/// エンジンへの送信側。メッセージを送って oneshot で返事を待つ
#[derive(Clone)]
pub struct SimulationHandle {
    sender: mpsc::Sender<SimulationMessage>,
}

impl SimulationHandle {
    pub fn new(sender: mpsc::Sender<SimulationMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> SimulationMessage,
    ) -> Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.sender
            .send(make(resp_tx))
            .await
            .map_err(|_| AppError::EngineUnavailable)?;
        resp_rx.await.map_err(|_| AppError::EngineUnavailable)?
    }

    pub async fn advance_day(&self) -> Result<TickReport> {
        self.request(|respond_to| SimulationMessage::AdvanceDay { respond_to })
            .await
    }

    pub async fn move_tractors(&self) -> Result<MovementReport> {
        self.request(|respond_to| SimulationMessage::MoveTractors { respond_to })
            .await
    }

    pub async fn return_from_market(&self) -> Result<Vec<Settlement>> {
        self.request(|respond_to| SimulationMessage::ReturnFromMarket { respond_to })
            .await
    }

    pub async fn current_date(&self) -> Result<NaiveDate> {
        self.request(|respond_to| SimulationMessage::GetDate { respond_to })
            .await
    }
}

/// エンジンを起動してハンドルを返す
pub fn spawn(pool: DbPool, broadcast_tx: broadcast::Sender<TickReport>) -> SimulationHandle {
    let (tx, rx) = mpsc::channel::<SimulationMessage>(256);
    tokio::spawn(async move {
        run_simulation_engine(rx, pool, broadcast_tx).await;
    });
    SimulationHandle::new(tx)
}

// =============================================================================
// 自動進行（任意）
// =============================================================================

/// 一定間隔で1日ずつ進めるタイマー
///
/// エンジンが止まったら終了する。
pub async fn run_clock(handle: SimulationHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // 最初の tick は即座に発火するので読み捨てる
    interval.tick().await;

    loop {
        interval.tick().await;
        match handle.advance_day().await {
            Ok(report) => info!(simulation_date = %report.simulation_date, "clock tick"),
            Err(AppError::EngineUnavailable) => {
                warn!("simulation engine is gone, stopping the clock");
                break;
            }
            Err(e) => error!(error = %e, "clock tick failed"),
        }
    }
}
