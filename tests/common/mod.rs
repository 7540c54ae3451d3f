#![allow(dead_code)]

use std::fs;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use uuid::Uuid;

use tms_backend::db::{self, init_database, DbPool};
use tms_backend::geography::City;
use tms_backend::models::{Checkpoint, Lot, ResourceType, Role, Route, RouteCheckpoint, State, Tractor, User};
use tms_backend::seed;

// ヘルパー: ランダムなDBパスを生成
pub fn temp_db_path() -> String {
    let id = Uuid::new_v4();
    format!("test_db_{}.sqlite", id)
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// テスト用DB: チェックポイントとシミュレーション日付だけ入っている
pub struct TestDb {
    pub pool: DbPool,
    path: String,
}

impl TestDb {
    pub async fn new() -> Self {
        let path = temp_db_path();
        let pool = init_database(&path).await.expect("Failed to init db");
        {
            let mut conn = pool.acquire().await.unwrap();
            seed::seed_checkpoints(&mut conn).await.unwrap();
            db::simulation::ensure(&mut conn, start_date()).await.unwrap();
        }
        Self { pool, path }
    }

    pub async fn cleanup(self) {
        self.pool.close().await;
        let _ = fs::remove_file(&self.path);
        let _ = fs::remove_file(format!("{}-wal", self.path));
        let _ = fs::remove_file(format!("{}-shm", self.path));
    }
}

pub async fn checkpoint(conn: &mut SqliteConnection, city: City) -> Checkpoint {
    db::checkpoints::find_by_city(conn, city)
        .await
        .unwrap()
        .expect("checkpoint seeded")
}

/// ハッシュ計算を省いたユーザー
pub async fn user(conn: &mut SqliteConnection, username: &str, role: Role) -> User {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        firstname: username.to_string(),
        lastname: "Test".to_string(),
        hashed_password: "not-a-hash".to_string(),
        role,
    };
    db::users::insert(conn, &user).await.unwrap();
    user
}

/// 都市の並び順に position 1, 2, 3... を振ったルート
pub async fn route(
    conn: &mut SqliteConnection,
    traffic_manager_id: Uuid,
    cities: &[City],
) -> (Route, Vec<RouteCheckpoint>) {
    let route = Route {
        id: Uuid::new_v4(),
        name: "test route".to_string(),
        traffic_manager_id,
        created_at: start_date(),
    };
    db::routes::insert(&mut *conn, &route).await.unwrap();

    let mut stops = Vec::new();
    for (i, &city) in cities.iter().enumerate() {
        let checkpoint = checkpoint(&mut *conn, city).await;
        let stop = RouteCheckpoint {
            id: Uuid::new_v4(),
            route_id: route.id,
            checkpoint_id: checkpoint.id,
            position: i as i64 + 1,
        };
        db::routes::insert_checkpoint(&mut *conn, &stop).await.unwrap();
        stops.push(stop);
    }
    (route, stops)
}

/// 未保存のトラクター
pub fn tractor(resource_type: ResourceType, max_volume: Decimal) -> Tractor {
    Tractor {
        id: Uuid::new_v4(),
        name: "T-1".to_string(),
        resource_type,
        max_volume,
        current_volume: Decimal::ZERO,
        state: State::Available,
        current_checkpoint_id: None,
        route_id: None,
        owner_id: None,
        traffic_manager_id: None,
        trader_id: None,
        min_price_by_km: Decimal::ONE,
        created_at: start_date(),
    }
}

/// 未保存のロット（現在地 = 出発地）
pub fn lot(resource_type: ResourceType, volume: Decimal, start: Uuid, end: Uuid, owner_id: Uuid) -> Lot {
    Lot {
        id: Uuid::new_v4(),
        resource_type,
        volume,
        state: State::Available,
        start_checkpoint_id: start,
        end_checkpoint_id: end,
        current_checkpoint_id: Some(start),
        tractor_id: None,
        in_tractor: false,
        owner_id,
        traffic_manager_id: None,
        trader_id: None,
        max_price_by_km: Decimal::TEN,
        created_at: start_date(),
    }
}

/// ルートに乗せて pending にしたトラクターを保存する
pub async fn pending_tractor_on(
    conn: &mut SqliteConnection,
    resource_type: ResourceType,
    max_volume: Decimal,
    route: &Route,
    at: Uuid,
) -> Tractor {
    let mut tractor = tractor(resource_type, max_volume);
    tractor.route_id = Some(route.id);
    tractor.traffic_manager_id = Some(route.traffic_manager_id);
    tractor.current_checkpoint_id = Some(at);
    tractor.state = State::Pending;
    db::tractors::insert(conn, &tractor).await.unwrap();
    tractor
}
