//! 起動時の初期データ投入
//!
//! 何度起動しても同じ状態になるよう、既にある行は作らない。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::db::tractors::TractorFilter;
use crate::error::Result;
use crate::geography::{City, Country};
use crate::models::{Checkpoint, ResourceType, Role, State, Tractor, User};

/// 初期ユーザーのパスワード
pub const DEFAULT_PASSWORD: &str = "test";

const DEFAULT_USERS: [(&str, &str, &str, Role); 4] = [
    ("admin", "Admin", "User", Role::Admin),
    ("tm", "Traffic", "Manager", Role::TrafficManager),
    ("client", "Client", "User", Role::Client),
    ("trader", "Trader", "User", Role::Trader),
];

/// カタログの全都市をチェックポイントとして登録する
pub async fn seed_checkpoints(conn: &mut SqliteConnection) -> Result<usize> {
    let mut created = 0;
    for &country in Country::ALL {
        for &city in country.cities() {
            if db::checkpoints::find_by_city(&mut *conn, city).await?.is_some() {
                continue;
            }
            let checkpoint = Checkpoint {
                id: Uuid::new_v4(),
                name: city,
                country,
            };
            db::checkpoints::insert(&mut *conn, &checkpoint).await?;
            created += 1;
        }
    }
    Ok(created)
}

/// admin / tm / client / trader を作る
pub async fn seed_users(conn: &mut SqliteConnection) -> Result<usize> {
    let mut created = 0;
    for (username, firstname, lastname, role) in DEFAULT_USERS {
        if db::users::find_by_username(&mut *conn, username).await?.is_some() {
            continue;
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            hashed_password: bcrypt::hash(DEFAULT_PASSWORD, bcrypt::DEFAULT_COST)?,
            role,
        };
        db::users::insert(&mut *conn, &user).await?;
        created += 1;
    }
    Ok(created)
}

/// デモ用トラクター（トラクターが1台も無いときだけ）
pub async fn seed_demo_tractors(conn: &mut SqliteConnection, today: NaiveDate) -> Result<usize> {
    if !db::tractors::list(&mut *conn, TractorFilter::All).await?.is_empty() {
        return Ok(0);
    }

    let client = db::users::find_by_username(&mut *conn, "client").await?;
    let demo = [
        ("Atlas", ResourceType::Bulk, 100, City::Paris),
        ("Boreas", ResourceType::Solid, 80, City::Milan),
        ("Calypso", ResourceType::Liquid, 60, City::Madrid),
    ];

    for (name, resource_type, max_volume, city) in demo {
        let checkpoint = db::checkpoints::find_by_city(&mut *conn, city).await?;
        let tractor = Tractor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            resource_type,
            max_volume: Decimal::from(max_volume),
            current_volume: Decimal::ZERO,
            state: State::Available,
            current_checkpoint_id: checkpoint.map(|c| c.id),
            route_id: None,
            owner_id: client.as_ref().map(|u| u.id),
            traffic_manager_id: None,
            trader_id: None,
            min_price_by_km: Decimal::ONE,
            created_at: today,
        };
        db::tractors::insert(&mut *conn, &tractor).await?;
    }
    Ok(demo.len())
}

/// 起動時にまとめて呼ぶ
pub async fn run(conn: &mut SqliteConnection, simulation_start: NaiveDate, demo: bool) -> Result<()> {
    let checkpoints = seed_checkpoints(&mut *conn).await?;
    let users = seed_users(&mut *conn).await?;
    let simulation = db::simulation::ensure(&mut *conn, simulation_start).await?;

    let tractors = if demo {
        seed_demo_tractors(&mut *conn, simulation.simulation_date).await?
    } else {
        0
    };

    info!(
        checkpoints,
        users,
        tractors,
        simulation_date = %simulation.simulation_date,
        "seed data ready"
    );
    Ok(())
}
