mod common;

use std::fs;

use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{checkpoint, date, lot, route, start_date, temp_db_path, tractor, user, TestDb};
use tms_backend::db::lots::LotFilter;
use tms_backend::db::tractors::TractorFilter;
use tms_backend::db::{self, init_database};
use tms_backend::error::AppError;
use tms_backend::geography::City;
use tms_backend::models::{ResourceType, Role, State, Transaction, TransactionType};
use tms_backend::seed;

#[tokio::test]
async fn test_init_and_seed_are_idempotent() {
    let db_path = temp_db_path();

    let pool = init_database(&db_path).await.expect("Failed to init db");
    {
        let mut conn = pool.acquire().await.unwrap();
        seed::run(&mut conn, start_date(), true).await.unwrap();
    }
    pool.close().await;

    // 2回目の起動: スキーマも初期データも重複しない
    let pool = init_database(&db_path).await.expect("Failed to re-open db");
    let mut conn = pool.acquire().await.unwrap();
    seed::run(&mut conn, date(2030, 6, 1), true).await.unwrap();

    assert_eq!(db::checkpoints::list(&mut conn).await.unwrap().len(), 25);
    assert_eq!(db::users::list(&mut conn).await.unwrap().len(), 4);
    assert_eq!(
        db::tractors::list(&mut conn, TractorFilter::All).await.unwrap().len(),
        3
    );
    // 既存の日付は上書きされない
    assert_eq!(db::simulation::current_date(&mut conn).await.unwrap(), start_date());

    let admin = db::users::find_by_username(&mut conn, "admin").await.unwrap().unwrap();
    assert_eq!(admin.role, Role::Admin);
    assert!(bcrypt::verify(seed::DEFAULT_PASSWORD, &admin.hashed_password).unwrap());

    drop(conn);
    pool.close().await;
    let _ = fs::remove_file(&db_path);
    let _ = fs::remove_file(format!("{db_path}-wal"));
    let _ = fs::remove_file(format!("{db_path}-shm"));
}

#[tokio::test]
async fn test_users_by_role_and_unique_username() {
    let test_db = TestDb::new().await;
    let mut conn = test_db.pool.acquire().await.unwrap();

    let tm = user(&mut conn, "tm-1", Role::TrafficManager).await;
    user(&mut conn, "client-1", Role::Client).await;

    assert!(db::users::find_with_role(&mut conn, tm.id, Role::TrafficManager).await.unwrap().is_some());
    assert!(db::users::find_with_role(&mut conn, tm.id, Role::Trader).await.unwrap().is_none());
    let managers = db::users::list_by_role(&mut conn, Role::TrafficManager).await.unwrap();
    assert_eq!(managers.len(), 1);
    assert_eq!(managers[0].id, tm.id);

    let mut duplicate = tm.clone();
    duplicate.id = Uuid::new_v4();
    let err = db::users::insert(&mut conn, &duplicate).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    assert!(db::users::delete(&mut conn, tm.id).await.unwrap());
    assert!(!db::users::delete(&mut conn, tm.id).await.unwrap());

    drop(conn);
    test_db.cleanup().await;
}

#[tokio::test]
async fn test_tractor_filters_and_decimal_storage() {
    let test_db = TestDb::new().await;
    let mut conn = test_db.pool.acquire().await.unwrap();

    let owner = user(&mut conn, "owner", Role::Client).await;
    let mut t1 = tractor(ResourceType::Bulk, dec!(12.345));
    t1.owner_id = Some(owner.id);
    t1.current_volume = dec!(0.005);
    db::tractors::insert(&mut conn, &t1).await.unwrap();

    let mut t2 = tractor(ResourceType::Solid, dec!(50));
    t2.state = State::InTransit;
    db::tractors::insert(&mut conn, &t2).await.unwrap();

    let found = db::tractors::find(&mut conn, t1.id).await.unwrap().unwrap();
    assert_eq!(found.max_volume, dec!(12.345));
    assert_eq!(found.current_volume, dec!(0.005));

    let owned = db::tractors::list(&mut conn, TractorFilter::Owner(owner.id)).await.unwrap();
    assert_eq!(owned.len(), 1);
    let moving = db::tractors::list(&mut conn, TractorFilter::State(State::InTransit)).await.unwrap();
    assert_eq!(moving.len(), 1);
    assert_eq!(moving[0].id, t2.id);

    drop(conn);
    test_db.cleanup().await;
}

#[tokio::test]
async fn test_count_lots_by_trader() {
    let test_db = TestDb::new().await;
    let mut conn = test_db.pool.acquire().await.unwrap();

    let owner = user(&mut conn, "owner", Role::Client).await;
    let trader = user(&mut conn, "trader-a", Role::Trader).await;
    let paris = checkpoint(&mut conn, City::Paris).await;
    let lyon = checkpoint(&mut conn, City::Lyon).await;

    for state in [State::AtTrader, State::AtTrader, State::Archived] {
        let mut l = lot(ResourceType::Bulk, dec!(1), paris.id, lyon.id, owner.id);
        l.trader_id = Some(trader.id);
        l.state = state;
        db::lots::insert(&mut conn, &l).await.unwrap();
    }

    let counts = db::lots::count_by_trader_in_state(&mut conn, State::AtTrader).await.unwrap();
    assert_eq!(counts.get(&trader.id), Some(&2));
    assert_eq!(db::lots::list(&mut conn, LotFilter::Trader(trader.id)).await.unwrap().len(), 3);

    drop(conn);
    test_db.cleanup().await;
}

#[tokio::test]
async fn test_pending_transactions_at_stop() {
    let test_db = TestDb::new().await;
    let mut conn = test_db.pool.acquire().await.unwrap();

    let owner = user(&mut conn, "owner", Role::Client).await;
    let tm = user(&mut conn, "tm", Role::TrafficManager).await;
    let (route, stops) = route(&mut conn, tm.id, &[City::Paris, City::Lyon]).await;
    let t = tractor(ResourceType::Bulk, dec!(10));
    db::tractors::insert(&mut conn, &t).await.unwrap();
    let l = lot(ResourceType::Bulk, dec!(1), stops[0].checkpoint_id, stops[1].checkpoint_id, owner.id);
    db::lots::insert(&mut conn, &l).await.unwrap();

    let transaction = Transaction {
        id: Uuid::new_v4(),
        transaction_type: TransactionType::Out,
        lot_id: l.id,
        tractor_id: t.id,
        route_id: route.id,
        checkpoint_id: stops[1].checkpoint_id,
        route_checkpoint_id: stops[1].id,
        traffic_manager_id: Some(tm.id),
        created_at: start_date(),
        executed_at: None,
    };
    db::transactions::insert(&mut conn, &transaction).await.unwrap();

    let pending = db::transactions::list_pending_at(&mut conn, route.id, stops[1].checkpoint_id, t.id)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transaction_type, TransactionType::Out);

    db::transactions::mark_executed(&mut conn, transaction.id, date(2025, 1, 3)).await.unwrap();
    assert!(db::transactions::list_pending_for_tractor(&mut conn, t.id).await.unwrap().is_empty());
    let history = db::transactions::list_by_lot(&mut conn, l.id).await.unwrap();
    assert_eq!(history[0].executed_at, Some(date(2025, 1, 3)));

    // ロットを消すと予定も消える
    assert!(db::lots::delete(&mut conn, l.id).await.unwrap());
    assert!(db::transactions::list_by_tractor(&mut conn, t.id).await.unwrap().is_empty());

    drop(conn);
    test_db.cleanup().await;
}
