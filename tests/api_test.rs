mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use common::{checkpoint, pending_tractor_on, route, user, TestDb};
use tms_backend::api::{self, AppState};
use tms_backend::engine;
use tms_backend::geography::City;
use tms_backend::models::{ResourceType, Role};

fn app(test_db: &TestDb) -> Router {
    let (broadcast_tx, _) = broadcast::channel(16);
    let state = Arc::new(AppState {
        pool: test_db.pool.clone(),
        engine: engine::spawn(test_db.pool.clone(), broadcast_tx.clone()),
        broadcast_tx,
    });
    api::router(state, None)
}

// ヘルパー: リクエストを1つ送って (ステータス, JSON) を返す
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_checkpoint_catalog() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (status, body) = send(&app, "GET", "/api/v1/checkpoints", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 25);

    let (status, body) = send(&app, "GET", "/api/v1/checkpoints/countries/Spain/cities", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["country"], "Spain");
    assert_eq!(body["cities"].as_array().unwrap().len(), 5);

    let (status, body) = send(&app, "GET", "/api/v1/checkpoints/cities/Porto/country", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["country"], "Portugal");

    let (status, _) = send(&app, "GET", "/api/v1/checkpoints/cities/Atlantis/country", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/checkpoints",
        Some(json!({ "name": "Paris", "country": "Italy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Paris is not in Italy");

    let (status, _) = send(&app, "GET", "/api/v1/checkpoints/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_register_and_login() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(json!({ "username": "zoe", "password": "secret", "role": "client" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "zoe");
    assert!(body.get("hashed_password").is_none());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({ "username": "zoe", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "client");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({ "username": "zoe", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    // 不正なJSONは 400
    let (status, _) = send(&app, "POST", "/api/v1/auth/login", Some(json!({ "username": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_route_and_lot_creation() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (tm, client, paris, lyon, rome) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        (
            user(&mut conn, "tm", Role::TrafficManager).await,
            user(&mut conn, "client", Role::Client).await,
            checkpoint(&mut conn, City::Paris).await,
            checkpoint(&mut conn, City::Lyon).await,
            checkpoint(&mut conn, City::Rome).await,
        )
    };

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/routes",
        Some(json!({
            "name": "Sud",
            "traffic_manager_id": tm.id,
            "route": [
                { "checkpoint_id": paris.id, "position": 1 },
                { "checkpoint_id": lyon.id, "position": 2 },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["checkpoints"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/routes/traffic_manager/parsed/{}", tm.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["route"], json!(["Paris, France", "Lyon, France"]));

    // 同じ position は不可
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/routes",
        Some(json!({
            "name": "Bad",
            "traffic_manager_id": tm.id,
            "route": [
                { "checkpoint_id": paris.id, "position": 1 },
                { "checkpoint_id": rome.id, "position": 1 },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 同じチェックポイントを2回通るルートも不可
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/routes",
        Some(json!({
            "name": "Loop",
            "traffic_manager_id": tm.id,
            "route": [
                { "checkpoint_id": paris.id, "position": 1 },
                { "checkpoint_id": lyon.id, "position": 2 },
                { "checkpoint_id": paris.id, "position": 3 },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 交通管理者でないユーザー
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/routes",
        Some(json!({
            "name": "Nope",
            "traffic_manager_id": client.id,
            "route": [{ "checkpoint_id": paris.id, "position": 1 }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/lots",
        Some(json!({
            "resource_type": "Bulk",
            "volume": "2.5",
            "start_checkpoint_id": paris.id,
            "end_checkpoint_id": rome.id,
            "owner_id": client.id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["volume"], "2.5");
    assert_eq!(body["state"], "available");
    assert_eq!(body["current_checkpoint"]["name"], "Paris");
    let lot_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/api/v1/lots/owner/{}", client.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/lots",
        Some(json!({
            "resource_type": "Bulk",
            "volume": "0",
            "start_checkpoint_id": paris.id,
            "end_checkpoint_id": rome.id,
            "owner_id": client.id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/lots/{lot_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/v1/lots/{lot_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_simulation_date_and_market_flow() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (owner, bidder, lisbon, evora) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        (
            user(&mut conn, "owner", Role::Client).await,
            user(&mut conn, "bidder", Role::Client).await,
            checkpoint(&mut conn, City::Lisbon).await,
            checkpoint(&mut conn, City::Evora).await,
        )
    };

    let (status, body) = send(&app, "GET", "/api/v1/simulations/date", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["simulation_date"], "2025-01-01");

    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/lots",
        Some(json!({
            "resource_type": "Liquid",
            "volume": "1",
            "start_checkpoint_id": lisbon.id,
            "end_checkpoint_id": evora.id,
            "owner_id": owner.id,
        })),
    )
    .await;
    let lot_id = body["id"].clone();

    let (status, offer) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/lot_offers",
        Some(json!({ "lot_id": lot_id, "limit_date": "2025-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer["status"], "open");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/lot_offers",
        Some(json!({ "lot_id": lot_id, "limit_date": "2025-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, bid) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/bids",
        Some(json!({ "offer_id": offer["id"], "owner_id": bidder.id, "bid": "12.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bid["bid"], "12.50");

    let (status, body) = send(&app, "GET", "/api/v1/stock_exchange/lot_offers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["lot"]["state"], "on_market");

    // 1日進めると期限切れの出品が締まる
    let (status, body) = send(&app, "PATCH", "/api/v1/simulations/date", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Simulation date updated");
    assert_eq!(body["simulation_date"], "2025-01-02");
    assert_eq!(body["report"]["settlements"][0]["status"], "sold");
    assert_eq!(body["report"]["settlements"][0]["winning_bid"]["id"], bid["id"]);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/bids",
        Some(json!({ "offer_id": offer["id"], "owner_id": bidder.id, "bid": "10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Offer is closed");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/stock_exchange/offers/{}/bids", offer["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_decimals_accept_json_numbers() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (owner, bidder, paris, rome) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        (
            user(&mut conn, "owner", Role::Client).await,
            user(&mut conn, "bidder", Role::Client).await,
            checkpoint(&mut conn, City::Paris).await,
            checkpoint(&mut conn, City::Rome).await,
        )
    };

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/tractors",
        Some(json!({
            "name": "Rig",
            "resource_type": "Bulk",
            "max_units": 100,
            "current_units": 12.5,
            "owner_id": owner.id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["max_units"], "100");
    assert_eq!(body["current_units"], "12.5");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/lots",
        Some(json!({
            "resource_type": "Bulk",
            "volume": 3,
            "start_checkpoint_id": paris.id,
            "end_checkpoint_id": rome.id,
            "owner_id": owner.id,
            "max_price_by_km": 1.5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["volume"], "3");
    assert_eq!(body["max_price_by_km"], "1.5");

    let (_, offer) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/lot_offers",
        Some(json!({ "lot_id": body["id"], "limit_date": "2025-01-03" })),
    )
    .await;
    let (status, bid) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/bids",
        Some(json!({ "offer_id": offer["id"], "owner_id": bidder.id, "bid": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{bid}");
    assert_eq!(bid["bid"], "42");

    // 文字列も引き続き受け付ける
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/stock_exchange/bids",
        Some(json!({ "offer_id": offer["id"], "owner_id": bidder.id, "bid": "41.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_assigned_lot_schedule_and_delete_unloads_tractor() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (client, tractor_id, paris, lyon) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        let client = user(&mut conn, "client", Role::Client).await;
        let tm = user(&mut conn, "tm", Role::TrafficManager).await;
        let (r, stops) = route(&mut conn, tm.id, &[City::Paris, City::Lyon]).await;
        let t = pending_tractor_on(&mut conn, ResourceType::Bulk, dec!(10), &r, stops[0].checkpoint_id).await;
        (client, t.id, stops[0].checkpoint_id, stops[1].checkpoint_id)
    };

    let new_lot = |resource_type: &str, volume: u32| {
        json!({
            "resource_type": resource_type,
            "volume": volume,
            "start_checkpoint_id": paris,
            "end_checkpoint_id": lyon,
            "owner_id": client.id,
        })
    };

    let (_, lot) = send(&app, "POST", "/api/v1/lots", Some(new_lot("Bulk", 8))).await;
    let lot_id = lot["id"].as_str().unwrap().to_string();

    // 種類が違うロットは 400、合うロットは 200
    let (_, liquid) = send(&app, "POST", "/api/v1/lots", Some(new_lot("Liquid", 1))).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/lots/compatible",
        Some(json!({ "lot_id": liquid["id"], "tractor_id": tractor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Lot is not the same resource type as the tractor");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/lots/compatible",
        Some(json!({ "lot_id": lot_id, "tractor_id": tractor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Lot is compatible with the tractor");

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/lots/assign",
        Some(json!({ "lot_id": lot_id, "tractor_id": tractor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["in_tractor"], true);

    let (status, body) = send(&app, "GET", &format!("/api/v1/transactions/lot/{lot_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["transaction_type"], "in");
    assert_eq!(body[0]["executed_at"], "2025-01-01");
    assert_eq!(body[1]["transaction_type"], "out");
    assert_eq!(body[1]["executed_at"], Value::Null);

    let (status, body) = send(&app, "GET", &format!("/api/v1/transactions/tractor/{tractor_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, tractor) = send(&app, "GET", &format!("/api/v1/tractors/{tractor_id}"), None).await;
    assert_eq!(tractor["current_units"], "8");

    // 積まれたロットを消すとトラクターも空になる
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/lots/{lot_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, tractor) = send(&app, "GET", &format!("/api/v1/tractors/{tractor_id}"), None).await;
    assert_eq!(tractor["current_units"], "0");
    let (_, body) = send(&app, "GET", &format!("/api/v1/transactions/tractor/{tractor_id}"), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, bigger) = send(&app, "POST", "/api/v1/lots", Some(new_lot("Bulk", 10))).await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/lots/assign",
        Some(json!({ "lot_id": bigger["id"], "tractor_id": tractor_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_tractor_traffic_manager_and_route_binding() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (tm, client, route_id, first_stop, rome) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        let tm = user(&mut conn, "tm", Role::TrafficManager).await;
        let client = user(&mut conn, "client", Role::Client).await;
        let (r, stops) = route(&mut conn, tm.id, &[City::Bern, City::Zurich]).await;
        let rome = checkpoint(&mut conn, City::Rome).await;
        (tm, client, r.id, stops[0].checkpoint_id, rome)
    };

    let (_, tractor) = send(
        &app,
        "POST",
        "/api/v1/tractors",
        Some(json!({ "name": "Nomad", "resource_type": "Solid", "max_units": "20" })),
    )
    .await;
    let tractor_id = tractor["id"].clone();
    assert_eq!(tractor["state"], "available");
    assert_eq!(tractor["current_checkpoint_id"], Value::Null);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/tractors/traffic_manager",
        Some(json!({ "tractor_id": tractor_id, "traffic_manager_id": client.id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/tractors/traffic_manager",
        Some(json!({ "tractor_id": tractor_id, "traffic_manager_id": tm.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "pending");
    assert_eq!(body["traffic_manager_id"], json!(tm.id));

    // 現在地が無ければルートの最初の地点に置かれる
    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/tractors/route",
        Some(json!({ "tractor_id": tractor_id, "route_id": route_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route_id"], json!(route_id));
    assert_eq!(body["current_checkpoint_id"], json!(first_stop));

    let (_, on_route) = send(&app, "GET", &format!("/api/v1/tractors/route/{route_id}"), None).await;
    assert_eq!(on_route.as_array().unwrap().len(), 1);

    // ルート外にいるトラクターは乗せられない
    let (_, elsewhere) = send(
        &app,
        "POST",
        "/api/v1/tractors",
        Some(json!({
            "name": "Roman",
            "resource_type": "Solid",
            "max_units": 20,
            "current_checkpoint_id": rome.id,
        })),
    )
    .await;
    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/tractors/route",
        Some(json!({ "tractor_id": elsewhere["id"], "route_id": route_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tractor's current checkpoint is not on the route");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_user_management() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (tm, client) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        (
            user(&mut conn, "tm", Role::TrafficManager).await,
            user(&mut conn, "client", Role::Client).await,
        )
    };

    let (status, body) = send(&app, "GET", "/api/v1/users/traffic_managers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], json!(tm.id));

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/users/{}", client.id),
        Some(json!({ "firstname": "Camille", "role": "trader" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstname"], "Camille");
    assert_eq!(body["role"], "trader");
    assert_eq!(body["username"], "client");

    let (status, body) = send(&app, "GET", &format!("/api/v1/users/{}", client.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "trader");

    // 保存されているハッシュが壊れていても 500 ではなく 401
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({ "username": "tm", "password": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or password");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/users/{}", client.id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/users/{}", client.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/api/v1/users/{}", client.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_trader_lots_show_lowest_bid() {
    let test_db = TestDb::new().await;
    let app = app(&test_db);

    let (owner, trader, bidder_a, bidder_b, madrid, malaga) = {
        let mut conn = test_db.pool.acquire().await.unwrap();
        (
            user(&mut conn, "owner", Role::Client).await,
            user(&mut conn, "trader", Role::Trader).await,
            user(&mut conn, "bidder-a", Role::Client).await,
            user(&mut conn, "bidder-b", Role::Client).await,
            checkpoint(&mut conn, City::Madrid).await,
            checkpoint(&mut conn, City::Malaga).await,
        )
    };

    let (_, lot) = send(
        &app,
        "POST",
        "/api/v1/lots",
        Some(json!({
            "resource_type": "Solid",
            "volume": 2,
            "start_checkpoint_id": madrid.id,
            "end_checkpoint_id": malaga.id,
            "owner_id": owner.id,
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/lots/assign/{}/trader", lot["id"].as_str().unwrap()),
        Some(json!({ "limit_date": "2025-01-05" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lot"]["trader_id"], json!(trader.id));
    let offer_id = body["offer"]["id"].clone();

    let (_, body) = send(&app, "GET", &format!("/api/v1/lots/trader/{}", trader.id), None).await;
    assert_eq!(body[0]["current_price"], Value::Null);
    assert_eq!(body[0]["limit_date"], "2025-01-05");

    for (bidder, amount) in [(&bidder_a, 30), (&bidder_b, 25)] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/stock_exchange/bids",
            Some(json!({ "offer_id": offer_id, "owner_id": bidder.id, "bid": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", &format!("/api/v1/lots/trader/{}", trader.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["current_price"], "25");
    assert_eq!(body[0]["state"], "at_trader");

    test_db.cleanup().await;
}
