use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::{Checkpoint, Role, Route, RouteCheckpoint, RouteDetail, RouteStop};

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/{id}", get(get_route))
        .route("/routes/traffic_manager/{id}", get(routes_of_traffic_manager))
        .route(
            "/routes/traffic_manager/parsed/{id}",
            get(parsed_routes_of_traffic_manager),
        )
}

/// ルートにチェックポイントを埋め込む
async fn detail(
    conn: &mut SqliteConnection,
    route: Route,
    checkpoints: &HashMap<Uuid, Checkpoint>,
) -> Result<RouteDetail> {
    let stops = db::routes::checkpoints_of(conn, route.id).await?;
    let checkpoints = stops
        .into_iter()
        .map(|stop| {
            let checkpoint = checkpoints
                .get(&stop.checkpoint_id)
                .cloned()
                .ok_or_else(|| AppError::Corrupt(format!("checkpoint {} of route", stop.checkpoint_id)))?;
            Ok(RouteStop {
                route_checkpoint_id: stop.id,
                position: stop.position,
                checkpoint,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RouteDetail { route, checkpoints })
}

async fn details(conn: &mut SqliteConnection, routes: Vec<Route>) -> Result<Vec<RouteDetail>> {
    let checkpoints = db::checkpoints::map(&mut *conn).await?;
    let mut result = Vec::with_capacity(routes.len());
    for route in routes {
        result.push(detail(&mut *conn, route, &checkpoints).await?);
    }
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct RouteStopPayload {
    checkpoint_id: Uuid,
    position: i64,
}

#[derive(Debug, Deserialize)]
struct CreateRoutePayload {
    name: String,
    traffic_manager_id: Uuid,
    route: Vec<RouteStopPayload>,
}

/// POST /routes
async fn create_route(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateRoutePayload>,
) -> Result<(StatusCode, Json<RouteDetail>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if payload.route.is_empty() {
        return Err(AppError::BadRequest("route must contain at least one checkpoint".to_string()));
    }
    let mut positions = HashSet::new();
    let mut visited = HashSet::new();
    for stop in &payload.route {
        if !positions.insert(stop.position) {
            return Err(AppError::BadRequest(format!("Duplicate position {}", stop.position)));
        }
        if !visited.insert(stop.checkpoint_id) {
            return Err(AppError::BadRequest(format!(
                "Checkpoint {} appears more than once",
                stop.checkpoint_id
            )));
        }
    }

    let mut tx = state.pool.begin().await?;

    db::users::find_with_role(&mut tx, payload.traffic_manager_id, Role::TrafficManager)
        .await?
        .ok_or_else(|| AppError::not_found("Traffic manager"))?;
    for stop in &payload.route {
        if db::checkpoints::find(&mut tx, stop.checkpoint_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Unknown checkpoint {}",
                stop.checkpoint_id
            )));
        }
    }

    let today = db::simulation::current_date(&mut tx).await?;
    let route = Route {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        traffic_manager_id: payload.traffic_manager_id,
        created_at: today,
    };
    db::routes::insert(&mut tx, &route).await?;
    for stop in &payload.route {
        db::routes::insert_checkpoint(
            &mut tx,
            &RouteCheckpoint {
                id: Uuid::new_v4(),
                route_id: route.id,
                checkpoint_id: stop.checkpoint_id,
                position: stop.position,
            },
        )
        .await?;
    }

    let checkpoints = db::checkpoints::map(&mut tx).await?;
    let detail = detail(&mut tx, route, &checkpoints).await?;
    tx.commit().await?;

    info!(route_id = %detail.route.id, stops = detail.checkpoints.len(), "route created");
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /routes
async fn list_routes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RouteDetail>>> {
    let mut conn = state.pool.acquire().await?;
    let routes = db::routes::list(&mut conn).await?;
    Ok(Json(details(&mut conn, routes).await?))
}

/// GET /routes/{id}
async fn get_route(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<RouteDetail>> {
    let id = parse_id(&id, "route id")?;
    let mut conn = state.pool.acquire().await?;
    let route = db::routes::find(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Route"))?;
    let checkpoints = db::checkpoints::map(&mut conn).await?;
    Ok(Json(detail(&mut conn, route, &checkpoints).await?))
}

/// GET /routes/traffic_manager/{id}
async fn routes_of_traffic_manager(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RouteDetail>>> {
    let id = parse_id(&id, "traffic manager id")?;
    let mut conn = state.pool.acquire().await?;
    let routes = db::routes::list_by_traffic_manager(&mut conn, id).await?;
    Ok(Json(details(&mut conn, routes).await?))
}

/// "City, Country" の列に直したルート
#[derive(Debug, Serialize)]
struct ParsedRoute {
    id: Uuid,
    name: String,
    route: Vec<String>,
}

/// GET /routes/traffic_manager/parsed/{id}
async fn parsed_routes_of_traffic_manager(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ParsedRoute>>> {
    let id = parse_id(&id, "traffic manager id")?;
    let mut conn = state.pool.acquire().await?;
    let routes = db::routes::list_by_traffic_manager(&mut conn, id).await?;

    let parsed = details(&mut conn, routes)
        .await?
        .into_iter()
        .map(|detail| ParsedRoute {
            id: detail.route.id,
            name: detail.route.name,
            route: detail
                .checkpoints
                .iter()
                .map(|stop| stop.checkpoint.label())
                .collect(),
        })
        .collect();
    Ok(Json(parsed))
}
