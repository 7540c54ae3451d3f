use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_id, ApiJson, AppState};
use crate::db;
use crate::error::{AppError, Result};
use crate::geography::{is_city_in_country, City, Country};
use crate::models::Checkpoint;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkpoints", get(list_checkpoints).post(create_checkpoint))
        .route("/checkpoints/{id}", get(get_checkpoint))
        .route("/checkpoints/countries/{country}/cities", get(cities_of_country))
        .route("/checkpoints/cities/{city}/country", get(country_of_city))
}

/// GET /checkpoints
async fn list_checkpoints(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Checkpoint>>> {
    let mut conn = state.pool.acquire().await?;
    Ok(Json(db::checkpoints::list(&mut conn).await?))
}

/// GET /checkpoints/{id}
async fn get_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Checkpoint>> {
    let id = parse_id(&id, "checkpoint id")?;
    let mut conn = state.pool.acquire().await?;
    db::checkpoints::find(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Checkpoint"))
}

#[derive(Debug, Deserialize)]
struct CreateCheckpointPayload {
    name: City,
    country: Country,
}

/// POST /checkpoints
async fn create_checkpoint(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateCheckpointPayload>,
) -> Result<(StatusCode, Json<Checkpoint>)> {
    if !is_city_in_country(payload.name, payload.country) {
        return Err(AppError::BadRequest(format!(
            "{} is not in {}",
            payload.name, payload.country
        )));
    }

    let checkpoint = Checkpoint {
        id: Uuid::new_v4(),
        name: payload.name,
        country: payload.country,
    };
    let mut conn = state.pool.acquire().await?;
    db::checkpoints::insert(&mut conn, &checkpoint).await?;
    Ok((StatusCode::CREATED, Json(checkpoint)))
}

#[derive(Debug, Serialize)]
struct CitiesResponse {
    country: Country,
    cities: &'static [City],
}

/// GET /checkpoints/countries/{country}/cities
async fn cities_of_country(Path(country): Path<String>) -> Result<Json<CitiesResponse>> {
    let country: Country = country
        .parse()
        .map_err(|_| AppError::not_found("Country"))?;
    Ok(Json(CitiesResponse {
        country,
        cities: country.cities(),
    }))
}

#[derive(Debug, Serialize)]
struct CountryResponse {
    city: City,
    country: Country,
}

/// GET /checkpoints/cities/{city}/country
async fn country_of_city(Path(city): Path<String>) -> Result<Json<CountryResponse>> {
    let city: City = city.parse().map_err(|_| AppError::not_found("City"))?;
    Ok(Json(CountryResponse {
        city,
        country: city.country(),
    }))
}
