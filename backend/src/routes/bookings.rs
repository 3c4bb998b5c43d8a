use axum::{
    extract::{Path, Query, State},
    Json,
};
use bson::doc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{AppResult, ValidJson},
    models::{BookingStatusUpdate, NewBooking},
    state::AppState,
    store::{Collection, Filter, Update},
    utils::json::documents_to_json,
};

use super::{fetch_by_id, non_empty, parse_object_id, InsertResponse, UpdateResponse};

#[derive(Deserialize)]
pub struct TouristQuery {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

fn tourist_filter(query: TouristQuery) -> Filter {
    match non_empty(query.email) {
        Some(email) => Filter::eq("touristEmail", email),
        None => Filter::All,
    }
}

pub async fn create_booking(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewBooking>,
) -> AppResult<Json<InsertResponse>> {
    let document = payload.into_document()?;
    let outcome = state
        .store()
        .insert_one(Collection::Bookings, document)
        .await?;
    tracing::info!(booking_id = %outcome.inserted_id, "created booking");
    Ok(Json(outcome.into()))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<TouristQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let bookings = state
        .store()
        .find_many(Collection::Bookings, tourist_filter(query))
        .await?;
    Ok(Json(documents_to_json(bookings)))
}

pub async fn list_guide_bookings(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<Value>>> {
    let bookings = state
        .store()
        .find_many(Collection::Bookings, Filter::eq("tourGuideEmail", email))
        .await?;
    Ok(Json(documents_to_json(bookings)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    fetch_by_id(&state, Collection::Bookings, &id, "booking").await
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<BookingStatusUpdate>,
) -> AppResult<Json<UpdateResponse>> {
    let booking_id = parse_object_id(&id, "booking")?;
    let outcome = state
        .store()
        .update_one(
            Collection::Bookings,
            Filter::Id(booking_id),
            Update::set(doc! { "status": payload.status.as_str() }),
            false,
        )
        .await?;
    tracing::info!(
        %booking_id,
        status = %payload.status,
        modified = outcome.modified_count,
        "updated booking status"
    );
    Ok(Json(outcome.into()))
}

pub async fn count_bookings(
    State(state): State<AppState>,
    Query(query): Query<TouristQuery>,
) -> AppResult<Json<CountResponse>> {
    let count = state
        .store()
        .count(Collection::Bookings, tourist_filter(query))
        .await?;
    Ok(Json(CountResponse { count }))
}
