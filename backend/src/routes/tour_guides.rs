use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::AppResult,
    state::AppState,
    store::{Collection, Filter},
    utils::json::documents_to_json,
};

use super::fetch_by_id;

pub async fn list_tour_guides(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let guides = state
        .store()
        .find_many(Collection::TourGuides, Filter::All)
        .await?;
    Ok(Json(documents_to_json(guides)))
}

pub async fn get_tour_guide(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    fetch_by_id(&state, Collection::TourGuides, &id, "tour guide").await
}
