use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::{AppResult, ValidJson},
    models::NewPackage,
    state::AppState,
    store::{Collection, Filter},
    utils::json::documents_to_json,
};

use super::{fetch_by_id, InsertResponse};

pub async fn list_packages(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let packages = state
        .store()
        .find_many(Collection::Packages, Filter::All)
        .await?;
    Ok(Json(documents_to_json(packages)))
}

pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    fetch_by_id(&state, Collection::Packages, &id, "package").await
}

pub async fn create_package(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewPackage>,
) -> AppResult<Json<InsertResponse>> {
    let document = payload.into_document()?;
    let outcome = state
        .store()
        .insert_one(Collection::Packages, document)
        .await?;
    tracing::info!(package_id = %outcome.inserted_id, "created package");
    Ok(Json(outcome.into()))
}
