use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult, ValidJson},
    models::NewGuideApplication,
    state::AppState,
    store::{Collection, Filter},
    utils::json::documents_to_json,
    workflows::{self, WorkflowError},
};

use super::{delete_by_id, parse_object_id, DeleteResponse, InsertResponse};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptApplicationResponse {
    pub message: &'static str,
    pub tour_guide_id: String,
}

pub async fn create_application(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewGuideApplication>,
) -> AppResult<Json<InsertResponse>> {
    let document = payload.into_document()?;
    let outcome = state
        .store()
        .insert_one(Collection::GuideApplications, document)
        .await?;
    tracing::info!(application_id = %outcome.inserted_id, "received guide application");
    Ok(Json(outcome.into()))
}

pub async fn list_applications(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let applications = state
        .store()
        .find_many(Collection::GuideApplications, Filter::All)
        .await?;
    Ok(Json(documents_to_json(applications)))
}

pub async fn accept_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AcceptApplicationResponse>> {
    let application_id = parse_object_id(&id, "application")?;
    let accepted = workflows::accept_application(state.store(), application_id)
        .await
        .map_err(|err| match err {
            WorkflowError::ApplicationNotFound => AppError::not_found("application"),
            WorkflowError::Store(err) => AppError::from(err),
        })?;

    Ok(Json(AcceptApplicationResponse {
        message: "Application accepted, user role updated, and tour guide created.",
        tour_guide_id: accepted.tour_guide_id.to_hex(),
    }))
}

/// Rejects an application by removing it.
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    delete_by_id(&state, Collection::GuideApplications, &id, "application").await
}
