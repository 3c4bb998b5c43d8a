use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult, ValidJson},
    models::UserProfile,
    state::AppState,
    store::{Collection, Filter, Update},
    utils::json::{document_to_json, documents_to_json},
};

use super::{delete_by_id, non_empty, DeleteResponse, UpdateResponse};

#[derive(Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub search: Option<String>,
}

pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ValidJson(profile): ValidJson<UserProfile>,
) -> AppResult<Json<UpdateResponse>> {
    if email.trim().is_empty() {
        return Err(AppError::validation("email must not be empty"));
    }

    let fields = profile.into_set_document(&email)?;
    let outcome = state
        .store()
        .update_one(
            Collection::Users,
            Filter::eq("email", email.as_str()),
            Update::set(fields),
            true,
        )
        .await?;

    if let Some(id) = outcome.upserted_id {
        tracing::info!(%email, %id, "registered user");
    }
    Ok(Json(outcome.into()))
}

/// Responds with `null` for unknown emails; clients use this to check
/// whether someone has registered.
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Option<Value>>> {
    let user = state
        .store()
        .find_one(Collection::Users, Filter::eq("email", email))
        .await?;
    Ok(Json(user.map(document_to_json)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let mut clauses = Vec::new();
    if let Some(role) = non_empty(query.role) {
        clauses.push(Filter::eq("role", role));
    }
    if let Some(search) = non_empty(query.search) {
        clauses.push(Filter::contains_any(&["name", "email"], search));
    }

    let users = state
        .store()
        .find_many(Collection::Users, Filter::all_of(clauses))
        .await?;
    Ok(Json(documents_to_json(users)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    delete_by_id(&state, Collection::Users, &id, "user").await
}
