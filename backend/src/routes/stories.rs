use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppResult, ValidJson},
    models::{NewStory, RemoveImage, StoryUpdate},
    state::AppState,
    store::{Collection, Filter, Update},
    utils::json::documents_to_json,
};

use super::{
    delete_by_id, fetch_by_id, non_empty, parse_object_id, DeleteResponse, InsertResponse,
    UpdateResponse,
};

#[derive(Deserialize)]
pub struct StoryQuery {
    pub email: Option<String>,
}

pub async fn create_story(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewStory>,
) -> AppResult<Json<InsertResponse>> {
    let document = payload.into_document()?;
    let outcome = state
        .store()
        .insert_one(Collection::Stories, document)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn list_stories(
    State(state): State<AppState>,
    Query(query): Query<StoryQuery>,
) -> AppResult<Json<Vec<Value>>> {
    let filter = match non_empty(query.email) {
        Some(email) => Filter::eq("authorEmail", email),
        None => Filter::All,
    };
    let stories = state
        .store()
        .find_many(Collection::Stories, filter)
        .await?;
    Ok(Json(documents_to_json(stories)))
}

pub async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    fetch_by_id(&state, Collection::Stories, &id, "story").await
}

pub async fn delete_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    delete_by_id(&state, Collection::Stories, &id, "story").await
}

/// Drops every occurrence of the image from the story's gallery.
pub async fn remove_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<RemoveImage>,
) -> AppResult<Json<UpdateResponse>> {
    let story_id = parse_object_id(&id, "story")?;
    let outcome = state
        .store()
        .update_one(
            Collection::Stories,
            Filter::Id(story_id),
            Update::pull("images", payload.image),
            false,
        )
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn update_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<StoryUpdate>,
) -> AppResult<Json<UpdateResponse>> {
    let story_id = parse_object_id(&id, "story")?;
    tracing::debug!(
        %story_id,
        new_images = payload.new_images.len(),
        "updating story"
    );

    let update =
        Update::set(payload.set_document()).with_push_each("images", payload.appended_images());
    let outcome = state
        .store()
        .update_one(Collection::Stories, Filter::Id(story_id), update, false)
        .await?;
    Ok(Json(outcome.into()))
}
