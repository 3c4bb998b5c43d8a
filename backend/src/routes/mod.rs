use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use bson::oid::ObjectId;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    store::{Collection, DeleteOutcome, Filter, InsertOutcome, UpdateOutcome},
    utils::json::document_to_json,
};

pub mod applications;
pub mod bookings;
pub mod health;
pub mod packages;
pub mod payments;
pub mod stats;
pub mod stories;
pub mod tour_guides;
pub mod users;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    let users_routes = Router::new().route("/", get(users::list_users)).route(
        "/:email",
        get(users::get_user)
            .put(users::upsert_user)
            .delete(users::delete_user),
    );

    let packages_routes = Router::new()
        .route(
            "/",
            get(packages::list_packages).post(packages::create_package),
        )
        .route("/:id", get(packages::get_package));

    let applications_routes = Router::new()
        .route(
            "/",
            get(applications::list_applications).post(applications::create_application),
        )
        .route("/:id", delete(applications::delete_application))
        .route("/:id/accept", patch(applications::accept_application));

    let tour_guides_routes = Router::new()
        .route("/", get(tour_guides::list_tour_guides))
        .route("/:id", get(tour_guides::get_tour_guide));

    let stories_routes = Router::new()
        .route("/", get(stories::list_stories).post(stories::create_story))
        .route(
            "/:id",
            get(stories::get_story)
                .put(stories::update_story)
                .delete(stories::delete_story),
        )
        .route("/:id/remove-image", put(stories::remove_image));

    let bookings_routes = Router::new()
        .route(
            "/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/count", get(bookings::count_bookings))
        .route("/guide/:email", get(bookings::list_guide_bookings))
        .route(
            "/:id",
            get(bookings::get_booking).patch(bookings::update_booking_status),
        );

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/users", users_routes)
        .nest("/packages", packages_routes)
        .nest("/applications", applications_routes)
        .nest("/tour-guides", tour_guides_routes)
        .nest("/stories", stories_routes)
        .nest("/bookings", bookings_routes)
        .route(
            "/create-payment-intent",
            post(payments::create_payment_intent),
        )
        .route("/payments", post(payments::record_payment))
        .route("/stats", get(stats::admin_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResponse {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl From<InsertOutcome> for InsertResponse {
    fn from(outcome: InsertOutcome) -> Self {
        Self {
            acknowledged: true,
            inserted_id: outcome.inserted_id.to_hex(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            acknowledged: true,
            matched_count: outcome.matched_count,
            modified_count: outcome.modified_count,
            upserted_id: outcome.upserted_id.map(|id| id.to_hex()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl From<DeleteOutcome> for DeleteResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        Self {
            acknowledged: true,
            deleted_count: outcome.deleted_count,
        }
    }
}

pub(crate) fn parse_object_id(raw: &str, resource: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::bad_request(format!("invalid {resource} id")))
}

/// Treats `?key=` the same as an absent parameter.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub(crate) async fn fetch_by_id(
    state: &AppState,
    collection: Collection,
    raw_id: &str,
    resource: &str,
) -> AppResult<Json<Value>> {
    let id = parse_object_id(raw_id, resource)?;
    let document = state
        .store()
        .find_one(collection, Filter::Id(id))
        .await?
        .ok_or_else(|| AppError::not_found(resource))?;
    Ok(Json(document_to_json(document)))
}

pub(crate) async fn delete_by_id(
    state: &AppState,
    collection: Collection,
    raw_id: &str,
    resource: &str,
) -> AppResult<Json<DeleteResponse>> {
    let id = parse_object_id(raw_id, resource)?;
    let outcome = state.store().delete_one(collection, Filter::Id(id)).await?;
    if outcome.deleted_count == 0 {
        return Err(AppError::not_found(resource));
    }
    tracing::info!(collection = collection.name(), %id, "deleted document");
    Ok(Json(outcome.into()))
}
