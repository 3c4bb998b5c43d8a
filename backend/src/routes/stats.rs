use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::AppResult,
    models::ROLE_TOURIST,
    state::AppState,
    store::{Collection, DocumentStore, Filter, StoreResult},
    utils::json::{decimal_value, lenient_number},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_packages: u64,
    pub total_tour_guides: u64,
    pub total_clients: u64,
    pub total_stories: u64,
    pub total_payment: Value,
}

async fn sum_payments(store: &dyn DocumentStore) -> StoreResult<Decimal> {
    let payments = store.find_many(Collection::Payments, Filter::All).await?;
    Ok(payments
        .iter()
        .map(|payment| lenient_number(payment.get("price")))
        .fold(Decimal::ZERO, Decimal::saturating_add))
}

/// Dashboard counters. The queries run concurrently and share no snapshot;
/// any single failure fails the whole response.
pub async fn admin_stats(State(state): State<AppState>) -> AppResult<Json<AdminStats>> {
    let store = state.store();
    let (total_packages, total_tour_guides, total_clients, total_stories, total_payment) =
        tokio::try_join!(
            store.count(Collection::Packages, Filter::All),
            store.count(Collection::TourGuides, Filter::All),
            store.count(Collection::Users, Filter::eq("role", ROLE_TOURIST)),
            store.count(Collection::Stories, Filter::All),
            sum_payments(store),
        )?;

    Ok(Json(AdminStats {
        total_packages,
        total_tour_guides,
        total_clients,
        total_stories,
        total_payment: decimal_value(total_payment),
    }))
}
