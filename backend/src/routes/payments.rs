use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    error::{AppResult, ValidJson},
    models::{NewPayment, PaymentIntentRequest},
    payments::to_minor_units,
    state::AppState,
    workflows,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentResponse {
    pub inserted_id: String,
    pub updated: u64,
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<PaymentIntentRequest>,
) -> AppResult<Json<PaymentIntentResponse>> {
    let amount = to_minor_units(payload.price.amount())?;
    let intent = state
        .payments
        .create_payment_intent(amount, &state.config.payment_currency)
        .await?;
    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}

pub async fn record_payment(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<NewPayment>,
) -> AppResult<Json<RecordPaymentResponse>> {
    let booking_id = payload.booking_id.clone();
    let transaction_id = payload.transaction_id.clone();
    let document = payload.into_document()?;

    let recorded =
        workflows::record_payment(state.store(), document, &booking_id, &transaction_id).await?;

    Ok(Json(RecordPaymentResponse {
        inserted_id: recorded.payment_id.to_hex(),
        updated: recorded.bookings_updated,
    }))
}
