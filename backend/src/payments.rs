use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("payment gateway response carried no client secret")]
    MissingClientSecret,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("price must be greater than zero")]
    NotPositive,
    #[error("price is smaller than the smallest currency unit")]
    BelowMinorUnit,
    #[error("price is too large")]
    TooLarge,
}

/// Converts a major-unit price into the integer minor-unit amount the gateway
/// expects, truncating anything below one minor unit.
pub fn to_minor_units(price: Decimal) -> Result<i64, AmountError> {
    if price <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    let minor = price
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AmountError::TooLarge)?
        .trunc()
        .to_i64()
        .ok_or(AmountError::TooLarge)?;
    if minor == 0 {
        return Err(AmountError::BelowMinorUnit);
    }
    Ok(minor)
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Creates a card-payable intent for `amount` minor units of `currency`.
    async fn create_payment_intent(&self, amount: i64, currency: &str)
        -> GatewayResult<PaymentIntent>;
}

pub struct StripeGateway {
    client: Client,
    intents_url: Url,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripeIntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(
        api_base: Url,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build payment gateway HTTP client")?;
        let intents_url = api_base
            .join("/v1/payment_intents")
            .context("failed to derive payment intents URL")?;
        Ok(Self {
            client,
            intents_url,
            secret_key: secret_key.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let api_base =
            Url::parse(&config.stripe_api_base).context("STRIPE_API_BASE must be a valid URL")?;
        Self::new(
            api_base,
            config.stripe_secret_key.clone(),
            Duration::from_secs(config.payment_timeout_secs),
        )
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> GatewayResult<PaymentIntent> {
        let form = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("payment_method_types[]", "card".to_string()),
        ];

        let response = self
            .client
            .post(self.intents_url.clone())
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent: StripeIntentResponse = response.json().await?;
        let client_secret = intent
            .client_secret
            .ok_or(GatewayError::MissingClientSecret)?;
        tracing::info!(intent_id = %intent.id, amount, currency, "created payment intent");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
        })
    }
}
