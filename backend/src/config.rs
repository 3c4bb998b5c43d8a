use std::env;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_DATABASE_NAME: &str = "wanderBD";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_PAYMENT_CURRENCY: &str = "bdt";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = [
    "https://sunny-faun-0d2e90.netlify.app",
    "http://localhost:5173",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_uri: String,
    pub database_name: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub payment_currency: String,
    pub payment_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_uri = env::var("MONGODB_URI").context("MONGODB_URI must be set")?;
        let database_name =
            env::var("MONGODB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE_NAME.to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGIN")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| {
                DEFAULT_ALLOWED_ORIGINS
                    .iter()
                    .map(|origin| origin.to_string())
                    .collect()
            });
        let stripe_secret_key =
            env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;
        let stripe_api_base =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());
        let payment_currency = env::var("PAYMENT_CURRENCY")
            .unwrap_or_else(|_| DEFAULT_PAYMENT_CURRENCY.to_string())
            .to_lowercase();
        let payment_timeout_secs = env::var("PAYMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("PAYMENT_TIMEOUT_SECS must be an integer")?;

        Ok(Self {
            database_uri,
            database_name,
            server_host,
            server_port,
            cors_allowed_origins,
            stripe_secret_key,
            stripe_api_base,
            payment_currency,
            payment_timeout_secs,
        })
    }

    pub fn redacted_database_uri(&self) -> String {
        redact_database_uri(&self.database_uri)
    }

    pub fn redacted_stripe_key(&self) -> String {
        redact_secret_key(&self.stripe_secret_key)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn redact_database_uri(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}

// Stripe keys look like `sk_live_...`; keep the mode prefix only.
fn redact_secret_key(raw: &str) -> String {
    let prefix: String = raw
        .split('_')
        .take(2)
        .collect::<Vec<_>>()
        .join("_");
    if prefix.len() < raw.len() {
        format!("{prefix}_*****")
    } else {
        "*****".to_string()
    }
}
