use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bson::{oid::ObjectId, Document};
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use wander_backend::config::AppConfig;
use wander_backend::payments::{GatewayError, GatewayResult, PaymentGateway, PaymentIntent};
use wander_backend::routes;
use wander_backend::state::AppState;
use wander_backend::store::{Collection, DocumentStore, MemoryStore};

#[allow(dead_code)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentCall {
    pub amount: i64,
    pub currency: String,
}

#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<IntentCall>>,
    reject: bool,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> GatewayResult<PaymentIntent> {
        if self.reject {
            return Err(GatewayError::Rejected {
                status: 402,
                message: "card declined".to_string(),
            });
        }
        let mut calls = self.calls.lock().await;
        calls.push(IntentCall {
            amount,
            currency: currency.to_string(),
        });
        Ok(PaymentIntent {
            id: format!("pi_{}", calls.len()),
            client_secret: format!("pi_{}_secret_{amount}", calls.len()),
        })
    }
}

impl FakeGateway {
    #[allow(dead_code)]
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub async fn calls(&self) -> Vec<IntentCall> {
        self.calls.lock().await.clone()
    }
}

pub struct TestApp {
    #[allow(dead_code)]
    pub state: AppState,
    router: Router,
    store: MemoryStore,
    gateway: Arc<FakeGateway>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_uri: "mongodb://localhost:27017".to_string(),
        database_name: "wanderTest".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        stripe_secret_key: "sk_test_fake".to_string(),
        stripe_api_base: "http://127.0.0.1:0".to_string(),
        payment_currency: "bdt".to_string(),
        payment_timeout_secs: 5,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::default())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(gateway);
        let store_for_state: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let gateway_for_state: Arc<dyn PaymentGateway> = gateway.clone();
        let state = AppState::new(store_for_state, gateway_for_state, test_config());
        let router = routes::create_router(state.clone());

        Self {
            state,
            router,
            store,
            gateway,
        }
    }

    #[allow(dead_code)]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    #[allow(dead_code)]
    pub fn gateway(&self) -> Arc<FakeGateway> {
        self.gateway.clone()
    }

    /// Inserts a raw document, bypassing request validation.
    #[allow(dead_code)]
    pub async fn seed(&self, collection: Collection, document: Document) -> Result<ObjectId> {
        let outcome = self.store.insert_one(collection, document).await?;
        Ok(outcome.inserted_id)
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<Response> {
        self.send_json(Method::PUT, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response> {
        self.send_json(Method::PATCH, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str) -> Result<Response> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        self.dispatch(request).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<Response> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        self.dispatch(request).await
    }

    /// Issues a GET and decodes the JSON body, asserting the status.
    #[allow(dead_code)]
    pub async fn get_json(&self, path: &str, expected: StatusCode) -> Result<Value> {
        let response = self.get(path).await?;
        expect_json(response, expected).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<Response> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<Response> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| anyhow!("router failed: {err}"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

/// Checks the status and decodes the body, printing it on mismatch.
pub async fn expect_json(response: Response, expected: StatusCode) -> Result<Value> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    if status != expected {
        return Err(anyhow!(
            "expected {expected}, got {status}: {}",
            String::from_utf8_lossy(&body)
        ));
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Pulls a hex id out of a JSON field such as `insertedId`.
#[allow(dead_code)]
pub fn object_id(value: &Value, field: &str) -> Result<ObjectId> {
    let hex = value[field]
        .as_str()
        .ok_or_else(|| anyhow!("{field} missing from {value}"))?;
    Ok(ObjectId::parse_str(hex)?)
}
