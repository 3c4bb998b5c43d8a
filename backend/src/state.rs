use std::sync::Arc;

use crate::{config::AppConfig, payments::PaymentGateway, store::DocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentGateway>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            payments,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
