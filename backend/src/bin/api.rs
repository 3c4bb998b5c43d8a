use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use wander_backend::config::AppConfig;
use wander_backend::payments::StripeGateway;
use wander_backend::routes;
use wander_backend::state::AppState;
use wander_backend::store::{DocumentStore, MongoStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_uri = %config.redacted_database_uri(),
        database = %config.database_name,
        server_host = %config.server_host,
        server_port = config.server_port,
        cors_origins = ?config.cors_allowed_origins,
        stripe_key = %config.redacted_stripe_key(),
        payment_currency = %config.payment_currency,
        "loaded backend configuration"
    );

    let store = Arc::new(MongoStore::connect(&config.database_uri, &config.database_name).await?);
    let gateway = Arc::new(StripeGateway::from_config(&config)?);
    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(store.clone(), gateway, config);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.shutdown().await;
    tracing::info!("database connection closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
