//! Case Ledger HTTP server - Binary Entry Point

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use case_ledger::api::{create_router, AppState};
use case_ledger::{CaseStore, Config, IntakeAgent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(CaseStore::open(&config.store_config())?);
    let agent = IntakeAgent::from_config(Arc::clone(&store), config.nlp.clone());
    let app = create_router(Arc::new(AppState::new(store, agent)));

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        name = case_ledger::NAME,
        version = case_ledger::VERSION,
        "starting case server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
