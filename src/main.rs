use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use minibank::{
    config::Config,
    create_app,
    db::{InMemoryLedgerStore, LedgerStore, PgLedgerStore, pool::create_pool},
    services::ledger_service::LedgerService,
    state::AppState,
};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("minibank=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
        return Ok(Arc::new(InMemoryLedgerStore::new()));
    };

    tracing::info!("connecting to db");
    let pool = create_pool(url, config.db_max_connections)
        .await
        .context("failed to connect to db")?;
    let store = PgLedgerStore::new(pool);
    store.migrate().await.context("failed to apply db schema")?;
    tracing::info!("db connected");

    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("invalid configuration")?;
    let store = open_store(&config).await?;

    let state = AppState {
        ledger: LedgerService::new(store, config.account_number_attempts),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind tcp listener on {addr}"))?;

    tracing::info!(%addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}
