//! # ERP API Server
//!
//! HTTP entry point of the multi-tenant ERP backend: tenant registry
//! management plus tenant-scoped inventory and customer endpoints.
//!
//! ## Usage
//!
//! ```text
//! ERP__MASTER_DATABASE__URL=postgresql://localhost/erp_master \
//! ERP__JWT__SECRET=$(openssl rand -hex 32) \
//! cargo run -p erp-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to filter.

use anyhow::Context;
use erp_api::app::{build_router, AppState};
use erp_api::config::Config;
use erp_shared::data::PgBackend;
use erp_shared::db::{migrations::run_master_migrations, pool::create_pool};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("ERP API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(&config.master_database)
        .await
        .context("Failed to connect to the master database")?;
    run_master_migrations(&pool)
        .await
        .context("Failed to migrate the master database")?;

    let backend = PgBackend::new(pool, config.tenant_database.pool_config());
    let bind_address = config.bind_address();
    let state = AppState::new(backend, config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "erp_api=debug,erp_shared=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
