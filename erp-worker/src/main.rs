//! # ERP Worker
//!
//! Runs the subscription sweeper against the master database until Ctrl-C.
//!
//! ## Usage
//!
//! ```text
//! ERP__MASTER_DATABASE__URL=postgresql://localhost/erp_master cargo run -p erp-worker
//! ```

use std::sync::Arc;

use anyhow::Context;
use erp_shared::data::{PgBackend, TenantPoolConfig};
use erp_shared::db::pool::create_pool;
use erp_shared::tenancy::TenantService;
use erp_worker::config::WorkerConfig;
use erp_worker::sweeper::SubscriptionSweeper;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("ERP Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(&config.master_database)
        .await
        .context("Failed to connect to the master database")?;

    let backend = PgBackend::new(pool, TenantPoolConfig::default());
    let tenants = TenantService::new(backend, config.retry.strategy());
    let sweeper = Arc::new(SubscriptionSweeper::new(tenants, config.sweeper.clone()));

    let shutdown = sweeper.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received, finishing current sweep...");
        shutdown.cancel();
    });

    sweeper.run().await;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "erp_worker=debug,erp_shared=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
