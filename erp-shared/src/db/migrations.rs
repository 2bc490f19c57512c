//! Schema migrations
//!
//! Two independent migration sets are embedded at compile time:
//!
//! - `migrations/master`: tenant registry (tenants, modules, subscriptions,
//!   tenant users)
//! - `migrations/tenant`: business schema applied to every tenant database
//!
//! Each set records its progress in the `_sqlx_migrations` table of the
//! database it was applied to.

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::{debug, info, warn};

use crate::data::DataError;
use crate::models::DatabaseInfo;

static MASTER_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/master");
static TENANT_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/tenant");

/// Applies pending master migrations
///
/// # Errors
///
/// Returns an error if a migration fails; the failing migration is rolled
/// back.
pub async fn run_master_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    run(&MASTER_MIGRATIONS, pool, "master").await
}

/// Applies pending tenant migrations to one tenant database
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn run_tenant_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    run(&TENANT_MIGRATIONS, pool, "tenant").await
}

async fn run(migrator: &Migrator, pool: &PgPool, set: &'static str) -> Result<(), MigrateError> {
    info!(set, "Starting database migrations");
    match migrator.run(pool).await {
        Ok(()) => {
            info!(set, "Database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(set, error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Creates the database if it doesn't exist
///
/// # Errors
///
/// Returns an error if the server is unreachable or refuses the creation.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
        info!("Database created successfully");
    } else {
        debug!("Database already exists");
    }
    Ok(())
}

/// Creates a tenant's database if missing and applies the tenant schema
///
/// # Errors
///
/// Fails when the database cannot be created, reached or migrated.
pub async fn provision_tenant_database(info: &DatabaseInfo) -> Result<(), DataError> {
    info!(database = %info, "Provisioning tenant database");
    ensure_database_exists(&info.connection_url()).await?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(info.connect_options())
        .await?;
    let result = run_tenant_migrations(&pool).await;
    pool.close().await;
    result?;
    Ok(())
}

/// Drops the database if it exists
///
/// Deletes every row it holds; meant for test setups.
///
/// # Errors
///
/// Returns an error if the server refuses, e.g. while connections are open.
pub async fn drop_database(database_url: &str) -> Result<(), sqlx::Error> {
    warn!("Dropping database");
    if Postgres::database_exists(database_url).await? {
        Postgres::drop_database(database_url).await?;
    }
    Ok(())
}
