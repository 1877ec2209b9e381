//! Session store migration.
//!
//! The storefront database holds nothing but server-side sessions. The table
//! is created by `tower-sessions-sqlx-store`; there are no hand-written SQL
//! migrations.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string

use secrecy::SecretString;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use perfumeria_storefront::db;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create the `tower_sessions.session` table if it does not exist.
///
/// # Errors
///
/// Returns an error if the URL is missing or the database rejects the DDL.
pub async fn sessions() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Session store ready");
    Ok(())
}
