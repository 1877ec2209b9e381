//! Session layer backed by `PostgreSQL` via tower-sessions.
//!
//! The session holds the cart, the authenticated session and pending checkout
//! state (see [`crate::models::keys`]).

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, cookie::SameSite, cookie::time::Duration};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "perfumeria_session";

/// Inactivity expiry (7 days).
const SESSION_INACTIVITY_DAYS: i64 = 7;

/// Create the session layer.
///
/// The `tower_sessions` table must exist (`perfumeria-cli migrate`).
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(PostgresStore::new(pool.clone()))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_INACTIVITY_DAYS)))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
