//! Catalog cache endpoint.

use axum::{extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::add_breadcrumb;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Drop cached products, categories and brands so the next page view
/// re-reads them from the API. Admin only.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn refresh(State(state): State<AppState>, RequireAdmin(auth): RequireAdmin) -> StatusCode {
    state.api().invalidate_catalog();
    tracing::info!("Catalog cache invalidated by admin");
    add_breadcrumb("admin", "Refreshed catalog", &[("user_id", auth.user.id.as_str())]);
    StatusCode::NO_CONTENT
}
