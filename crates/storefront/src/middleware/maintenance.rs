//! Maintenance mode.
//!
//! When the remote maintenance flag is on, non-admin visitors get a 503
//! holding page. Auth, static assets and health checks stay reachable so
//! admins can still log in. If the flag cannot be fetched the site stays up.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::page::PageContext;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::state::AppState;

/// Path prefixes served even during maintenance.
const EXEMPT_PREFIXES: [&str; 3] = ["/auth", "/static", "/health"];

const DEFAULT_MESSAGE: &str = "We are making some improvements. Please check back soon.";

#[derive(Template, WebTemplate)]
#[template(path = "maintenance.html")]
pub struct MaintenanceTemplate {
    pub page: PageContext,
    pub message: String,
}

fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Serve the holding page to non-admins while maintenance mode is on.
///
/// Needs the session and CSP nonce layers outside it.
pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let fetcher = Fetcher::new();
    let config = match fetcher.run(state.api().maintenance_config()).await {
        FetchOutcome::Data(config) => config,
        FetchOutcome::Cancelled => return next.run(request).await,
        FetchOutcome::Failed(e) => {
            tracing::warn!(error = %e, "Could not fetch maintenance flag, serving normally");
            return next.run(request).await;
        }
    };

    if !config.enabled {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let Ok(page) = PageContext::from_request_parts(&mut parts, &state).await;

    if page.is_admin() {
        return next.run(Request::from_parts(parts, body)).await;
    }

    tracing::debug!(path = %parts.uri.path(), "Serving maintenance page");

    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(RETRY_AFTER, "300")],
        MaintenanceTemplate {
            page,
            message: config.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
        },
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/auth/login"));
        assert!(is_exempt("/static/css/main.css"));
        assert!(is_exempt("/health"));
        assert!(is_exempt("/health/ready"));
        assert!(!is_exempt("/"));
        assert!(!is_exempt("/products"));
        assert!(!is_exempt("/authors"));
    }
}
