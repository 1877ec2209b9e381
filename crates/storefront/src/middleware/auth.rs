//! Authentication extractors.
//!
//! Read-only views of the authenticated session. Writes go through
//! [`SessionStore`](crate::services::SessionStore).

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{AuthSession, keys};

/// Path of the login page.
pub const LOGIN_PATH: &str = "/auth/login";

/// Extractor that requires a logged-in user.
///
/// ```rust,ignore
/// async fn account(RequireAuth(auth): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", auth.user.name)
/// }
/// ```
pub struct RequireAuth(pub AuthSession);

/// Extractor that requires a logged-in admin.
pub struct RequireAdmin(pub AuthSession);

/// Extractor that optionally gets the authenticated session.
pub struct OptionalAuth(pub Option<AuthSession>);

/// Rejection for [`RequireAuth`] and [`RequireAdmin`].
#[derive(Debug)]
pub enum AuthRejection {
    /// Send the browser to the login page, then back to `next`.
    RedirectToLogin { next: String, htmx: bool },
    /// Bare 401 (API requests).
    Unauthorized,
    /// Logged in but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next, htmx } => {
                let target = format!("{LOGIN_PATH}?next={}", url_encode_path(&next));
                if htmx {
                    // htmx ignores 3xx on fragment requests
                    let mut response = StatusCode::UNAUTHORIZED.into_response();
                    if let Ok(value) = HeaderValue::from_str(&target) {
                        response.headers_mut().insert("hx-redirect", value);
                    }
                    response
                } else {
                    Redirect::to(&target).into_response()
                }
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn url_encode_path(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
}

pub(crate) async fn session_auth(parts: &Parts) -> Option<AuthSession> {
    let session = parts.extensions.get::<Session>()?;
    match session.get::<AuthSession>(keys::AUTH).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read auth session");
            None
        }
    }
}

fn login_rejection(parts: &Parts) -> AuthRejection {
    let path = parts.uri.path();
    if path.starts_with("/api/") {
        return AuthRejection::Unauthorized;
    }
    AuthRejection::RedirectToLogin {
        next: parts
            .uri
            .path_and_query()
            .map_or_else(|| path.to_string(), ToString::to_string),
        htmx: parts.headers.contains_key("hx-request"),
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_auth(parts)
            .await
            .map(Self)
            .ok_or_else(|| login_rejection(parts))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = session_auth(parts)
            .await
            .ok_or_else(|| login_rejection(parts))?;

        if !auth.user.is_admin() {
            tracing::warn!(user_id = %auth.user.id, path = %parts.uri.path(), "Admin access denied");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self(auth))
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_auth(parts).await))
    }
}

/// Only allow same-site relative paths as post-login redirect targets.
///
/// Backslashes and control characters are rejected; browsers normalize
/// them into protocol-relative URLs.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/account",
    }
}
