//! Layout context shared by every full-page template.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use perfumeria_core::CartState;

use super::auth::session_auth;
use super::csp::CspNonce;
use crate::models::{SessionUser, keys};
use crate::state::AppState;

/// Data the base layout needs: store name, header user menu, cart badge and
/// the CSP nonce for inline scripts.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub store_name: String,
    pub user: Option<SessionUser>,
    pub cart_count: u32,
    pub nonce: String,
    /// Request path, for highlighting the active nav link.
    pub path: String,
}

impl PageContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(SessionUser::is_admin)
    }

    /// Whether `prefix` is the active section.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = session_auth(parts).await.map(|auth| auth.user);

        let cart_count = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CartState>(keys::CART)
                .await
                .ok()
                .flatten()
                .map_or(0, |cart| cart.item_count()),
            None => 0,
        };

        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_owned())
            .unwrap_or_default();

        Ok(Self {
            store_name: state.config().store_name.clone(),
            user,
            cart_count,
            nonce,
            path: parts.uri.path().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        let page = PageContext {
            path: "/products/p1".to_string(),
            ..Default::default()
        };
        assert!(page.is_active("/products"));
        assert!(!page.is_active("/"));
        assert!(!page.is_admin());
    }
}
