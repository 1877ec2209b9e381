//! Per-request CSP nonce.
//!
//! Inline `<script>` blocks in templates carry `nonce="{{ page.nonce }}"`;
//! the same value is emitted in the `script-src` directive by
//! [`security_headers_middleware`](super::security_headers_middleware).

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// A 128-bit random nonce, base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(pub String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// CSP source expression, e.g. `'nonce-abc=='`.
    #[must_use]
    pub fn source(&self) -> String {
        format!("'nonce-{}'", self.0)
    }
}

/// Generate a nonce and store it in request extensions.
///
/// Must run before `security_headers_middleware`.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("CSP nonce missing from request extensions");
            Self(String::new())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique_and_sized() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a, b);
        // 16 bytes -> 24 base64 chars with padding
        assert_eq!(a.value().len(), 24);
        assert!(a.source().starts_with("'nonce-"));
    }
}
