//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to every response. The CSP allows:
//! - scripts from self, the request's nonce, and htmx from unpkg
//! - images from any https origin and `data:` (product images live on CDNs)
//!
//! ```text
//! default-src 'none';
//! script-src 'self' 'nonce-…' https://unpkg.com;
//! style-src 'self';
//! font-src 'self';
//! img-src 'self' https: data:;
//! connect-src 'self';
//! frame-src 'none';
//! object-src 'none';
//! base-uri 'self';
//! form-action 'self' https:;
//! frame-ancestors 'none';
//! upgrade-insecure-requests
//! ```
//!
//! `form-action` permits https targets because checkout redirects to the
//! payment provider.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

const HTMX_ORIGIN: &str = "https://unpkg.com";

/// Build the CSP header value for a request nonce.
#[must_use]
pub fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = nonce.map_or_else(
        || format!("script-src 'self' {HTMX_ORIGIN}"),
        |n| format!("script-src 'self' {} {HTMX_ORIGIN}", n.source()),
    );

    [
        "default-src 'none'",
        script_src.as_str(),
        "style-src 'self'",
        "font-src 'self'",
        "img-src 'self' https: data:",
        "connect-src 'self'",
        "frame-src 'none'",
        "object-src 'none'",
        "base-uri 'self'",
        "form-action 'self' https:",
        "frame-ancestors 'none'",
        "upgrade-insecure-requests",
    ]
    .join("; ")
}

/// Add security headers to all responses.
///
/// Must run inside `csp_nonce_middleware` so the nonce is in extensions.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let csp = content_security_policy(request.extensions().get::<CspNonce>());

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    match HeaderValue::from_str(&csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Invalid CSP header value"),
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             payment=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Static assets set their own caching; pages carry session state.
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    // CDN images rarely send CORP headers.
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );

    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request as HttpRequest, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::csp::csp_nonce_middleware;

    #[test]
    fn test_policy_includes_nonce() {
        let nonce = CspNonce("abc123==".to_string());
        let policy = content_security_policy(Some(&nonce));
        assert!(policy.contains("script-src 'self' 'nonce-abc123==' https://unpkg.com"));
        assert!(policy.contains("img-src 'self' https: data:"));
    }

    #[test]
    fn test_policy_without_nonce() {
        let policy = content_security_policy(None);
        assert!(policy.contains("script-src 'self' https://unpkg.com;"));
        assert!(!policy.contains("nonce-"));
    }

    #[tokio::test]
    async fn test_headers_applied_with_request_nonce() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(csp_nonce_middleware));

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-store, max-age=0");
        let csp = headers.get(CONTENT_SECURITY_POLICY).unwrap().to_str().unwrap();
        assert!(csp.contains("'nonce-"));
    }
}
