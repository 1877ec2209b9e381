//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. CSP nonce
//! 5. Security headers (CSP with nonce, HSTS-free isolation headers)
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Maintenance mode (needs session and nonce)
//! 8. Rate limiting on auth and cart routes (governor)

pub mod auth;
pub mod csp;
pub mod maintenance;
pub mod page;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{LOGIN_PATH, OptionalAuth, RequireAdmin, RequireAuth, safe_next};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use maintenance::maintenance_middleware;
pub use page::PageContext;
pub use rate_limit::{auth_rate_limiter, cart_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
