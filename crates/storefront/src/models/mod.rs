//! Domain models for the storefront.

pub mod session;

pub use session::{ApiToken, AuthSession, SessionUser, keys};
