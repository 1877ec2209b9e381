//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use std::fmt;

use serde::{Deserialize, Serialize};

use perfumeria_core::{Role, UserId};

use crate::api::ApiUser;

/// Bearer token issued by the API on login.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl SessionUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// First word of the name, for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl From<ApiUser> for SessionUser {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// The authenticated session: token and user always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: ApiToken,
    pub user: SessionUser,
}

/// Session keys.
pub mod keys {
    /// Authenticated session ([`super::AuthSession`]).
    pub const AUTH: &str = "auth";

    /// Cart contents and sidebar state.
    pub const CART: &str = "cart";

    /// Discount applied at checkout.
    pub const CHECKOUT_DISCOUNT: &str = "checkout_discount";

    /// Shipping quote selected at checkout.
    pub const CHECKOUT_SHIPPING: &str = "checkout_shipping";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let session = AuthSession {
            token: ApiToken::new("super-secret-token"),
            user: SessionUser {
                id: UserId::new("1"),
                name: "Ana Lopez".to_string(),
                email: "ana@example.com".to_string(),
                role: Role::Customer,
            },
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_auth_session_roundtrips_through_json() {
        let session = AuthSession {
            token: ApiToken::new("tok"),
            user: SessionUser {
                id: UserId::new("9"),
                name: "Admin".to_string(),
                email: "admin@example.com".to_string(),
                role: Role::Admin,
            },
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["token"], "tok");
        let back: AuthSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
        assert!(back.user.is_admin());
    }

    #[test]
    fn test_first_name() {
        let user = SessionUser {
            id: UserId::new("1"),
            name: "Ana Lopez".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Customer,
        };
        assert_eq!(user.first_name(), "Ana");
    }
}
