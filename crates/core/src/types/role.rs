//! User roles as reported by the remote API.

use serde::{Deserialize, Deserializer, Serialize};

/// Role attached to an authenticated user.
///
/// Unknown role strings deserialize as [`Role::Customer`] so a new role on
/// the API side never grants elevated access here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Customer
        })
    }
}

impl Role {
    /// Whether this role may bypass maintenance mode and manage caches.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_roles() {
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
        assert_eq!(
            serde_json::from_str::<Role>("\"customer\"").unwrap(),
            Role::Customer
        );
        assert_eq!(serde_json::from_str::<Role>("\"user\"").unwrap(), Role::Customer);
    }

    #[test]
    fn test_unknown_role_is_customer() {
        let role: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(role, Role::Customer);
        assert!(!role.is_admin());
    }
}
