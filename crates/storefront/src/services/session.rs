//! Authenticated session store.
//!
//! The `auth` record of the visitor's server-side session is the only copy of
//! the token and user. [`SessionStore`] is the only code that writes it;
//! extractors and templates read derived views.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use thiserror::Error;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{AuthSession, keys};

/// Error reading or writing the session record.
#[derive(Debug, Error)]
#[error("session store error: {0}")]
pub struct SessionError(#[from] tower_sessions::session::Error);

/// Read/write handle on the visitor's authenticated session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    session: Session,
}

impl SessionStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Load the current authenticated session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn hydrate(&self) -> Result<Option<AuthSession>, SessionError> {
        Ok(self.session.get::<AuthSession>(keys::AUTH).await?)
    }

    /// Store `auth` as the authenticated session.
    ///
    /// When the user changes (a login), the session id is cycled first so a
    /// pre-login id cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn persist(&self, auth: &AuthSession) -> Result<(), SessionError> {
        let same_user = self
            .hydrate()
            .await?
            .is_some_and(|current| current.user.id == auth.user.id);

        if !same_user {
            self.session.cycle_id().await?;
        }

        self.session.insert(keys::AUTH, auth).await?;
        Ok(())
    }

    /// Log out: drop the authenticated session and pending checkout state,
    /// then cycle the session id. The cart survives.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.session.remove_value(keys::AUTH).await?;
        self.session.remove_value(keys::CHECKOUT_DISCOUNT).await?;
        self.session.remove_value(keys::CHECKOUT_SHIPPING).await?;
        self.session.cycle_id().await?;
        Ok(())
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl<S> FromRequestParts<S> for SessionStore
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(Self::new)
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))
    }
}
