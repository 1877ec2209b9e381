//! Cart store.
//!
//! Owns the visitor's [`CartState`], applies [`CartIntent`]s through the
//! reducer and publishes each new snapshot on a `watch` channel. The state is
//! loaded from and saved to the visitor's session under [`keys::CART`].
//!
//! Handlers receive the store as an extractor argument; there is no global
//! cart. Route handlers subscribe before dispatching and tell the browser
//! with `HX-Trigger: cart-updated` only when a new state was published.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tokio::sync::watch;
use tower_sessions::Session;
use tracing::debug;

use perfumeria_core::{CartIntent, CartState};

use super::session::SessionError;
use crate::error::AppError;
use crate::models::keys;

/// The visitor's cart.
#[derive(Debug)]
pub struct CartStore {
    state: watch::Sender<CartState>,
    session: Session,
}

impl CartStore {
    /// Load the cart saved in `session` (empty if none).
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn load(session: Session) -> Result<Self, SessionError> {
        let state = session
            .get::<CartState>(keys::CART)
            .await?
            .unwrap_or_default();

        Ok(Self {
            state: watch::Sender::new(state),
            session,
        })
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Receive every state published by [`dispatch`](Self::dispatch).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Apply `intent`, notify subscribers and save the result.
    ///
    /// Subscribers see the new state before it is saved. Intents that leave
    /// the state unchanged are not published.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn dispatch(&self, intent: CartIntent) -> Result<CartState, SessionError> {
        debug!(?intent, "Cart dispatch");
        self.state.send_if_modified(|state| {
            let before = state.clone();
            state.apply(intent);
            *state != before
        });
        self.persist().await?;
        Ok(self.snapshot())
    }

    /// Save the current state to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails.
    pub async fn persist(&self) -> Result<(), SessionError> {
        let snapshot = self.snapshot();
        self.session.insert(keys::CART, &snapshot).await?;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for CartStore
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        Ok(Self::load(session).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use perfumeria_core::{CartProduct, ProductId};
    use rust_decimal::Decimal;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn product(id: &str, price: i64) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Perfume {id}"),
            price: Decimal::new(price, 0),
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_load_empty_session() {
        let store = CartStore::load(session()).await.unwrap();
        assert!(store.snapshot().is_empty());
        assert!(!store.snapshot().is_open);
    }

    #[tokio::test]
    async fn test_dispatch_notifies_subscribers() {
        let store = CartStore::load(session()).await.unwrap();
        let mut rx = store.subscribe();

        store
            .dispatch(CartIntent::Add(product("p1", 50)))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.item_count(), 1);
        assert_eq!(seen.total(), Decimal::new(50, 0));
    }

    #[tokio::test]
    async fn test_unchanged_state_is_not_published() {
        let store = CartStore::load(session()).await.unwrap();
        let rx = store.subscribe();

        store
            .dispatch(CartIntent::Remove(ProductId::new("missing")))
            .await
            .unwrap();

        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_dispatch_persists_across_loads() {
        let session = session();
        let store = CartStore::load(session.clone()).await.unwrap();
        store
            .dispatch(CartIntent::Add(product("p1", 50)))
            .await
            .unwrap();
        store
            .dispatch(CartIntent::Add(product("p1", 50)))
            .await
            .unwrap();
        store.dispatch(CartIntent::ToggleOpen).await.unwrap();

        let reloaded = CartStore::load(session).await.unwrap().snapshot();
        assert_eq!(reloaded.lines.len(), 1);
        assert_eq!(reloaded.item_count(), 2);
        assert_eq!(reloaded.total(), Decimal::new(100, 0));
        assert!(reloaded.is_open);
    }

    #[tokio::test]
    async fn test_zero_quantity_removes_line() {
        let store = CartStore::load(session()).await.unwrap();
        store
            .dispatch(CartIntent::Add(product("p1", 10)))
            .await
            .unwrap();

        let state = store
            .dispatch(CartIntent::SetQuantity(ProductId::new("p1"), 0))
            .await
            .unwrap();

        assert!(state.is_empty());
    }
}
