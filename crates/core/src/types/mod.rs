//! Core types for Perfumeria.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod role;

pub use cart::{CartIntent, CartLine, CartProduct, CartState};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, format_money};
pub use role::Role;
