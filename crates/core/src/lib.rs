//! Perfumeria Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront binary and the CLI:
//! - type-safe ids for remote API entities
//! - validated email addresses and user roles
//! - price formatting
//! - the cart reducer (`CartState` + `CartIntent`)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no sessions. The cart reducer lives here so its invariants can be
//! tested without a running server.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
