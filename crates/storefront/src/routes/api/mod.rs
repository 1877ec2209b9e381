//! JSON endpoints.

pub mod catalog;
pub mod images;
