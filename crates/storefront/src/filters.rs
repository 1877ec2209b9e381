//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the stylesheet path, fingerprinted when the build produced a hash.
///
/// Usage in templates: `{{ ""|stylesheet }}`
#[askama::filter_fn]
pub fn stylesheet(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(stylesheet_path(env!("CSS_HASH")))
}

fn stylesheet_path(hash: &str) -> String {
    if hash.is_empty() {
        "/static/css/main.css".to_string()
    } else {
        format!("/static/css/derived/main.{hash}.css")
    }
}
