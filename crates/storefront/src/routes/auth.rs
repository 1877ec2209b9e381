//! Authentication route handlers.
//!
//! Login and registration exchange credentials with the API for a bearer
//! token, then hand the token and user to [`SessionStore`], the only writer
//! of the authenticated session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use perfumeria_core::Email;

use crate::api::AuthPayload;
use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::{PageContext, safe_next};
use crate::models::{ApiToken, AuthSession, SessionUser};
use crate::services::SessionStore;
use crate::state::AppState;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// `?next=` on the login page.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub email: String,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Check a registration form, returning the parsed email.
fn validate_registration(form: &RegisterForm) -> std::result::Result<Email, String> {
    if form.name.trim().is_empty() {
        return Err("Please enter your name.".to_string());
    }

    let email = Email::parse(&form.email).map_err(|e| format!("Invalid email: {e}"))?;

    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if form.password != form.password_confirm {
        return Err("Passwords do not match.".to_string());
    }

    Ok(email)
}

/// Store the API's auth payload as the authenticated session.
async fn start_session(store: &SessionStore, payload: AuthPayload) -> Result<SessionUser> {
    let auth = AuthSession {
        token: ApiToken::new(payload.token),
        user: SessionUser::from(payload.user),
    };
    store.persist(&auth).await?;

    set_sentry_user(&auth.user.id, Some(&auth.user.email));
    add_breadcrumb("auth", "Signed in", &[("user_id", auth.user.id.as_str())]);

    Ok(auth.user)
}

// =============================================================================
// Handlers
// =============================================================================

/// Display login page.
pub async fn login_page(page: PageContext, Query(query): Query<NextQuery>) -> Response {
    if page.user.is_some() {
        return Redirect::to(safe_next(query.next.as_deref())).into_response();
    }

    LoginTemplate {
        page,
        error: None,
        email: String::new(),
        next: safe_next(query.next.as_deref()).to_string(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    store: SessionStore,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();

    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                LoginTemplate {
                    page,
                    error: Some(format!("Invalid email: {e}")),
                    email: form.email,
                    next,
                },
            )
                .into_response());
        }
    };

    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().login(email.as_str(), &form.password))
        .await
    {
        FetchOutcome::Data(payload) => {
            let user = start_session(&store, payload).await?;
            tracing::info!(user_id = %user.id, "User logged in");
            Ok(Redirect::to(&next).into_response())
        }
        FetchOutcome::Failed(e) => {
            let status = if e.is_unauthorized() {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::OK
            };
            let error = if e.is_unauthorized() {
                "Invalid email or password.".to_string()
            } else {
                e.user_message()
            };
            Ok((
                status,
                LoginTemplate {
                    page,
                    error: Some(error),
                    email: form.email,
                    next,
                },
            )
                .into_response())
        }
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Display registration page.
pub async fn register_page(page: PageContext) -> Response {
    if page.user.is_some() {
        return Redirect::to("/account").into_response();
    }

    RegisterTemplate {
        page,
        error: None,
        name: String::new(),
        email: String::new(),
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    page: PageContext,
    store: SessionStore,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let rerender = |page: PageContext, form: RegisterForm, error: String| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            RegisterTemplate {
                page,
                error: Some(error),
                name: form.name,
                email: form.email,
            },
        )
            .into_response()
    };

    let email = match validate_registration(&form) {
        Ok(email) => email,
        Err(error) => return Ok(rerender(page, form, error)),
    };

    let fetcher = Fetcher::new();
    match fetcher
        .run(
            state
                .api()
                .register(form.name.trim(), email.as_str(), &form.password),
        )
        .await
    {
        FetchOutcome::Data(payload) => {
            let user = start_session(&store, payload).await?;
            tracing::info!(user_id = %user.id, "User registered");
            Ok(Redirect::to("/account").into_response())
        }
        FetchOutcome::Failed(e) => Ok(rerender(page, form, e.user_message())),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Handle logout. The cart is kept.
#[instrument(skip_all)]
pub async fn logout(store: SessionStore) -> Result<Redirect> {
    store.clear().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        let email = validate_registration(&form(
            "Ana",
            " ana@example.com ",
            "hunter22x",
            "hunter22x",
        ))
        .ok();
        assert_eq!(email.as_ref().map(Email::as_str), Some("ana@example.com"));
    }

    #[test]
    fn test_registration_rejects_short_password() {
        let err = validate_registration(&form("Ana", "ana@example.com", "short", "short"));
        assert_eq!(
            err.err().as_deref(),
            Some("Password must be at least 8 characters.")
        );
    }

    #[test]
    fn test_registration_rejects_mismatched_confirmation() {
        let err = validate_registration(&form("Ana", "ana@example.com", "longenough", "different"));
        assert_eq!(err.err().as_deref(), Some("Passwords do not match."));
    }

    #[test]
    fn test_registration_rejects_bad_email_and_blank_name() {
        assert!(validate_registration(&form("Ana", "no-at", "longenough", "longenough")).is_err());
        assert!(
            validate_registration(&form("  ", "ana@example.com", "longenough", "longenough"))
                .is_err()
        );
    }
}
