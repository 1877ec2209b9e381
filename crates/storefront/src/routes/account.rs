//! Account route handlers.
//!
//! These routes require authentication. The profile page re-reads the user
//! from the API so the session copy stays current.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use perfumeria_core::{Email, format_money};

use super::{ErrorPageTemplate, session_expired};
use crate::api::{Order, ProfileUpdate};
use crate::error::Result;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::{AuthSession, SessionUser};
use crate::services::SessionStore;
use crate::state::AppState;

/// User display data for templates.
#[derive(Clone)]
pub struct UserView {
    pub name: String,
    pub first_name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&SessionUser> for UserView {
    fn from(user: &SessionUser) -> Self {
        Self {
            name: user.name.clone(),
            first_name: user.first_name().to_string(),
            email: user.email.clone(),
            is_admin: user.is_admin(),
        }
    }
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub status: String,
    pub total: String,
    pub item_count: u32,
    pub placed_on: Option<String>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status.clone(),
            total: format_money(order.total),
            item_count: order
                .items
                .iter()
                .fold(0u32, |acc, item| acc.saturating_add(item.quantity)),
            placed_on: order
                .created_at
                .map(|at| at.format("%b %-d, %Y").to_string()),
        }
    }
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: PageContext,
    pub user: UserView,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderView>,
    pub error: Option<String>,
}

/// Replace the session's user, keeping the token.
async fn refresh_user(
    store: &SessionStore,
    auth: &AuthSession,
    user: SessionUser,
) -> Result<SessionUser> {
    if user != auth.user {
        store
            .persist(&AuthSession {
                token: auth.token.clone(),
                user: user.clone(),
            })
            .await?;
    }
    Ok(user)
}

/// Display account overview page.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn index(
    State(state): State<AppState>,
    mut page: PageContext,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
) -> Result<Response> {
    let fetcher = Fetcher::new();

    let (user, error) = match fetcher.run(state.api().current_user(&auth.token)).await {
        FetchOutcome::Data(user) => {
            let user = refresh_user(&store, &auth, SessionUser::from(user)).await?;
            (user, None)
        }
        FetchOutcome::Failed(e) if e.is_unauthorized() => {
            return session_expired(&store, "/account").await;
        }
        // Show the session copy when the API is unavailable.
        FetchOutcome::Failed(e) => (auth.user.clone(), Some(e.user_message())),
        FetchOutcome::Cancelled => (auth.user.clone(), None),
    };

    page.user = Some(user.clone());

    Ok(AccountIndexTemplate {
        page,
        user: UserView::from(&user),
        error,
        success: None,
    }
    .into_response())
}

/// Update name and email.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    mut page: PageContext,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let render = |page: PageContext, user: &SessionUser, error, success| {
        AccountIndexTemplate {
            page,
            user: UserView::from(user),
            error,
            success,
        }
    };

    let name = form.name.trim();
    if name.is_empty() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            render(page, &auth.user, Some("Please enter your name.".to_string()), None),
        )
            .into_response());
    }
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                render(page, &auth.user, Some(format!("Invalid email: {e}")), None),
            )
                .into_response());
        }
    };

    let update = ProfileUpdate {
        name: Some(name.to_string()),
        email: Some(email.into_inner()),
    };

    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().update_profile(&auth.token, &update))
        .await
    {
        FetchOutcome::Data(user) => {
            let user = refresh_user(&store, &auth, SessionUser::from(user)).await?;
            tracing::info!("Profile updated");
            page.user = Some(user.clone());
            Ok(render(page, &user, None, Some("Profile updated.".to_string())).into_response())
        }
        FetchOutcome::Failed(e) if e.is_unauthorized() => session_expired(&store, "/account").await,
        FetchOutcome::Failed(e) => Ok((
            e.status()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            render(page, &auth.user, Some(e.user_message()), None),
        )
            .into_response()),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Display order history.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn orders(
    State(state): State<AppState>,
    page: PageContext,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
) -> Result<Response> {
    let fetcher = Fetcher::new();

    match fetcher.run(state.api().orders(&auth.token)).await {
        FetchOutcome::Data(mut orders) => {
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(OrdersTemplate {
                page,
                orders: orders.iter().map(OrderView::from).collect(),
                error: None,
            }
            .into_response())
        }
        FetchOutcome::Failed(e) if e.is_unauthorized() => {
            session_expired(&store, "/account/orders").await
        }
        FetchOutcome::Failed(e) => Ok(ErrorPageTemplate::respond(
            page,
            StatusCode::BAD_GATEWAY,
            e.user_message(),
        )),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
