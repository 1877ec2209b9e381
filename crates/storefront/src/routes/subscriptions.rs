//! Subscription route handlers.
//!
//! The list is a full page; create, update and cancel are HTMX requests that
//! answer with an alert or the updated row.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use perfumeria_core::{ProductId, SubscriptionId};

use super::products::SelectOption;
use super::{AlertTemplate, ErrorPageTemplate, flash_error, session_expired};
use crate::api::{
    NewSubscription, Subscription, SubscriptionFrequency, SubscriptionStatus, SubscriptionUpdate,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::SessionStore;
use crate::state::AppState;

const SUBSCRIPTIONS_PATH: &str = "/account/subscriptions";

/// Subscription display data for templates.
#[derive(Clone)]
pub struct SubscriptionView {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub frequency: String,
    pub frequencies: Vec<SelectOption>,
    pub status: &'static str,
    pub is_active: bool,
    pub is_paused: bool,
    pub next_delivery: Option<String>,
}

impl From<&Subscription> for SubscriptionView {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            product_id: sub.product_id.to_string(),
            product_name: sub
                .product_name
                .clone()
                .unwrap_or_else(|| sub.product_id.to_string()),
            frequency: sub.frequency.label().to_string(),
            frequencies: SubscriptionFrequency::ALL
                .iter()
                .map(|f| SelectOption {
                    value: f.as_str().to_string(),
                    label: f.label().to_string(),
                    selected: *f == sub.frequency,
                })
                .collect(),
            status: match sub.status {
                SubscriptionStatus::Active => "Active",
                SubscriptionStatus::Paused => "Paused",
                SubscriptionStatus::Cancelled => "Cancelled",
            },
            is_active: sub.status == SubscriptionStatus::Active,
            is_paused: sub.status == SubscriptionStatus::Paused,
            next_delivery: sub
                .next_delivery
                .map(|date| date.format("%b %-d, %Y").to_string()),
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// New subscription form data.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionForm {
    pub product_id: ProductId,
    pub frequency: SubscriptionFrequency,
}

/// Lifecycle action on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Pause,
    Resume,
}

/// Update form data; either field may be absent.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubscriptionForm {
    #[serde(default)]
    pub frequency: Option<SubscriptionFrequency>,
    #[serde(default)]
    pub action: Option<SubscriptionAction>,
}

impl UpdateSubscriptionForm {
    /// The API update this form asks for, or `None` if it asks for nothing.
    fn to_update(&self) -> Option<SubscriptionUpdate> {
        let update = SubscriptionUpdate {
            frequency: self.frequency,
            status: self.action.map(|action| match action {
                SubscriptionAction::Pause => SubscriptionStatus::Paused,
                SubscriptionAction::Resume => SubscriptionStatus::Active,
            }),
        };
        (update.frequency.is_some() || update.status.is_some()).then_some(update)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Subscriptions page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/subscriptions.html")]
pub struct SubscriptionsTemplate {
    pub page: PageContext,
    pub subscriptions: Vec<SubscriptionView>,
}

/// Single subscription row fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/subscription_row.html")]
pub struct SubscriptionRowTemplate {
    pub sub: SubscriptionView,
}

/// Map a failed mutation to a response: expired token logs out, everything
/// else becomes a flash message.
async fn mutation_failed(store: &SessionStore, error: &FetchError) -> Result<Response> {
    if error.is_unauthorized() {
        return session_expired(store, SUBSCRIPTIONS_PATH).await;
    }
    Ok(flash_error(error.user_message()))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the user's subscriptions.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
) -> Result<Response> {
    let fetcher = Fetcher::new();

    match fetcher.run(state.api().subscriptions(&auth.token)).await {
        FetchOutcome::Data(subscriptions) => Ok(SubscriptionsTemplate {
            page,
            subscriptions: subscriptions
                .iter()
                .filter(|s| s.status != SubscriptionStatus::Cancelled)
                .map(SubscriptionView::from)
                .collect(),
        }
        .into_response()),
        FetchOutcome::Failed(e) if e.is_unauthorized() => {
            session_expired(&store, SUBSCRIPTIONS_PATH).await
        }
        FetchOutcome::Failed(e) => Ok(ErrorPageTemplate::respond(
            page,
            StatusCode::BAD_GATEWAY,
            e.user_message(),
        )),
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Subscribe to a product (HTMX, from the product page).
#[instrument(skip(state, store, auth), fields(user_id = %auth.user.id))]
pub async fn create(
    State(state): State<AppState>,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
    Form(form): Form<CreateSubscriptionForm>,
) -> Result<Response> {
    let request = NewSubscription {
        product_id: form.product_id,
        frequency: form.frequency,
    };

    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().create_subscription(&auth.token, &request))
        .await
    {
        FetchOutcome::Data(sub) => {
            tracing::info!(subscription_id = %sub.id, "Subscription created");
            add_breadcrumb(
                "subscriptions",
                "Created subscription",
                &[("subscription_id", sub.id.as_str())],
            );
            Ok(AlertTemplate::success(format!(
                "Subscribed: {}. Manage deliveries from your account.",
                sub.frequency.label().to_lowercase()
            ))
            .into_response())
        }
        FetchOutcome::Failed(e) => mutation_failed(&store, &e).await,
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Change frequency, pause or resume (HTMX). Answers with the updated row.
#[instrument(skip(state, store, auth), fields(user_id = %auth.user.id))]
pub async fn update(
    State(state): State<AppState>,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<SubscriptionId>,
    Form(form): Form<UpdateSubscriptionForm>,
) -> Result<Response> {
    let update = form
        .to_update()
        .ok_or_else(|| AppError::BadRequest("nothing to update".to_string()))?;

    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().update_subscription(&auth.token, &id, &update))
        .await
    {
        FetchOutcome::Data(sub) => {
            add_breadcrumb(
                "subscriptions",
                "Updated subscription",
                &[("subscription_id", id.as_str())],
            );
            Ok(SubscriptionRowTemplate {
                sub: SubscriptionView::from(&sub),
            }
            .into_response())
        }
        FetchOutcome::Failed(e) => mutation_failed(&store, &e).await,
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Cancel a subscription (HTMX). The empty body removes the row.
#[instrument(skip(state, store, auth), fields(user_id = %auth.user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    store: SessionStore,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<SubscriptionId>,
) -> Result<Response> {
    let fetcher = Fetcher::new();
    match fetcher
        .run(state.api().cancel_subscription(&auth.token, &id))
        .await
    {
        FetchOutcome::Data(()) => {
            tracing::info!(subscription_id = %id, "Subscription cancelled");
            add_breadcrumb(
                "subscriptions",
                "Cancelled subscription",
                &[("subscription_id", id.as_str())],
            );
            Ok(StatusCode::OK.into_response())
        }
        FetchOutcome::Failed(e) => mutation_failed(&store, &e).await,
        FetchOutcome::Cancelled => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_update_form_maps_actions() {
        let pause = UpdateSubscriptionForm {
            action: Some(SubscriptionAction::Pause),
            ..Default::default()
        };
        let update = pause.to_update();
        assert_eq!(
            update.and_then(|u| u.status),
            Some(SubscriptionStatus::Paused)
        );

        let frequency = UpdateSubscriptionForm {
            frequency: Some(SubscriptionFrequency::Quarterly),
            ..Default::default()
        };
        let update = frequency.to_update();
        assert_eq!(
            update.as_ref().and_then(|u| u.frequency),
            Some(SubscriptionFrequency::Quarterly)
        );
        assert!(update.and_then(|u| u.status).is_none());

        assert!(UpdateSubscriptionForm::default().to_update().is_none());
    }

    #[test]
    fn test_subscription_view() {
        let view = SubscriptionView::from(&Subscription {
            id: SubscriptionId::new("s1"),
            product_id: ProductId::new("p1"),
            product_name: None,
            frequency: SubscriptionFrequency::Bimonthly,
            status: SubscriptionStatus::Paused,
            next_delivery: NaiveDate::from_ymd_opt(2025, 11, 2),
        });

        assert_eq!(view.product_name, "p1");
        assert_eq!(view.frequency, "Every two months");
        assert!(view.is_paused);
        assert!(!view.is_active);
        assert_eq!(view.next_delivery.as_deref(), Some("Nov 2, 2025"));
        assert!(view.frequencies[1].selected);
        assert!(!view.frequencies[0].selected);
    }
}
