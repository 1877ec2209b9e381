//! Fetch lifecycle helper.
//!
//! A [`Fetcher`] wraps calls to the remote API for one view (in practice, one
//! request handler). It tracks a loading flag, lets the view cancel the call
//! it is waiting on, and turns every failure into a [`FetchError`] the view
//! can render. Cancellation is not a failure: it yields
//! [`FetchOutcome::Cancelled`] and is only logged at debug level.
//!
//! Dropping the `Fetcher` cancels the tracked call. Axum drops the handler
//! future when the client disconnects, so an abandoned page never receives
//! the late result.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// Normalized failure of an API call.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The API responded with a non-success status.
    #[error("server responded with {status}")]
    Server {
        status: StatusCode,
        error: Option<String>,
        message: Option<String>,
        body: serde_json::Value,
    },

    /// The request was sent but no response arrived.
    #[error("network error: {message}")]
    Network { message: String },

    /// The request could not be built, or the response could not be understood.
    #[error("request failed: {message}")]
    Unknown { message: String },
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status {
                status,
                error,
                message,
                body,
            } => Self::Server {
                status,
                error,
                message,
                body,
            },
            ApiError::Transport(e) if e.is_builder() || e.is_decode() => Self::Unknown {
                message: e.to_string(),
            },
            ApiError::Transport(e) => Self::Network {
                message: e.to_string(),
            },
            ApiError::Decode(e) => Self::Unknown {
                message: e.to_string(),
            },
            ApiError::InvalidUrl(url) => Self::Unknown {
                message: format!("invalid API URL: {url}"),
            },
        }
    }
}

impl FetchError {
    /// HTTP status, for `Server` errors.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the API rejected the caller's credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Text safe to show the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Server {
                status, message, ..
            } => match *status {
                StatusCode::UNAUTHORIZED => "Invalid credentials".to_string(),
                StatusCode::FORBIDDEN => "You do not have access to this resource".to_string(),
                StatusCode::NOT_FOUND => "Not found".to_string(),
                StatusCode::CONFLICT => message
                    .clone()
                    .unwrap_or_else(|| "This conflicts with existing data".to_string()),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => message
                    .clone()
                    .unwrap_or_else(|| "Please check the form and try again".to_string()),
                StatusCode::TOO_MANY_REQUESTS => {
                    "Too many requests, please wait a moment".to_string()
                }
                s if s.is_server_error() => "Server error, please try again later".to_string(),
                _ => message
                    .clone()
                    .unwrap_or_else(|| "Something went wrong, please try again".to_string()),
            },
            Self::Network { .. } => {
                "Could not reach the server, check your connection and try again".to_string()
            }
            Self::Unknown { .. } => "Something went wrong, please try again".to_string(),
        }
    }
}

/// Result of [`Fetcher::run`].
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The call succeeded; the payload is passed through unchanged.
    Data(T),
    /// The call was cancelled before it settled. Not an error.
    Cancelled,
    /// The call failed.
    Failed(FetchError),
}

impl<T> FetchOutcome<T> {
    /// `Ok(Some(data))`, `Ok(None)` when cancelled, `Err` on failure.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of a failed call.
    pub fn into_result(self) -> Result<Option<T>, FetchError> {
        match self {
            Self::Data(data) => Ok(Some(data)),
            Self::Cancelled => Ok(None),
            Self::Failed(err) => Err(err),
        }
    }

    /// The payload, if the call succeeded.
    pub fn data(self) -> Option<T> {
        match self {
            Self::Data(data) => Some(data),
            Self::Cancelled | Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Loading/cancellation tracker for the API calls of one view.
pub struct Fetcher {
    loading: watch::Sender<bool>,
    current: Mutex<Option<CancellationToken>>,
}

impl Fetcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loading: watch::Sender::new(false),
            current: Mutex::new(None),
        }
    }

    /// Run `call`, tracking it as the current call.
    ///
    /// A previously tracked call is not cancelled; it simply stops being the
    /// one [`cancel`](Self::cancel) targets. Whichever call settles clears the
    /// loading flag.
    pub async fn run<T, F>(&self, call: F) -> FetchOutcome<T>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let token = CancellationToken::new();
        *self.lock_current() = Some(token.clone());
        self.loading.send_replace(true);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => FetchOutcome::Cancelled,
            result = call => match result {
                Ok(data) => FetchOutcome::Data(data),
                Err(err) => FetchOutcome::Failed(FetchError::from(err)),
            },
        };

        self.loading.send_replace(false);

        match &outcome {
            FetchOutcome::Data(_) => {}
            FetchOutcome::Cancelled => tracing::debug!("API call cancelled"),
            FetchOutcome::Failed(err @ FetchError::Server { status, .. })
                if !status.is_server_error() =>
            {
                tracing::debug!(error = %err, "API call rejected");
            }
            FetchOutcome::Failed(err) => tracing::warn!(error = %err, "API call failed"),
        }

        outcome
    }

    /// Cancel the tracked call, if any, and clear the loading flag.
    pub fn cancel(&self) {
        if let Some(token) = self.lock_current().take() {
            token.cancel();
        }
        self.loading.send_replace(false);
    }

    /// Whether a call is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Subscribe to loading-flag changes.
    ///
    /// Observers on other tasks use this to report calls that take long.
    #[must_use]
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn status_error(status: u16, message: Option<&str>) -> FetchError {
        FetchError::from(ApiError::Status {
            status: StatusCode::from_u16(status).unwrap(),
            error: None,
            message: message.map(str::to_owned),
            body: json!({}),
        })
    }

    #[tokio::test]
    async fn test_success_passes_payload_through() {
        let fetcher = Fetcher::new();
        let outcome = fetcher.run(async { Ok::<_, ApiError>(vec![1, 2, 3]) }).await;

        assert!(matches!(outcome, FetchOutcome::Data(ref v) if v == &[1, 2, 3]));
        assert!(!fetcher.is_loading());
    }

    #[tokio::test]
    async fn test_unauthorized_becomes_server_error() {
        let fetcher = Fetcher::new();
        let outcome = fetcher
            .run(async {
                Err::<(), _>(ApiError::Status {
                    status: StatusCode::UNAUTHORIZED,
                    error: Some("unauthorized".to_string()),
                    message: None,
                    body: json!({ "error": "unauthorized" }),
                })
            })
            .await;

        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.user_message(), "Invalid credentials");
        assert!(!fetcher.is_loading());
    }

    #[tokio::test]
    async fn test_loading_flag_is_set_while_in_flight() {
        let fetcher = Arc::new(Fetcher::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn({
            let fetcher = Arc::clone(&fetcher);
            async move {
                fetcher
                    .run(async move {
                        rx.await.ok();
                        Ok::<_, ApiError>("done")
                    })
                    .await
                    .data()
            }
        });

        let mut loading = fetcher.loading();
        loading.wait_for(|l| *l).await.unwrap();
        assert!(fetcher.is_loading());

        tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), Some("done"));
        assert!(!fetcher.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_before_settle_yields_cancelled() {
        let fetcher = Arc::new(Fetcher::new());

        let task = tokio::spawn({
            let fetcher = Arc::clone(&fetcher);
            async move {
                fetcher
                    .run(async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok::<_, ApiError>(())
                    })
                    .await
            }
        });

        fetcher.loading().wait_for(|l| *l).await.unwrap();
        fetcher.cancel();

        let outcome = task.await.unwrap();
        assert!(outcome.is_cancelled());
        assert!(matches!(outcome.into_result(), Ok(None)));
        assert!(!fetcher.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_without_call_is_harmless() {
        let fetcher = Fetcher::new();
        fetcher.cancel();
        assert!(!fetcher.is_loading());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            status_error(403, None).user_message(),
            "You do not have access to this resource"
        );
        assert_eq!(status_error(404, None).user_message(), "Not found");
        assert_eq!(
            status_error(422, Some("Postal code is invalid")).user_message(),
            "Postal code is invalid"
        );
        assert_eq!(
            status_error(429, None).user_message(),
            "Too many requests, please wait a moment"
        );
        assert_eq!(
            status_error(503, Some("db down")).user_message(),
            "Server error, please try again later"
        );
        assert_eq!(
            FetchError::Network {
                message: "timeout".to_string()
            }
            .user_message(),
            "Could not reach the server, check your connection and try again"
        );
    }

    #[test]
    fn test_decode_failure_is_unknown() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = FetchError::from(ApiError::Decode(decode));
        assert!(matches!(err, FetchError::Unknown { .. }));
        assert!(err.status().is_none());
    }
}
