use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use url::Url;

use crate::error::RefreshError;
use crate::session::{SwapOutcome, TokenProvider};
use crate::types::{ApiEnvelope, Session, TokenPair};

/// Outcome shared by every caller waiting on one refresh.
pub type RefreshOutcome = Result<(), RefreshError>;

type Waiters = Vec<oneshot::Sender<RefreshOutcome>>;

/// Exchanges the stored refresh token for a new token pair, single-flight.
///
/// Concurrent callers of [`refresh`](Self::refresh) while a refresh is in
/// flight do not start a second one; they are queued and all receive the
/// outcome of the running exchange. The exchange runs on its own task, so
/// dropping the caller that started it does not abort it.
#[derive(Clone)]
pub struct AccessTokenRefresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    http: reqwest::Client,
    refresh_url: Url,
    refresh_header: String,
    tokens: TokenProvider,
    /// `Some` while a refresh is in flight.
    pending: Mutex<Option<Waiters>>,
}

impl AccessTokenRefresher {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        refresh_url: Url,
        refresh_header: impl Into<String>,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                http,
                refresh_url,
                refresh_header: refresh_header.into(),
                tokens,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Whether a refresh is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// Refreshes the session, or joins the refresh already in flight.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the shared [`RefreshError`] when the exchange fails. Every
    /// failure is terminal for the current session.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();

        let leader = {
            let mut pending = self.inner.pending.lock();
            match pending.as_mut() {
                Some(waiters) => {
                    waiters.push(tx);
                    false
                }
                None => {
                    *pending = Some(vec![tx]);
                    true
                }
            }
        };

        if leader {
            tracing::debug!("Starting token refresh");
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run().await });
        } else {
            tracing::debug!("Joining in-flight token refresh");
        }

        rx.await.unwrap_or(Err(RefreshError::Abandoned))
    }
}

impl RefresherInner {
    async fn run(&self) {
        let mut completion = Completion {
            pending: &self.pending,
            outcome: None,
        };
        completion.outcome = Some(self.exchange().await);
    }

    async fn exchange(&self) -> RefreshOutcome {
        let session = self.tokens.session().ok_or(RefreshError::NoSession)?;
        let refresh_token = session
            .refresh_token
            .ok_or(RefreshError::MissingRefreshToken)?;

        let response = self
            .http
            .get(self.refresh_url.clone())
            .header(self.refresh_header.as_str(), refresh_token.as_str())
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        let envelope: ApiEnvelope<TokenPair> = response
            .json()
            .await
            .map_err(|e| RefreshError::Decode(e.to_string()))?;

        if !envelope.is_success {
            return Err(RefreshError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let pair = envelope
            .result
            .ok_or_else(|| RefreshError::Decode("missing result".into()))?;
        let renewed = Session::new(pair.access_token, pair.refresh_token);

        match self.tokens.replace_if_current(&refresh_token, &renewed) {
            SwapOutcome::Updated => Ok(()),
            SwapOutcome::Mismatch => {
                // A newer sign-in replaced the session; retrying uses it.
                tracing::debug!("Session replaced during refresh; keeping the newer session");
                Ok(())
            }
            SwapOutcome::Missing => Err(RefreshError::SessionChanged),
            SwapOutcome::WriteFailed => Err(RefreshError::Storage),
        }
    }
}

/// Resolves every waiter and clears the in-flight flag when dropped.
///
/// Runs on normal completion and when the refresh task unwinds or is
/// dropped by a shutting-down runtime; waiters then get
/// [`RefreshError::Abandoned`].
struct Completion<'a> {
    pending: &'a Mutex<Option<Waiters>>,
    outcome: Option<RefreshOutcome>,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let waiters = self.pending.lock().take().unwrap_or_default();
        let outcome = self.outcome.take().unwrap_or(Err(RefreshError::Abandoned));
        match &outcome {
            Ok(()) => tracing::info!(waiters = waiters.len(), "Token refresh succeeded"),
            Err(e) => tracing::warn!(error = %e, waiters = waiters.len(), "Token refresh failed"),
        }

        for waiter in waiters {
            // A waiter that went away no longer needs the outcome.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl std::fmt::Debug for AccessTokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenRefresher")
            .field("refresh_url", &self.inner.refresh_url.as_str())
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}
