use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::ClientConfig;
use super::refresh::AccessTokenRefresher;
use crate::error::{Error, RefreshError};
use crate::secret_store::SecretStore;
use crate::session::TokenProvider;
use crate::token::is_token_expiring_soon;
use crate::types::{AccessToken, ApiEnvelope, Session};

/// Retries allowed per request after an authorization failure.
pub const MAX_AUTH_RETRIES: u32 = 1;

/// Authenticated EatPic API client.
///
/// Every request carries the stored access token. When the server answers
/// with one of the configured authorization-failure statuses, the client
/// refreshes the session (joining any refresh already in flight) and
/// replays the request once. A failure for a token that was renewed while
/// the request was in flight is replayed without another refresh.
#[derive(Clone)]
pub struct NetworkService {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    tokens: TokenProvider,
    refresher: AccessTokenRefresher,
}

impl NetworkService {
    /// Create a client storing its session in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the refresh endpoint URL is invalid.
    pub fn new(config: ClientConfig, store: Arc<dyn SecretStore>) -> Result<Self, Error> {
        Self::with_http_client(config, store, reqwest::Client::new())
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the refresh endpoint URL is invalid.
    pub fn with_http_client(
        config: ClientConfig,
        store: Arc<dyn SecretStore>,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let tokens = TokenProvider::with_key(store, config.session_key().clone());
        let refresher = AccessTokenRefresher::new(
            http.clone(),
            config.refresh_url()?,
            config.refresh_header(),
            tokens.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            http,
            tokens,
            refresher,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    #[must_use]
    pub fn refresher(&self) -> &AccessTokenRefresher {
        &self.refresher
    }

    /// Store the token pair obtained from sign-in.
    pub fn sign_in(&self, session: &Session) -> bool {
        self.tokens.set_session(session)
    }

    /// Forget the stored session.
    pub fn sign_out(&self) {
        self.tokens.clear();
    }

    /// Sets `Authorization: Bearer` from the stored access token.
    ///
    /// Without a stored token the request is left unauthenticated.
    #[must_use]
    pub fn attach_token(&self, request: RequestBuilder) -> RequestBuilder {
        with_bearer(request, self.tokens.access_token().as_ref())
    }

    /// Whether a response with `status` on attempt number `attempt`
    /// (starting at 0) should trigger refresh-and-retry.
    #[must_use]
    pub fn should_retry(&self, status: StatusCode, attempt: u32) -> bool {
        attempt < MAX_AUTH_RETRIES && self.is_auth_failure(status)
    }

    fn is_auth_failure(&self, status: StatusCode) -> bool {
        self.config.retry_statuses().contains(&status)
    }

    /// Refreshes ahead of time if the access token is missing or close to expiry.
    ///
    /// Useful before a batch of calls. The reactive retry in
    /// [`execute`](Self::execute) stays the authoritative mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if no session is stored or the refresh fails.
    pub async fn ensure_fresh_token(&self) -> Result<(), Error> {
        let session = self.tokens.session().ok_or(RefreshError::NoSession)?;
        if let Some(token) = &session.access_token {
            if !is_token_expiring_soon(token.as_str(), self.config.expiry_buffer()) {
                return Ok(());
            }
        }
        tracing::debug!("Access token missing or expiring; refreshing proactively");
        self.refresher.refresh().await?;
        Ok(())
    }

    /// Sends an authenticated request built by `build`.
    ///
    /// `build` is called once per attempt, so it must be repeatable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Auth`] if the
    /// session could not be refreshed, or [`Error::Unauthorized`] if the
    /// retried request was rejected again.
    pub async fn execute<F>(&self, build: F) -> Result<Response, Error>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        self.execute_with(|http| Ok(build(http))).await
    }

    pub(crate) async fn execute_with<F>(&self, build: F) -> Result<Response, Error>
    where
        F: Fn(&reqwest::Client) -> Result<RequestBuilder, Error>,
    {
        let mut attempt = 0;
        loop {
            let sent_token = self.tokens.access_token();
            let request = with_bearer(build(&self.http)?, sent_token.as_ref());
            let response = request.send().await?;
            let status = response.status();

            if self.should_retry(status, attempt) {
                if self.tokens.access_token() == sent_token {
                    tracing::debug!(
                        status = status.as_u16(),
                        attempt,
                        "Authorization failed; refreshing before retry"
                    );
                    self.refresher.refresh().await?;
                } else {
                    // Renewed while this request was in flight.
                    tracing::debug!(status = status.as_u16(), "Retrying with already renewed token");
                }
                attempt += 1;
                continue;
            }

            if self.is_auth_failure(status) {
                tracing::warn!(status = status.as_u16(), "Request rejected after retry");
                return Err(Error::Unauthorized {
                    status: status.as_u16(),
                });
            }

            return Ok(response);
        }
    }

    /// `GET {base}{path}` and unwrap the envelope's result.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); additionally [`Error::Status`] for
    /// other non-2xx responses and [`Error::Api`] for non-success envelopes.
    pub async fn get_json<T>(&self, path: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        let response = self.execute(|http| http.get(url.clone())).await?;
        decode_envelope(response).await
    }

    /// `POST {base}{path}` with a JSON body and unwrap the envelope's result.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json).
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        let response = self
            .execute(|http| http.post(url.clone()).json(body))
            .await?;
        decode_envelope(response).await
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&AccessToken>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.as_str()),
        None => request,
    }
}

/// Checks HTTP status, then decodes and unwraps the API envelope.
pub(crate) async fn decode_envelope<T>(response: Response) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes)?;
    envelope.into_result()
}

impl std::fmt::Debug for NetworkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkService")
            .field("base_url", &self.config.base_url().as_str())
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}
