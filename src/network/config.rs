use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::error::Error;
use crate::token::DEFAULT_EXPIRY_BUFFER;
use crate::types::SessionKey;

/// EatPic API client configuration.
///
/// The base URL is the only required field. Everything else has a default
/// that matches the production API.
///
/// ```rust,ignore
/// use eatpic_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.eatpic.app".parse()?)
///     .with_refresh_path("/api/auth/reissue");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) refresh_path: String,
    pub(crate) refresh_header: String,
    pub(crate) retry_statuses: Vec<StatusCode>,
    pub(crate) expiry_buffer: Duration,
    pub(crate) session_key: SessionKey,
}

impl ClientConfig {
    /// Create a configuration for the API at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            refresh_path: "/api/auth/reissue".into(),
            refresh_header: "Refresh-Token".into(),
            retry_statuses: vec![StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN],
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
            session_key: SessionKey::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `EATPIC_API_BASE_URL`: API root (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `EATPIC_REFRESH_PATH`: Token reissue endpoint path
    /// - `EATPIC_REFRESH_HEADER`: Header carrying the refresh token
    /// - `EATPIC_RETRY_ON_NOT_FOUND`: `"1"` or `"true"` also treats 404 as an auth failure
    /// - `EATPIC_TOKEN_EXPIRY_BUFFER_SECS`: Proactive refresh window in seconds
    /// - `EATPIC_SESSION_KEY`: Secret store key for the session blob
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or a value does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let base_url_str = std::env::var("EATPIC_API_BASE_URL")
            .map_err(|_| Error::Config("EATPIC_API_BASE_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("EATPIC_API_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(path) = std::env::var("EATPIC_REFRESH_PATH") {
            config = config.with_refresh_path(path);
        }
        if let Ok(header) = std::env::var("EATPIC_REFRESH_HEADER") {
            config = config.with_refresh_header(header);
        }
        if matches!(
            std::env::var("EATPIC_RETRY_ON_NOT_FOUND").as_deref(),
            Ok("1") | Ok("true"),
        ) {
            config = config.with_retry_on_not_found(true);
        }
        if let Ok(secs) = std::env::var("EATPIC_TOKEN_EXPIRY_BUFFER_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("EATPIC_TOKEN_EXPIRY_BUFFER_SECS: {e}")))?;
            config = config.with_expiry_buffer(Duration::from_secs(secs));
        }
        if let Ok(key) = std::env::var("EATPIC_SESSION_KEY") {
            config = config.with_session_key(SessionKey(key));
        }

        Ok(config)
    }

    /// Override the token reissue endpoint path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the header that carries the refresh token.
    #[must_use]
    pub fn with_refresh_header(mut self, header: impl Into<String>) -> Self {
        self.refresh_header = header.into();
        self
    }

    /// Replace the set of statuses that trigger refresh-and-retry.
    #[must_use]
    pub fn with_retry_statuses(mut self, statuses: Vec<StatusCode>) -> Self {
        self.retry_statuses = statuses;
        self
    }

    /// Also treat `404 Not Found` as an authorization failure.
    ///
    /// Some API deployments answer expired tokens with 404. Off by default
    /// because a 404 normally means the resource is gone.
    #[must_use]
    pub fn with_retry_on_not_found(mut self, enabled: bool) -> Self {
        self.retry_statuses.retain(|s| *s != StatusCode::NOT_FOUND);
        if enabled {
            self.retry_statuses.push(StatusCode::NOT_FOUND);
        }
        self
    }

    /// Override the remaining lifetime below which a token counts as expiring.
    #[must_use]
    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// Override the secret store key of the session blob.
    #[must_use]
    pub fn with_session_key(mut self, key: SessionKey) -> Self {
        self.session_key = key;
        self
    }

    /// API root every endpoint path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Header carrying the refresh token.
    #[must_use]
    pub fn refresh_header(&self) -> &str {
        &self.refresh_header
    }

    /// Statuses treated as authorization failures.
    #[must_use]
    pub fn retry_statuses(&self) -> &[StatusCode] {
        &self.retry_statuses
    }

    /// Proactive refresh window.
    #[must_use]
    pub fn expiry_buffer(&self) -> Duration {
        self.expiry_buffer
    }

    /// Secret store key of the session blob.
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Absolute URL of the token reissue endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path cannot be joined onto the base URL.
    pub fn refresh_url(&self) -> Result<Url, Error> {
        self.endpoint(&self.refresh_path)
    }

    /// Resolves an API path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path cannot be joined onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint path {path:?}: {e}")))
    }
}
