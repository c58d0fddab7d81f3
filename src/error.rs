/// Terminal outcome of a failed token refresh.
///
/// `Clone` because one refresh outcome is delivered to every request that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RefreshError {
    #[error("no session stored")]
    NoSession,
    #[error("session has no refresh token")]
    MissingRefreshToken,
    #[error("refresh rejected: {code} {message}")]
    Rejected { code: String, message: String },
    #[error("refresh endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed refresh response: {0}")]
    Decode(String),
    #[error("refresh request failed: {0}")]
    Transport(String),
    /// The session was cleared or replaced while the refresh was in flight.
    #[error("session changed during refresh")]
    SessionChanged,
    #[error("secret store rejected the renewed session")]
    Storage,
    #[error("refresh task ended without an outcome")]
    Abandoned,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "network")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session could not be refreshed; the user has to sign in again.
    #[error("authentication error: {0}")]
    Auth(#[from] RefreshError),

    /// The request was still rejected after its single retry.
    #[error("request unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("token error: {0}")]
    Token(String),

    #[error("API error: {code} {message}")]
    Api { code: String, message: String },

    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no codec could encode the image within {max_bytes} bytes")]
    ImageTooLarge { max_bytes: usize },

    #[cfg(feature = "imaging")]
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller should route the user back to sign-in.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Unauthorized { .. })
    }
}
