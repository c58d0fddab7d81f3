//! Authenticated access to the EatPic REST API.
//!
//! [`NetworkService`] attaches the stored bearer token to every request and
//! recovers from expired tokens through a single-flight
//! [`AccessTokenRefresher`]:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eatpic_client::{ClientConfig, InMemorySecretStore, NetworkService, Session};
//!
//! let service = NetworkService::new(ClientConfig::from_env()?, Arc::new(InMemorySecretStore::new()))?;
//! service.sign_in(&Session::new(access, refresh));
//!
//! let feed: serde_json::Value = service.get_json("/api/feed").await?;
//! ```

mod config;
mod refresh;
mod service;
#[cfg(feature = "imaging")]
mod upload;

pub use config::ClientConfig;
pub use refresh::{AccessTokenRefresher, RefreshOutcome};
pub use service::{MAX_AUTH_RETRIES, NetworkService};
#[cfg(feature = "imaging")]
pub use upload::{IMAGE_PART, REQUEST_PART};
