#![doc = include_str!("../README.md")]

pub mod error;
#[cfg(feature = "imaging")]
pub mod imaging;
#[cfg(feature = "network")]
pub mod network;
pub mod secret_store;
pub mod session;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use error::{Error, RefreshError};
#[cfg(feature = "imaging")]
pub use imaging::{Codec, EncodedImage, EncoderConfig, EncodingPipeline};
#[cfg(feature = "network")]
pub use network::{AccessTokenRefresher, ClientConfig, NetworkService};
pub use secret_store::{FileSecretStore, InMemorySecretStore, SecretStore};
pub use session::{SwapOutcome, TokenProvider};
pub use token::{
    DEFAULT_EXPIRY_BUFFER, UnverifiedClaims, decode_unverified_claims, is_token_expiring_soon,
};
pub use types::{AccessToken, ApiEnvelope, NewCard, RefreshToken, Session, SessionKey};
