//! Upload image encoding under a byte budget.
//!
//! ```rust,ignore
//! use eatpic_client::imaging::EncodingPipeline;
//!
//! let pipeline = EncodingPipeline::default();
//! match pipeline.encode(&photo, 200_000) {
//!     Some(encoded) => upload(encoded),
//!     None => show_error("photo too large"),
//! }
//! ```

mod codec;
#[cfg(feature = "network")]
mod loader;
mod pipeline;

pub use codec::{Codec, flatten, has_transparency};
#[cfg(feature = "network")]
pub use loader::{ImageLoad, ImageLoader};
pub use pipeline::{DEFAULT_SEARCH_ITERATIONS, EncodedImage, EncoderConfig, EncodingPipeline};
