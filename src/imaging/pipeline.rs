use image::DynamicImage;
use ulid::Ulid;

use super::codec::{Codec, search_quality};
use crate::error::Error;

/// Default number of quality probes per lossy codec.
pub const DEFAULT_SEARCH_ITERATIONS: u32 = 6;

/// Upload-ready image bytes produced by exactly one codec.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_extension: &'static str,
    pub suggested_file_name: String,
    pub codec: Codec,
    /// Quality the search settled on; `None` for lossless output.
    pub quality: Option<f32>,
}

impl EncodedImage {
    fn new(codec: Codec, bytes: Vec<u8>, quality: Option<f32>) -> Self {
        Self {
            bytes,
            mime_type: codec.mime_type(),
            file_extension: codec.file_extension(),
            suggested_file_name: format!(
                "{}.{}",
                Ulid::new().to_string().to_lowercase(),
                codec.file_extension()
            ),
            codec,
            quality,
        }
    }
}

/// Codec order and search parameters.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EncoderConfig {
    pub(crate) codecs: Vec<Codec>,
    pub(crate) iterations: u32,
    pub(crate) background: [u8; 3],
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codecs: vec![Codec::Modern, Codec::BaselineLossy, Codec::Lossless],
            iterations: DEFAULT_SEARCH_ITERATIONS,
            background: [255, 255, 255],
        }
    }
}

impl EncoderConfig {
    /// Override the codec priority order.
    #[must_use]
    pub fn with_codecs(mut self, codecs: Vec<Codec>) -> Self {
        self.codecs = codecs;
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Color transparent pixels are composited onto for codecs without alpha.
    #[must_use]
    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = rgb;
        self
    }

    #[must_use]
    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }
}

/// Encodes bitmaps under a byte budget, trying codecs in priority order.
#[derive(Debug, Clone, Default)]
pub struct EncodingPipeline {
    config: EncoderConfig,
}

impl EncodingPipeline {
    #[must_use]
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Returns the output of the first codec that fits `max_bytes`.
    ///
    /// Codecs run one after another; a codec that fails to encode is
    /// treated like one that could not meet the budget. `None` means every
    /// codec was exhausted.
    #[must_use]
    pub fn encode(&self, image: &DynamicImage, max_bytes: usize) -> Option<EncodedImage> {
        for &codec in &self.config.codecs {
            match self.encode_with(codec, image, max_bytes) {
                Ok(Some(encoded)) => {
                    tracing::debug!(
                        ?codec,
                        size = encoded.bytes.len(),
                        quality = encoded.quality,
                        max_bytes,
                        "Image encoded"
                    );
                    return Some(encoded);
                }
                Ok(None) => {
                    tracing::debug!(?codec, max_bytes, "Codec could not meet budget");
                }
                Err(e) => {
                    tracing::warn!(?codec, error = %e, "Codec failed; trying next");
                }
            }
        }
        tracing::warn!(
            width = image.width(),
            height = image.height(),
            max_bytes,
            "No codec fit the byte budget"
        );
        None
    }

    /// Runs one codec strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] or [`Error::Encode`] if the encoder fails.
    pub fn encode_with(
        &self,
        codec: Codec,
        image: &DynamicImage,
        max_bytes: usize,
    ) -> Result<Option<EncodedImage>, Error> {
        let pixels = codec.prepare(image, self.config.background);
        match codec.quality_range() {
            Some(range) => {
                let best = search_quality(range, self.config.iterations, max_bytes, |q| {
                    codec.encode(&pixels, q)
                })?;
                Ok(best.map(|(quality, bytes)| EncodedImage::new(codec, bytes, Some(quality))))
            }
            None => {
                let bytes = codec.encode(&pixels, 1.0)?;
                Ok((bytes.len() <= max_bytes).then(|| EncodedImage::new(codec, bytes, None)))
            }
        }
    }

    /// [`encode`](Self::encode) on Tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the blocking task was cancelled or panicked.
    pub async fn encode_off_thread(
        &self,
        image: DynamicImage,
        max_bytes: usize,
    ) -> Result<Option<EncodedImage>, Error> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.encode(&image, max_bytes))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Encoding task did not complete");
                Error::Cancelled
            })
    }
}
