use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::error::Error;

/// Encoding strategies, in the order the pipeline normally tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// WebP lossy: the most compact output, keeps alpha.
    Modern,
    /// Baseline JPEG. Transparent images are flattened first.
    BaselineLossy,
    /// PNG. Single attempt, no quality search.
    Lossless,
}

impl Codec {
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Modern => "image/webp",
            Self::BaselineLossy => "image/jpeg",
            Self::Lossless => "image/png",
        }
    }

    #[must_use]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Modern => "webp",
            Self::BaselineLossy => "jpg",
            Self::Lossless => "png",
        }
    }

    /// Quality search bounds on a 0.0-1.0 scale; `None` for lossless.
    #[must_use]
    pub fn quality_range(self) -> Option<(f32, f32)> {
        match self {
            Self::Modern => Some((0.4, 0.9)),
            Self::BaselineLossy => Some((0.3, 0.85)),
            Self::Lossless => None,
        }
    }

    #[must_use]
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::BaselineLossy)
    }

    /// Converts `image` into the pixel layout this codec encodes.
    pub(crate) fn prepare(self, image: &DynamicImage, background: [u8; 3]) -> Prepared {
        let transparent = has_transparency(image);
        if transparent && self.supports_alpha() {
            Prepared::Rgba(image.to_rgba8())
        } else if transparent {
            Prepared::Rgb(flatten(image, background))
        } else {
            Prepared::Rgb(image.to_rgb8())
        }
    }

    /// Encodes prepared pixels; `quality` is ignored by the lossless codec.
    pub(crate) fn encode(self, pixels: &Prepared, quality: f32) -> Result<Vec<u8>, Error> {
        match self {
            Self::Modern => encode_webp(pixels, quality),
            Self::BaselineLossy => encode_jpeg(pixels, quality),
            Self::Lossless => encode_png(pixels),
        }
    }
}

/// Pixels ready for a codec.
pub(crate) enum Prepared {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Prepared {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgb(img) => img.dimensions(),
            Self::Rgba(img) => img.dimensions(),
        }
    }
}

/// True if any pixel is not fully opaque.
#[must_use]
pub fn has_transparency(image: &DynamicImage) -> bool {
    match image {
        DynamicImage::ImageRgba8(buf) => buf.pixels().any(|p| p.0[3] != u8::MAX),
        other if other.color().has_alpha() => {
            other.to_rgba8().pixels().any(|p| p.0[3] != u8::MAX)
        }
        _ => false,
    }
}

/// Composites `image` over an opaque `background`, discarding alpha.
#[must_use]
pub fn flatten(image: &DynamicImage, background: [u8; 3]) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u16::from(a);
        let blend = |c: u8, bg: u8| -> u8 {
            ((u16::from(c) * a + u16::from(bg) * (255 - a) + 127) / 255) as u8
        };
        image::Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    })
}

fn encode_webp(pixels: &Prepared, quality: f32) -> Result<Vec<u8>, Error> {
    let (width, height) = pixels.dimensions();
    let encoder = match pixels {
        Prepared::Rgb(img) => webp::Encoder::from_rgb(img.as_raw(), width, height),
        Prepared::Rgba(img) => webp::Encoder::from_rgba(img.as_raw(), width, height),
    };
    let memory = encoder
        .encode_simple(false, (quality * 100.0).clamp(0.0, 100.0))
        .map_err(|e| Error::Encode(format!("webp: {e:?}")))?;
    Ok(memory.to_vec())
}

fn encode_jpeg(pixels: &Prepared, quality: f32) -> Result<Vec<u8>, Error> {
    let Prepared::Rgb(img) = pixels else {
        return Err(Error::Encode("jpeg: alpha must be flattened first".into()));
    };
    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

fn encode_png(pixels: &Prepared) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    match pixels {
        Prepared::Rgb(img) => {
            encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)?;
        }
        Prepared::Rgba(img) => {
            encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)?;
        }
    }
    Ok(out)
}

/// Binary search for the highest quality whose output fits `max_bytes`.
///
/// Each step encodes at the midpoint of `[low, high]`, raising `low` when the
/// output fits and lowering `high` when it does not. Returns the highest
/// fitting `(quality, bytes)` seen, or `None` if no step fit.
pub(crate) fn search_quality<F>(
    (mut low, mut high): (f32, f32),
    iterations: u32,
    max_bytes: usize,
    mut encode: F,
) -> Result<Option<(f32, Vec<u8>)>, Error>
where
    F: FnMut(f32) -> Result<Vec<u8>, Error>,
{
    let mut best = None;
    for _ in 0..iterations {
        let mid = (low + high) / 2.0;
        let bytes = encode(mid)?;
        tracing::trace!(quality = mid, size = bytes.len(), max_bytes, "Quality probe");
        if bytes.len() <= max_bytes {
            // `low` only rises, so every fit beats the previous one.
            best = Some((mid, bytes));
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(best)
}
