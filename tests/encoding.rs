//! Byte-budget encoding of camera-sized bitmaps.
#![cfg(feature = "imaging")]

use eatpic_client::imaging::{Codec, EncoderConfig, EncodingPipeline};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Roughly 10 MB of uncompressible RGBA pixels.
fn noise_rgba(side: u32) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(7);
    DynamicImage::ImageRgba8(RgbaImage::from_fn(side, side, |_, _| {
        Rgba([rng.random(), rng.random(), rng.random(), 255])
    }))
}

fn food_photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let warm = ((x + y) % 256) as u8;
        Rgb([200u8.saturating_sub(warm / 4), 120 + warm / 3, 60])
    }))
}

#[test]
fn uncompressible_bitmap_exhausts_every_codec() {
    let image = noise_rgba(1600);
    assert!(EncodingPipeline::default().encode(&image, 200_000).is_none());
}

#[tokio::test]
async fn uncompressible_bitmap_off_thread_yields_none() {
    let image = noise_rgba(800);
    let result = EncodingPipeline::default()
        .encode_off_thread(image, 50_000)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn smooth_photo_fits_with_modern_codec() {
    let encoded = EncodingPipeline::default()
        .encode(&food_photo(1024, 768), 200_000)
        .unwrap();

    assert_eq!(encoded.codec, Codec::Modern);
    assert!(encoded.bytes.len() <= 200_000);
    let quality = encoded.quality.unwrap();
    assert!((0.4..=0.9).contains(&quality));

    let decoded = image::load_from_memory(&encoded.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1024, 768));
}

#[test]
fn suggested_file_names_are_unique() {
    let pipeline = EncodingPipeline::new(EncoderConfig::default().with_codecs(vec![Codec::Lossless]));
    let image = food_photo(32, 32);

    let a = pipeline.encode(&image, usize::MAX).unwrap();
    let b = pipeline.encode(&image, usize::MAX).unwrap();

    assert_ne!(a.suggested_file_name, b.suggested_file_name);
    assert!(a.suggested_file_name.ends_with(".png"));
    assert_eq!(a.bytes, b.bytes);
}
