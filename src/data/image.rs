//! Image preprocessing
//!
//! Decodes raw image bytes (or base64 payloads) into normalized CHW tensors.
//! Every image is resized to exactly `size`×`size` with bilinear filtering
//! regardless of aspect ratio: lossy for non-square sources, but it keeps
//! the network architecture fixed-size. Pixel values are mapped from [0, 255]
//! to [-1, 1] (mean 0.5, std 0.5 per channel).

use base64::Engine;
use image::imageops::FilterType;

use crate::{Error, Result, Tensor};

/// Decode a base64 payload into raw image bytes
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Decode { message: format!("invalid base64: {e}") })
}

/// Decode image bytes and produce a normalized `[channels, size, size]`
/// pixel buffer in CHW order with values in [-1, 1].
pub fn preprocess_bytes(bytes: &[u8], size: usize) -> Result<Vec<f32>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::Decode { message: format!("unsupported or corrupt image: {e}") })?;
    let resized = img.resize_exact(size as u32, size as u32, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut chw = vec![0.0f32; 3 * size * size];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * size + x as usize;
        for c in 0..3 {
            chw[c * size * size + idx] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    Ok(chw)
}

/// Decode a base64-encoded image into a normalized pixel buffer
pub fn preprocess_base64(payload: &str, size: usize) -> Result<Vec<f32>> {
    let bytes = decode_base64(payload)?;
    preprocess_bytes(&bytes, size)
}

/// Stack per-image CHW buffers into a `[n, 3, size, size]` batch tensor
pub fn batch_tensor(samples: &[Vec<f32>], size: usize) -> Tensor {
    let n = samples.len();
    let per_image = 3 * size * size;
    let mut data = Vec::with_capacity(n * per_image);
    for sample in samples {
        debug_assert_eq!(sample.len(), per_image);
        data.extend_from_slice(sample);
    }
    Tensor::from_shape_vec(&[n, 3, size, size], data, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn solid_png(r: u8, g: u8, b: u8, w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([r, g, b]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encode");
        bytes
    }

    #[test]
    fn test_red_square_normalization() {
        let bytes = solid_png(255, 0, 0, 64, 64);
        let chw = preprocess_bytes(&bytes, 64).expect("decode");
        assert_eq!(chw.len(), 3 * 64 * 64);

        // Red channel saturates to 1.0, green and blue to -1.0
        for &v in &chw[..64 * 64] {
            assert!((v - 1.0).abs() < 1e-5);
        }
        for &v in &chw[64 * 64..] {
            assert!((v + 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_output_in_range_for_any_valid_image() {
        let bytes = solid_png(13, 200, 77, 10, 30);
        let chw = preprocess_bytes(&bytes, 64).expect("decode");
        assert_eq!(chw.len(), 3 * 64 * 64);
        assert!(chw.iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_non_square_source_is_resized() {
        // 120x17 source still lands on 64x64
        let bytes = solid_png(0, 0, 255, 120, 17);
        let chw = preprocess_bytes(&bytes, 64).expect("decode");
        assert_eq!(chw.len(), 3 * 64 * 64);
    }

    #[test]
    fn test_malformed_bytes_yield_decode_error() {
        let err = preprocess_bytes(b"definitely not an image", 64).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(err.code(), "E100");
    }

    #[test]
    fn test_truncated_base64_yields_decode_error() {
        let err = preprocess_base64("!!!not-base64!!!", 64).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_valid_base64_of_garbage_yields_decode_error() {
        let payload = base64::engine::general_purpose::STANDARD.encode(b"garbage bytes");
        let err = preprocess_base64(&payload, 64).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_base64_round_trip() {
        let bytes = solid_png(10, 20, 30, 8, 8);
        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let chw = preprocess_base64(&payload, 64).expect("decode");
        assert_eq!(chw.len(), 3 * 64 * 64);
    }

    #[test]
    fn test_batch_tensor_shape() {
        let samples = vec![vec![0.0; 3 * 64 * 64]; 4];
        let batch = batch_tensor(&samples, 64);
        assert_eq!(batch.shape(), &[4, 3, 64, 64]);
        assert!(!batch.requires_grad());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn prop_any_solid_image_normalizes_in_range(
                r in 0u8..=255,
                g in 0u8..=255,
                b in 0u8..=255,
                w in 1u32..80,
                h in 1u32..80,
            ) {
                let bytes = solid_png(r, g, b, w, h);
                let chw = preprocess_bytes(&bytes, 64).expect("decode");
                prop_assert_eq!(chw.len(), 3 * 64 * 64);
                prop_assert!(chw.iter().all(|&v| (-1.0..=1.0).contains(&v)));
            }
        }
    }
}
