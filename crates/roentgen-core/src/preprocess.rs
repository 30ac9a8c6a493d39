//! Deterministic image preprocessing for the classifier.
//!
//! The classifier head was trained behind the standard ImageNet transform
//! chain, so the numeric contract here must match it exactly:
//! - Force 3-channel RGB (grayscale and alpha sources included)
//! - Resize so the shorter side becomes 256 pixels, aspect preserved, bilinear
//! - Center-crop a 224×224 square
//! - Scale pixel values to [0, 1]
//! - Normalize each channel with the fixed ImageNet mean and std
//! - Add a leading batch dimension of 1 (NCHW layout)
//!
//! The only input validation is decodability; source format and dimensions
//! are otherwise unrestricted, and the output shape is invariant.

use candle_core::{Device, Tensor};
use image::{imageops::FilterType, DynamicImage};

use crate::error::{ImageDecodeError, InferenceError};

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Target of the aspect-preserving resize: the shorter image side.
pub const RESIZE_SHORTER_SIDE: u32 = 256;

/// Side length of the square center crop fed to the classifier.
pub const CROP_SIZE: u32 = 224;

/// ImageNet per-channel normalization mean.
const NORM_MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];

/// ImageNet per-channel normalization std.
const NORM_STD: [f32; CHANNELS] = [0.229, 0.224, 0.225];

/// Decode raw bytes into an image, guessing the format from content.
///
/// Undecodable bytes are the one failure mode; there is no size or
/// format allow-list beyond "decodable as an image".
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageDecodeError> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageDecodeError::new(format!("Cannot detect image format: {e}")))?;
    reader
        .decode()
        .map_err(|e| ImageDecodeError::new(e.to_string()))
}

/// Transform a decoded image into a normalized `[1, 3, 224, 224]` tensor on
/// the given device.
pub fn transform(image: &DynamicImage, device: &Device) -> Result<Tensor, InferenceError> {
    // Convert to RGB before resampling so interpolation never mixes in an
    // alpha channel.
    let rgb8 = image.to_rgb8();
    let (width, height) = rgb8.dimensions();
    let rgb = DynamicImage::ImageRgb8(rgb8);

    let (resize_w, resize_h) = resize_dims(width, height);
    let resized = rgb.resize_exact(resize_w, resize_h, FilterType::Triangle);

    let left = (resize_w - CROP_SIZE) / 2;
    let top = (resize_h - CROP_SIZE) / 2;
    let cropped = resized.crop_imm(left, top, CROP_SIZE, CROP_SIZE).to_rgb8();

    let size = CROP_SIZE as usize;
    let mut data = vec![0f32; CHANNELS * size * size];

    // NCHW fill straight from the raw RGB byte triples: pixel i sits at
    // spatial offset i, channel c at plane offset c * size * size.
    for (i, pixel) in cropped.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * size * size + i] = (val as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
        }
    }

    Tensor::from_vec(data, (1, CHANNELS, size, size), device).map_err(|e| {
        InferenceError::Preprocess {
            context: "input tensor allocation".to_string(),
            source: e,
        }
    })
}

/// Dimensions after scaling the shorter side to [`RESIZE_SHORTER_SIDE`],
/// preserving aspect ratio.
fn resize_dims(width: u32, height: u32) -> (u32, u32) {
    let target = RESIZE_SHORTER_SIDE as f64;
    if width <= height {
        let scaled = (height as f64 * target / width as f64).round() as u32;
        (RESIZE_SHORTER_SIDE, scaled.max(RESIZE_SHORTER_SIDE))
    } else {
        let scaled = (width as f64 * target / height as f64).round() as u32;
        (scaled.max(RESIZE_SHORTER_SIDE), RESIZE_SHORTER_SIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn tensor_values(t: &Tensor) -> Vec<f32> {
        t.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn test_resize_dims_shorter_side() {
        assert_eq!(resize_dims(50, 50), (256, 256));
        assert_eq!(resize_dims(4000, 3000), (341, 256));
        assert_eq!(resize_dims(3000, 4000), (256, 341));
        assert_eq!(resize_dims(224, 448), (256, 512));
    }

    #[test]
    fn test_transform_shape_invariant() {
        let device = Device::Cpu;
        for (w, h) in [(50, 50), (4000, 3000), (640, 480)] {
            let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            let tensor = transform(&img, &device).unwrap();
            assert_eq!(tensor.dims(), &[1, 3, 224, 224], "source {w}x{h}");
        }
    }

    #[test]
    fn test_transform_forces_three_channels() {
        let device = Device::Cpu;
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(300, 300));
        let tensor = transform(&gray, &device).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 224, 224]);

        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(300, 300));
        let tensor = transform(&rgba, &device).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_transform_normalization_values() {
        let device = Device::Cpu;

        // White image: every channel c is (1.0 - mean[c]) / std[c].
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            300,
            300,
            Rgb([255, 255, 255]),
        ));
        let values = tensor_values(&transform(&img, &device).unwrap());
        let plane = 224 * 224;
        for c in 0..3 {
            let expected = (1.0 - NORM_MEAN[c]) / NORM_STD[c];
            assert!((values[c * plane] - expected).abs() < 1e-5);
        }

        // Black image: (0.0 - mean[c]) / std[c].
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 300, Rgb([0, 0, 0])));
        let values = tensor_values(&transform(&img, &device).unwrap());
        for c in 0..3 {
            let expected = -NORM_MEAN[c] / NORM_STD[c];
            assert!((values[c * plane] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_decode_then_transform_is_deterministic() {
        let device = Device::Cpu;
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(321, 201, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));
        let bytes = png_bytes(&img);

        let a = tensor_values(&transform(&decode(&bytes).unwrap(), &device).unwrap());
        let b = tensor_values(&transform(&decode(&bytes).unwrap(), &device).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        let mut bytes = png_bytes(&img);
        bytes.truncate(bytes.len() / 2);
        assert!(decode(&bytes).is_err());
    }
}
