//! Grain masks and the builder that realises fractional grain sizes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};
use tracing::debug;

use crate::error::{GrainError, GrainResult};
use crate::noise;

/// Noise values in [0, 255], one channel for B/W grain or three for color grain.
#[derive(Debug, Clone, PartialEq)]
pub enum GrainMask {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl GrainMask {
    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            GrainMask::Gray(img) => img.dimensions(),
            GrainMask::Rgb(img) => img.dimensions(),
        }
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, GrainMask::Gray(_))
    }

    /// Grain value at (x, y) for `channel`. A gray mask answers every channel
    /// with its single value.
    #[inline]
    pub fn sample(&self, x: u32, y: u32, channel: usize) -> u8 {
        match self {
            GrainMask::Gray(img) => img.get_pixel(x, y)[0],
            GrainMask::Rgb(img) => img.get_pixel(x, y)[channel],
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        match self {
            GrainMask::Gray(img) => img.as_raw(),
            GrainMask::Rgb(img) => img.as_raw(),
        }
    }

    /// Lanczos resample to the given size.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        match self {
            GrainMask::Gray(img) => {
                GrainMask::Gray(imageops::resize(img, width, height, FilterType::Lanczos3))
            }
            GrainMask::Rgb(img) => {
                GrainMask::Rgb(imageops::resize(img, width, height, FilterType::Lanczos3))
            }
        }
    }

    /// Keeps single-channel images as gray grain; everything else becomes RGB.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => GrainMask::Gray(gray),
            other => GrainMask::Rgb(other.into_rgb8()),
        }
    }

    fn color_type(&self) -> ExtendedColorType {
        match self {
            GrainMask::Gray(_) => ExtendedColorType::L8,
            GrainMask::Rgb(_) => ExtendedColorType::Rgb8,
        }
    }

    /// Writes the mask as PNG with fast compression. Masks are large and
    /// written once, so speed wins over file size.
    pub fn write_png<W: Write>(&self, writer: W) -> Result<(), image::ImageError> {
        let encoder =
            PngEncoder::new_with_quality(writer, CompressionType::Fast, PngFilter::Adaptive);
        let (width, height) = self.dimensions();
        encoder.write_image(self.as_raw(), width, height, self.color_type())
    }

    pub fn save_png(&self, path: &Path) -> GrainResult<()> {
        let file = File::create(path).map_err(|source| GrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.write_png(&mut writer).map_err(|source| GrainError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| GrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Largest side accepted for a working or noise buffer.
pub const MAX_DIMENSION: u32 = 1 << 16;
/// Largest pixel count accepted for a working or noise buffer.
pub const MAX_PIXELS: u64 = 1 << 28;

/// `width / divisor` x `height / divisor`, floored. Errors when either side
/// drops to zero or the result exceeds [`MAX_DIMENSION`] / [`MAX_PIXELS`].
pub(crate) fn divided_size(width: u32, height: u32, divisor: f64) -> GrainResult<(u32, u32)> {
    let new_width = (width as f64 / divisor).floor();
    let new_height = (height as f64 / divisor).floor();
    let too_small = new_width < 1.0 || new_height < 1.0;
    let too_large = new_width > MAX_DIMENSION as f64
        || new_height > MAX_DIMENSION as f64
        || new_width * new_height > MAX_PIXELS as f64;
    if too_small || too_large {
        return Err(GrainError::InvalidDimensions(format!(
            "{width}x{height} divided by {divisor} gives {new_width}x{new_height}"
        )));
    }
    Ok((new_width as u32, new_height as u32))
}

/// Builds a `width` x `height` mask whose grain clumps are `grain_size`
/// pixels across.
///
/// Noise is synthesized at `width / grain_size` x `height / grain_size` and
/// resampled up (or down, for sizes below 1) to the target. A grain size of
/// exactly 1.0 returns the synthesized noise untouched.
pub fn build(
    width: u32,
    height: u32,
    grain_size: f64,
    power: f64,
    saturation: f64,
    seed: u64,
) -> GrainResult<GrainMask> {
    if !grain_size.is_finite() || grain_size <= 0.0 {
        return Err(GrainError::InvalidParameter(format!(
            "grain size must be positive, got {grain_size}"
        )));
    }

    let (noise_width, noise_height) = divided_size(width, height, grain_size)?;

    let noise = noise::synthesize(noise_width, noise_height, power, saturation, seed)?;

    if grain_size == 1.0 {
        return Ok(noise);
    }

    debug!(noise_width, noise_height, width, height, "resampling grain");
    Ok(noise.resized(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_grain_size_is_raw_noise() {
        let mask = build(40, 30, 1.0, 45.0, 0.5, 7).unwrap();
        let noise = noise::synthesize(40, 30, 45.0, 0.5, 7).unwrap();
        assert_eq!(mask, noise);
    }

    #[test]
    fn test_resampled_to_target_size() {
        for size in [0.8, 1.5, 1.6666, 3.0] {
            let mask = build(50, 20, size, 50.0, -1.0, 3).unwrap();
            assert_eq!(mask.dimensions(), (50, 20));
            assert!(mask.is_gray());
        }
        let mask = build(50, 20, 2.0, 50.0, 0.3, 3).unwrap();
        assert_eq!(mask.dimensions(), (50, 20));
        assert!(!mask.is_gray());
    }

    #[test]
    fn test_coarse_grain_is_smoother() {
        // Neighbouring pixels of upsampled noise are correlated.
        fn neighbour_diff(mask: &GrainMask) -> f64 {
            let raw = mask.as_raw();
            let total: f64 = raw
                .windows(2)
                .map(|w| (w[0] as f64 - w[1] as f64).abs())
                .sum();
            total / (raw.len() - 1) as f64
        }
        let fine = build(64, 64, 1.0, 50.0, -1.0, 11).unwrap();
        let coarse = build(64, 64, 4.0, 50.0, -1.0, 11).unwrap();
        assert!(neighbour_diff(&coarse) < neighbour_diff(&fine));
    }

    #[test]
    fn test_reduced_size_of_zero_is_error() {
        let err = build(3, 100, 4.0, 45.0, 0.5, 1).unwrap_err();
        assert!(matches!(err, GrainError::InvalidDimensions(_)));

        let err = build(10, 10, 0.0, 45.0, 0.5, 1).unwrap_err();
        assert!(matches!(err, GrainError::InvalidParameter(_)));
    }

    #[test]
    fn test_tiny_grain_size_is_rejected_not_allocated() {
        let err = build(64, 64, 1e-9, 45.0, 0.5, 1).unwrap_err();
        assert!(matches!(err, GrainError::InvalidDimensions(_)));
    }

    #[test]
    fn test_divided_size_bounds() {
        assert_eq!(divided_size(64, 48, 2.0).unwrap(), (32, 24));
        assert_eq!(divided_size(10, 10, 0.8).unwrap(), (12, 12));
        assert_eq!(divided_size(MAX_DIMENSION, 1, 1.0).unwrap(), (MAX_DIMENSION, 1));
        assert!(divided_size(MAX_DIMENSION, 1, 0.5).is_err());
        assert!(divided_size(40_000, 40_000, 1.0).is_err());
        assert!(divided_size(3, 3, 4.0).is_err());
    }

    #[test]
    fn test_saved_file_decodes_to_same_mask() {
        let dir = tempfile::tempdir().unwrap();
        for (name, saturation) in [("gray.png", -1.0), ("color.png", 0.6)] {
            let mask = build(21, 13, 1.5, 50.0, saturation, 8).unwrap();
            let path = dir.path().join(name);
            mask.save_png(&path).unwrap();

            let decoded = GrainMask::from_dynamic(image::open(&path).unwrap());
            assert_eq!(decoded.is_gray(), saturation < 0.0);
            assert_eq!(decoded, mask);
        }
    }

    #[test]
    fn test_save_into_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mask = build(4, 4, 1.0, 45.0, -1.0, 1).unwrap();
        let err = mask.save_png(&dir.path().join("missing").join("m.png")).unwrap_err();
        assert!(matches!(err, GrainError::Io { .. }));
    }

    #[test]
    fn test_png_round_trip_preserves_mask() {
        let mask = build(17, 9, 1.0, 45.0, 0.4, 5).unwrap();
        let mut bytes = Vec::new();
        mask.write_png(&mut bytes).unwrap();
        let decoded = GrainMask::from_dynamic(image::load_from_memory(&bytes).unwrap());
        assert_eq!(decoded, mask);
    }
}
