//! Fixed 3x3 sharpening pass.

use image::RgbImage;
use nalgebra::Matrix3;
use rayon::iter::{ParallelBridge, ParallelIterator};

const KERNEL_DIVISOR: f32 = 16.0;

fn kernel() -> Matrix3<f32> {
    Matrix3::new(
        -2.0, -2.0, -2.0, //
        -2.0, 32.0, -2.0, //
        -2.0, -2.0, -2.0,
    ) / KERNEL_DIVISOR
}

/// One sharpening pass. Edge pixels have no full neighbourhood and are
/// copied through unchanged.
pub fn sharpen(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    if width < 3 || height < 3 {
        return out;
    }

    let kernel = kernel();

    out.enumerate_pixels_mut()
        .par_bridge()
        .for_each(|(x, y, pixel)| {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                return;
            }
            for c in 0..3 {
                let mut acc = 0.0f32;
                for ky in 0..3u32 {
                    for kx in 0..3u32 {
                        let src = img.get_pixel(x + kx - 1, y + ky - 1)[c] as f32;
                        acc += kernel[(ky as usize, kx as usize)] * src;
                    }
                }
                pixel[c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        });

    out
}

/// Applies [`sharpen`] `passes` times in sequence.
pub fn sharpen_passes(img: RgbImage, passes: u32) -> RgbImage {
    (0..passes).fold(img, |acc, _| sharpen(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_kernel_sums_to_one() {
        assert!((kernel().sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_image_unchanged() {
        let img = RgbImage::from_pixel(8, 8, Rgb([90, 120, 200]));
        assert_eq!(sharpen_passes(img.clone(), 3), img);
    }

    #[test]
    fn test_zero_passes_is_identity() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([10, 10, 10]));
        img.put_pixel(2, 2, Rgb([200, 10, 10]));
        assert_eq!(sharpen_passes(img.clone(), 0), img);
    }

    #[test]
    fn test_boosts_local_contrast() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([100, 100, 100]));
        img.put_pixel(2, 2, Rgb([120, 120, 120]));
        let out = sharpen(&img);
        // (32 * 120 - 16 * 100) / 16 = 140
        assert_eq!(out.get_pixel(2, 2)[0], 140);
        // (32 * 100 - 14 * 100 - 2 * 120) / 16 = 97.5
        assert_eq!(out.get_pixel(1, 1)[0], 98);
        // Border untouched.
        assert_eq!(out.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn test_tiny_image_passes_through() {
        let img = RgbImage::from_pixel(2, 7, Rgb([1, 2, 3]));
        assert_eq!(sharpen(&img), img);
    }
}
