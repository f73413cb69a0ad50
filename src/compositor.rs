//! Applies grain to an image.
//!
//! [`GrainCompositor::process`] works on 8-bit pixels internally but takes
//! and returns `Rgb32FImage` with values in [0, 1].

use image::imageops::{self, FilterType};
use image::{Rgb, Rgb32FImage, RgbImage};
use nalgebra::Vector3;
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::info;

use crate::cache::{DirStore, GenerationKey, MaskCache, MaskStore};
use crate::error::{GrainError, GrainResult};
use crate::mask::{divided_size, GrainMask};
use crate::preset::GrainType;
use crate::sharpen::sharpen_passes;
use crate::tone::{FilmResponse, ToneCurve, ToneTable};

#[derive(Debug, Clone, PartialEq)]
pub struct GrainOptions {
    /// Working resolution divisor; grain is rendered at `size / scale` and the
    /// result scaled back.
    pub scale: f64,
    pub src_gamma: f64,
    pub grain_power: f64,
    /// Grain strength in the deep shadows.
    pub shadows: f64,
    /// Grain strength in the brightest highlights.
    pub highs: f64,
    /// Preset code, see [`GrainType`].
    pub grain_type: i32,
    pub grain_sat: f64,
    pub gray_scale: bool,
    /// Number of sharpen passes after compositing.
    pub sharpen: u32,
    pub seed: u64,
}

impl Default for GrainOptions {
    fn default() -> Self {
        GrainOptions {
            scale: 1.0,
            src_gamma: 1.0,
            grain_power: 0.7,
            shadows: 0.2,
            highs: 0.2,
            grain_type: 1,
            grain_sat: 0.5,
            gray_scale: false,
            sharpen: 0,
            seed: 1,
        }
    }
}

pub struct GrainCompositor<S: MaskStore = DirStore, C: ToneCurve = FilmResponse> {
    cache: MaskCache<S>,
    curve: C,
}

impl GrainCompositor<DirStore, FilmResponse> {
    /// Compositor caching masks under `<temp dir>/mask-cache`.
    pub fn new() -> Self {
        GrainCompositor::with_store(DirStore::in_temp_dir())
    }
}

impl Default for GrainCompositor<DirStore, FilmResponse> {
    fn default() -> Self {
        GrainCompositor::new()
    }
}

impl<S: MaskStore> GrainCompositor<S, FilmResponse> {
    pub fn with_store(store: S) -> Self {
        GrainCompositor::with_parts(MaskCache::new(store), FilmResponse)
    }
}

impl<S: MaskStore, C: ToneCurve> GrainCompositor<S, C> {
    pub fn with_parts(cache: MaskCache<S>, curve: C) -> Self {
        GrainCompositor { cache, curve }
    }

    pub fn cache(&self) -> &MaskCache<S> {
        &self.cache
    }

    pub fn process(&mut self, image: &Rgb32FImage, options: &GrainOptions) -> GrainResult<Rgb32FImage> {
        let grain_type = GrainType::from_code(options.grain_type)?;
        let (org_width, org_height) = image.dimensions();
        if org_width == 0 || org_height == 0 {
            return Err(GrainError::InvalidDimensions(format!(
                "source image {org_width}x{org_height}"
            )));
        }

        let mut img = to_rgb8(image);

        if options.scale != 1.0 {
            let (width, height) = scaled_size(org_width, org_height, options.scale)?;
            info!(width, height, "scaling source image");
            img = imageops::resize(&img, width, height, FilterType::Lanczos3);
        }

        let (width, height) = img.dimensions();
        info!(width, height, "working size");

        let table = self.curve.calculate(
            options.src_gamma,
            options.grain_power,
            options.shadows,
            options.highs,
        )?;

        let key = GenerationKey {
            width,
            height,
            saturation: if options.gray_scale { -1.0 } else { options.grain_sat },
            grain_size: grain_type.grain_size(),
            grain_power: grain_type.gauss_power(),
            seed: options.seed,
        };
        let mask = self.cache.get_or_create(&key)?;
        if mask.dimensions() != (width, height) {
            return Err(GrainError::InvalidDimensions(format!(
                "grain mask {}x{} does not match image {width}x{height}",
                mask.width(),
                mask.height()
            )));
        }

        let mut img = if options.gray_scale {
            info!("film graining image (grayscale)");
            composite_gray(&img, &mask, &table)
        } else {
            info!("film graining image");
            composite_rgb(&img, &mask, &table)
        };

        if options.scale != 1.0 {
            info!(org_width, org_height, "scaling image back to original size");
            img = imageops::resize(&img, org_width, org_height, FilterType::Lanczos3);
        }

        if options.sharpen > 0 {
            info!(passes = options.sharpen, "sharpening image");
            img = sharpen_passes(img, options.sharpen);
        }

        Ok(to_rgb32f(&img))
    }
}

fn scaled_size(width: u32, height: u32, scale: f64) -> GrainResult<(u32, u32)> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(GrainError::InvalidParameter(format!(
            "scale must be positive, got {scale}"
        )));
    }
    divided_size(width, height, scale)
}

/// Each channel looks up its own grain value.
fn composite_rgb(img: &RgbImage, mask: &GrainMask, table: &ToneTable) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    out.enumerate_pixels_mut()
        .par_bridge()
        .for_each(|(x, y, pixel)| {
            let src = img.get_pixel(x, y);
            for c in 0..3 {
                pixel[c] = table.lookup(src[c], mask.sample(x, y, c));
            }
        });
    out
}

/// One luminance lookup per pixel, written to all three channels.
fn composite_gray(img: &RgbImage, mask: &GrainMask, table: &ToneTable) -> RgbImage {
    let weights = Vector3::new(0.21f32, 0.72, 0.07);
    let mut out = RgbImage::new(img.width(), img.height());
    out.enumerate_pixels_mut()
        .par_bridge()
        .for_each(|(x, y, pixel)| {
            let src = img.get_pixel(x, y);
            let rgb = Vector3::new(src[0] as f32, src[1] as f32, src[2] as f32);
            let luma = weights.dot(&rgb).clamp(0.0, 255.0) as u8;
            let value = table.lookup(luma, mask.sample(x, y, 0));
            *pixel = Rgb([value; 3]);
        });
    out
}

fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(image.get_pixel(x, y).0.map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8))
    })
}

fn to_rgb32f(image: &RgbImage) -> Rgb32FImage {
    Rgb32FImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(image.get_pixel(x, y).0.map(|v| v as f32 / 255.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn flat(width: u32, height: u32, value: f32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(width, height, Rgb([value; 3]))
    }

    #[test]
    fn test_byte_conversion_clamps() {
        let mut img = flat(2, 1, 0.5);
        img.put_pixel(1, 0, Rgb([-0.5, 1.5, f32::NAN]));
        let bytes = to_rgb8(&img);
        assert_eq!(bytes.get_pixel(0, 0), &Rgb([127, 127, 127]));
        assert_eq!(bytes.get_pixel(1, 0), &Rgb([0, 255, 0]));
        assert_eq!(to_rgb32f(&bytes).get_pixel(1, 0), &Rgb([0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(64, 48, 2.0).unwrap(), (32, 24));
        assert_eq!(scaled_size(65, 48, 2.0).unwrap(), (32, 24));
        assert!(matches!(scaled_size(3, 3, 4.0), Err(GrainError::InvalidDimensions(_))));
        assert!(matches!(scaled_size(3, 3, 0.0), Err(GrainError::InvalidParameter(_))));
        assert!(matches!(scaled_size(64, 48, 1e-9), Err(GrainError::InvalidDimensions(_))));
    }

    #[test]
    fn test_gray_composite_uses_luma_weights() {
        let img = RgbImage::from_pixel(1, 1, Rgb([100, 200, 50]));
        let mask = GrainMask::Gray(image::GrayImage::from_pixel(1, 1, image::Luma([9])));
        let table = ToneTable::from_fn(|tone, _| tone);
        // 0.21 * 100 + 0.72 * 200 + 0.07 * 50 = 168.5
        assert_eq!(composite_gray(&img, &mask, &table).get_pixel(0, 0), &Rgb([168; 3]));
    }

    #[test]
    fn test_rgb_composite_pairs_channels() {
        let img = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        let mask = GrainMask::Rgb(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])));
        let table = ToneTable::from_fn(|tone, grain| tone.wrapping_add(grain));
        assert_eq!(composite_rgb(&img, &mask, &table).get_pixel(0, 0), &Rgb([11, 22, 33]));
    }

    #[test]
    fn test_gray_output_is_neutral() {
        let mut compositor = GrainCompositor::with_store(MemoryStore::new());
        let mut img = flat(16, 16, 0.3);
        img.put_pixel(4, 4, Rgb([0.9, 0.1, 0.4]));
        let options = GrainOptions { gray_scale: true, ..GrainOptions::default() };
        let out = compositor.process(&img, &options).unwrap();
        for px in out.pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
        let stored = compositor.cache().store().len();
        assert_eq!(stored, 1);
    }

    #[test]
    fn test_unknown_grain_type_touches_nothing() {
        let mut compositor = GrainCompositor::with_store(MemoryStore::new());
        let options = GrainOptions { grain_type: 99, ..GrainOptions::default() };
        let err = compositor.process(&flat(8, 8, 0.5), &options).unwrap_err();
        assert!(matches!(err, GrainError::UnknownGrainType(99)));
        assert!(compositor.cache().store().is_empty());
    }

    #[test]
    fn test_mismatched_cached_mask_is_rejected() {
        struct WrongSize;
        impl MaskStore for WrongSize {
            fn load(&self, _: &GenerationKey) -> GrainResult<Option<GrainMask>> {
                Ok(Some(GrainMask::Gray(image::GrayImage::new(3, 3))))
            }
            fn store(&mut self, _: &GenerationKey, _: &GrainMask) -> GrainResult<()> {
                Ok(())
            }
        }
        let mut compositor = GrainCompositor::with_store(WrongSize);
        let err = compositor.process(&flat(8, 8, 0.5), &GrainOptions::default()).unwrap_err();
        assert!(matches!(err, GrainError::InvalidDimensions(_)));
    }
}
