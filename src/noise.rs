//! Seeded gaussian noise fields.

use image::{GrayImage, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::error::{GrainError, GrainResult};
use crate::mask::GrainMask;

const MID_LEVEL: f64 = 128.0;

/// Generates a noise field centred on 128.
///
/// A negative `saturation` gives single-channel grain with standard
/// deviation `power`. Otherwise every pixel gets a shared intensity with
/// deviation `power * (1 - saturation)` plus per-channel noise with deviation
/// `power * saturation`; saturation above 1 is treated as 1.
///
/// Each call owns a generator seeded from `seed`, so the output depends on
/// nothing but the arguments.
pub fn synthesize(
    width: u32,
    height: u32,
    power: f64,
    saturation: f64,
    seed: u64,
) -> GrainResult<GrainMask> {
    if width == 0 || height == 0 {
        return Err(GrainError::InvalidDimensions(format!(
            "noise buffer {width}x{height}"
        )));
    }
    if !power.is_finite() || power < 0.0 {
        return Err(GrainError::InvalidParameter(format!(
            "grain power must be a non-negative number, got {power}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    if saturation < 0.0 {
        debug!(width, height, power, seed, "making B/W grain");
        gray_noise(width, height, power, &mut rng).map(GrainMask::Gray)
    } else {
        debug!(width, height, saturation, power, seed, "making RGB grain");
        rgb_noise(width, height, power, saturation.min(1.0), &mut rng).map(GrainMask::Rgb)
    }
}

fn gray_noise<R: Rng>(width: u32, height: u32, power: f64, rng: &mut R) -> GrainResult<GrayImage> {
    let normal = gaussian(MID_LEVEL, power)?;
    let len = width as usize * height as usize;
    let data: Vec<u8> = (0..len).map(|_| to_level(normal.sample(rng))).collect();

    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| GrainError::InvalidDimensions(format!("noise buffer {width}x{height}")))
}

fn rgb_noise<R: Rng>(
    width: u32,
    height: u32,
    power: f64,
    saturation: f64,
    rng: &mut R,
) -> GrainResult<RgbImage> {
    let intensity = gaussian(MID_LEVEL, power * (1.0 - saturation))?;
    let chroma = gaussian(0.0, power * saturation)?;
    let len = width as usize * height as usize;

    // The whole intensity field is drawn before any chroma so the stream
    // layout does not depend on the channel count.
    let base: Vec<f64> = (0..len).map(|_| intensity.sample(rng)).collect();

    let mut data = Vec::with_capacity(len * 3);
    for level in base {
        for _ in 0..3 {
            data.push(to_level(level + chroma.sample(rng)));
        }
    }

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| GrainError::InvalidDimensions(format!("noise buffer {width}x{height}")))
}

fn gaussian(mean: f64, std_dev: f64) -> GrainResult<Normal<f64>> {
    Normal::new(mean, std_dev)
        .map_err(|e| GrainError::InvalidParameter(format!("gaussian std {std_dev}: {e}")))
}

#[inline]
fn to_level(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
