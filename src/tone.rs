//! Tone response: the (source tone, grain value) -> output tone lookup.
//!
//! [`ToneTable`] is a flat 256x256 byte table, so compositing costs one
//! index per channel. How the table is filled is up to a [`ToneCurve`];
//! [`FilmResponse`] is the curve the compositor uses by default.

use rayon::prelude::*;

use crate::error::{GrainError, GrainResult};

const LEVELS: usize = 256;

/// Tone where shadow attenuation stops.
const SHADOW_END: f64 = 160.0;
/// Tone where highlight attenuation starts.
const HIGHLIGHT_START: f64 = 200.0;
/// Grain amplitude across the midtones.
const MID_DEVELOPMENT: f64 = 0.5;

/// Immutable `table[tone][grain]` lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct ToneTable {
    data: Box<[u8]>,
}

impl ToneTable {
    /// Fills every entry from `f(tone, grain)`, one row per tone in parallel.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u8, u8) -> u8 + Sync,
    {
        let mut data = vec![0u8; LEVELS * LEVELS].into_boxed_slice();
        data.par_chunks_mut(LEVELS)
            .enumerate()
            .for_each(|(tone, row)| {
                for (grain, out) in row.iter_mut().enumerate() {
                    *out = f(tone as u8, grain as u8);
                }
            });
        ToneTable { data }
    }

    #[inline]
    pub fn lookup(&self, tone: u8, grain: u8) -> u8 {
        self.data[(tone as usize) << 8 | grain as usize]
    }

    /// Output tones for one source tone, indexed by grain value.
    pub fn row(&self, tone: u8) -> &[u8] {
        let start = tone as usize * LEVELS;
        &self.data[start..start + LEVELS]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for ToneTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneTable")
            .field("neutral_black", &self.lookup(0, 128))
            .field("neutral_white", &self.lookup(255, 128))
            .finish()
    }
}

/// Builds a [`ToneTable`] from the compositing parameters.
pub trait ToneCurve {
    fn calculate(
        &self,
        src_gamma: f64,
        grain_power: f64,
        shadows: f64,
        highs: f64,
    ) -> GrainResult<ToneTable>;
}

/// Film-like grain response.
///
/// The source tone is gamma corrected by `src_gamma`. Grain is bent through
/// a per-tone gamma running from 0.5 in black to 2.0 in white and shifted so
/// grain value 128 adds nothing. Its amplitude is `grain_power` times a
/// development curve: `shadows` at black rising to 0.5 at tone 160, flat to
/// 200, then falling to `highs` at white. The picture itself is squeezed
/// away from both ends to leave room for the grain.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilmResponse;

impl ToneCurve for FilmResponse {
    fn calculate(
        &self,
        src_gamma: f64,
        grain_power: f64,
        shadows: f64,
        highs: f64,
    ) -> GrainResult<ToneTable> {
        if !src_gamma.is_finite() || src_gamma <= 0.0 {
            return Err(GrainError::InvalidParameter(format!(
                "source gamma must be positive, got {src_gamma}"
            )));
        }
        for (name, value) in [("grain power", grain_power), ("shadows", shadows), ("highs", highs)] {
            if !value.is_finite() {
                return Err(GrainError::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        let crop_top = grain_power * highs / 12.0;
        let crop_low = grain_power * shadows / 20.0;
        let pic_scale = 1.0 - (crop_top + crop_low);
        let pic_offset = 255.0 * crop_low;

        let rows: Vec<ToneRow> = (0..LEVELS)
            .map(|tone| {
                let pic = gamma_curve(src_gamma, tone as f64) * 255.0;
                let grain_gamma = pic * (1.5 / 256.0) + 0.5;
                ToneRow {
                    base: pic * pic_scale + pic_offset,
                    grain_gamma,
                    grain_offset: gamma_curve(grain_gamma, 128.0),
                    amplitude: 255.0 * development(shadows, highs, pic) * grain_power,
                }
            })
            .collect();

        Ok(ToneTable::from_fn(|tone, grain| {
            let row = &rows[tone as usize];
            let grain = gamma_curve(row.grain_gamma, grain as f64) - row.grain_offset;
            to_level(row.base + row.amplitude * grain)
        }))
    }
}

impl ToneTable {
    /// Table from the default [`FilmResponse`] curve.
    pub fn calculate(
        src_gamma: f64,
        grain_power: f64,
        shadows: f64,
        highs: f64,
    ) -> GrainResult<Self> {
        FilmResponse.calculate(src_gamma, grain_power, shadows, highs)
    }
}

struct ToneRow {
    base: f64,
    grain_gamma: f64,
    grain_offset: f64,
    amplitude: f64,
}

/// `(x / 255) ^ (1 / gamma)`, in [0, 1] for x in [0, 255].
#[inline]
fn gamma_curve(gamma: f64, x: f64) -> f64 {
    (x / 255.0).powf(1.0 / gamma)
}

fn development(shadows: f64, highs: f64, tone: f64) -> f64 {
    if tone < SHADOW_END {
        MID_DEVELOPMENT - (SHADOW_END - tone) * (MID_DEVELOPMENT - shadows) / SHADOW_END
    } else if tone < HIGHLIGHT_START {
        MID_DEVELOPMENT
    } else {
        MID_DEVELOPMENT
            - (tone - HIGHLIGHT_START) * (MID_DEVELOPMENT - highs) / (255.0 - HIGHLIGHT_START)
    }
}

// Truncates like an integer cast, saturating at both ends.
#[inline]
fn to_level(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
