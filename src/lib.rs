//! Procedural film grain with a tone-dependent response.
//!
//! ```no_run
//! use film_grain::{GrainCompositor, GrainOptions};
//!
//! let img = image::open("in.png").unwrap().into_rgb32f();
//! let mut compositor = GrainCompositor::new();
//! let grained = compositor.process(&img, &GrainOptions::default()).unwrap();
//! ```

pub mod cache;
pub mod compositor;
pub mod error;
pub mod logging;
pub mod mask;
pub mod noise;
pub mod preset;
pub mod sharpen;
pub mod tone;

pub use cache::{DirStore, GenerationKey, MaskCache, MaskStore, MemoryStore};
pub use compositor::{GrainCompositor, GrainOptions};
pub use error::{GrainError, GrainResult};
pub use mask::GrainMask;
pub use preset::GrainType;
pub use tone::{FilmResponse, ToneCurve, ToneTable};
