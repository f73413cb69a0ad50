//! Memoization of generated grain masks.
//!
//! Masks are expensive to synthesize and fully determined by their
//! [`GenerationKey`], so [`MaskCache`] keeps them in a [`MaskStore`]. The
//! default store is a directory of PNG files under the system temp dir;
//! nothing is ever evicted.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{GrainError, GrainResult};
use crate::mask::{self, GrainMask};

/// Subdirectory of the system temp dir used by [`DirStore::in_temp_dir`].
pub const MASK_CACHE_DIR: &str = "mask-cache";

/// Every input that determines a mask's bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationKey {
    pub width: u32,
    pub height: u32,
    /// Negative for B/W grain.
    pub saturation: f64,
    pub grain_size: f64,
    pub grain_power: f64,
    pub seed: u64,
}

impl GenerationKey {
    pub fn is_grayscale(&self) -> bool {
        self.saturation < 0.0
    }

    /// `grain-{w}-{h}-{sat}-{size}-{power}-{seed}.png`. Floats use `{:?}` so
    /// whole numbers keep their `.0` and never collide with integers.
    pub fn file_name(&self) -> String {
        format!(
            "grain-{}-{}-{:?}-{:?}-{:?}-{}.png",
            self.width, self.height, self.saturation, self.grain_size, self.grain_power, self.seed
        )
    }

    pub fn build(&self) -> GrainResult<GrainMask> {
        mask::build(
            self.width,
            self.height,
            self.grain_size,
            self.grain_power,
            self.saturation,
            self.seed,
        )
    }
}

/// Storage backend for [`MaskCache`].
pub trait MaskStore {
    /// `Ok(None)` on a miss.
    fn load(&self, key: &GenerationKey) -> GrainResult<Option<GrainMask>>;

    fn store(&mut self, key: &GenerationKey, mask: &GrainMask) -> GrainResult<()>;
}

/// One PNG per key inside a directory, created on first write.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirStore { root: root.into() }
    }

    /// `<temp dir>/mask-cache`
    pub fn in_temp_dir() -> Self {
        DirStore::new(std::env::temp_dir().join(MASK_CACHE_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &GenerationKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl Default for DirStore {
    fn default() -> Self {
        DirStore::in_temp_dir()
    }
}

impl MaskStore for DirStore {
    fn load(&self, key: &GenerationKey) -> GrainResult<Option<GrainMask>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let img = image::open(&path).map_err(|source| GrainError::Image {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "reusing grain mask");
        Ok(Some(GrainMask::from_dynamic(img)))
    }

    fn store(&mut self, key: &GenerationKey, mask: &GrainMask) -> GrainResult<()> {
        fs::create_dir_all(&self.root).map_err(|source| GrainError::Io {
            path: self.root.clone(),
            source,
        })?;

        // Each writer fills its own temp file, so concurrent misses on one key
        // all succeed and readers never see a partial PNG. The bytes are
        // identical, so whichever persist lands last is fine.
        let path = self.path_for(key);
        let mut partial = tempfile::Builder::new()
            .prefix(".grain-")
            .suffix(".partial")
            .tempfile_in(&self.root)
            .map_err(|source| GrainError::Io {
                path: self.root.clone(),
                source,
            })?;
        {
            let mut writer = BufWriter::new(partial.as_file_mut());
            mask.write_png(&mut writer).map_err(|source| GrainError::Image {
                path: path.clone(),
                source,
            })?;
            writer.flush().map_err(|source| GrainError::Io {
                path: path.clone(),
                source,
            })?;
        }
        partial.persist(&path).map_err(|e| GrainError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        info!(path = %path.display(), "saved grain mask");
        Ok(())
    }
}

/// Process-local store, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    masks: HashMap<String, GrainMask>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

impl MaskStore for MemoryStore {
    fn load(&self, key: &GenerationKey) -> GrainResult<Option<GrainMask>> {
        Ok(self.masks.get(&key.file_name()).cloned())
    }

    fn store(&mut self, key: &GenerationKey, mask: &GrainMask) -> GrainResult<()> {
        self.masks.insert(key.file_name(), mask.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaskCache<S: MaskStore = DirStore> {
    store: S,
}

impl MaskCache<DirStore> {
    /// Cache backed by `<temp dir>/mask-cache`.
    pub fn in_temp_dir() -> Self {
        MaskCache::new(DirStore::in_temp_dir())
    }
}

impl<S: MaskStore> MaskCache<S> {
    pub fn new(store: S) -> Self {
        MaskCache { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the stored mask for `key`, building and storing it first on a
    /// miss.
    pub fn get_or_create(&mut self, key: &GenerationKey) -> GrainResult<GrainMask> {
        if let Some(mask) = self.store.load(key)? {
            debug!(key = %key.file_name(), "grain mask cache hit");
            return Ok(mask);
        }

        debug!(key = %key.file_name(), "grain mask cache miss");
        let mask = key.build()?;
        self.store.store(key, &mask)?;
        Ok(mask)
    }
}
