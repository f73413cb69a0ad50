//! Error types for grain synthesis and compositing.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrainError {
    /// Grain type code outside the preset table.
    #[error("unknown grain type: {0}")]
    UnknownGrainType(i32),

    /// A width or height that is zero, or became zero after scaling.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a mask failed.
    #[error("image error on {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl GrainError {
    /// True for errors caused by bad parameters rather than the environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GrainError::UnknownGrainType(_)
                | GrainError::InvalidDimensions(_)
                | GrainError::InvalidParameter(_)
        )
    }
}

pub type GrainResult<T> = Result<T, GrainError>;
