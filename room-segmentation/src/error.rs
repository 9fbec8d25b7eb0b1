use std::path::PathBuf;

/// Errors raised while building or running the segmentation model
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    /// The tensor runtime is missing entirely; the model cannot be built at all
    #[error("tensor runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// A weights file exists but could not be read into the network
    #[error("failed to load weights from {path}: {reason}")]
    WeightLoad { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid segmentation mask: {0}")]
    InvalidMask(String),
}

#[cfg(feature = "segmentation")]
impl From<candle_core::Error> for SegmentationError {
    fn from(err: candle_core::Error) -> Self {
        SegmentationError::Inference(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
