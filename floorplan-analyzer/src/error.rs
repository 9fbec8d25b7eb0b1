use room_segmentation::SegmentationError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced to the caller of an analysis.
///
/// Primary-detector failures never show up here: the orchestrator absorbs
/// them so the hybrid detector can run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Missing runtime or invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid image file: {0}")]
    Decode(#[from] image::ImageError),

    /// Neither the segmentation model nor the hybrid detector found a room
    #[error("No rooms detected in image. Try a cleaner scan, a higher resolution, or enable enhanced segmentation")]
    DetectionEmpty,

    #[error("{context}: {source}")]
    Pipeline {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl AnalysisError {
    pub fn pipeline(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AnalysisError::Pipeline {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Short machine-readable code for error payloads
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Configuration(_) => "CONFIGURATION_ERROR",
            AnalysisError::Decode(_) => "INVALID_IMAGE",
            AnalysisError::DetectionEmpty => "NO_ROOMS_DETECTED",
            AnalysisError::Pipeline { .. } => "PIPELINE_ERROR",
        }
    }
}

impl From<SegmentationError> for AnalysisError {
    fn from(err: SegmentationError) -> Self {
        match err {
            SegmentationError::RuntimeUnavailable(msg) | SegmentationError::InvalidConfig(msg) => {
                AnalysisError::Configuration(msg)
            }
            other => AnalysisError::pipeline("segmentation", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(AnalysisError::DetectionEmpty.code(), "NO_ROOMS_DETECTED");
        let err = AnalysisError::pipeline("writing gbXML", std::io::Error::other("disk full"));
        assert_eq!(err.code(), "PIPELINE_ERROR");
        assert_eq!(err.to_string(), "writing gbXML: disk full");
    }

    #[test]
    fn test_segmentation_errors_map_to_kinds() {
        let err: AnalysisError = SegmentationError::RuntimeUnavailable("no candle".into()).into();
        assert!(matches!(err, AnalysisError::Configuration(_)));
        let err: AnalysisError = SegmentationError::Inference("nan".into()).into();
        assert!(matches!(err, AnalysisError::Pipeline { .. }));
    }
}
