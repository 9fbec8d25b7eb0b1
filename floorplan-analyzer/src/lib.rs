//! Floor-plan analysis: room detection with a segmentation-first,
//! classical-fallback strategy, metric projection and gbXML/OBJ export.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod export;
pub mod hybrid;
pub mod orchestrator;
pub mod pipeline;
pub mod preview;
pub mod projector;
pub mod scale;

pub use capabilities::Capabilities;
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Result};
pub use hybrid::{ClassicalHybridDetector, HybridConfig, HybridDetector};
pub use orchestrator::{
    select_fallback, DetectionMetadata, DetectionMethod, DetectionResult, DetectorOrchestrator,
    FallbackDecision, PrimaryOutcome, PrimarySource,
};
pub use pipeline::{AnalysisRequest, AnalysisResult, ArtifactPaths, FloorplanAnalyzer, ImageSize};
pub use projector::{project, project_rooms, unproject, MetricRoomRect, ProjectedRoom, SpaceType};
pub use scale::{Confidence, ExtentScaleCalibrator, ScaleCalibrator, ScaleDetection, ScaleEstimate, ScaleSource};
