use crate::capabilities::Capabilities;
use crate::error::{AnalysisError, Result};
use crate::hybrid::HybridDetector;
use image::{GrayImage, RgbImage};
use room_segmentation::{extract_rooms, ModelCache, ModelConfig, PixelRoomRect, Segmenter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where the primary strategy gets its segmenter from
pub enum PrimarySource {
    /// Model built on demand through the shared cache
    Cached {
        cache: Arc<ModelCache>,
        model: ModelConfig,
    },
    /// Prebuilt segmenter, e.g. a fixed mask in tests
    Fixed(Arc<dyn Segmenter>),
}

impl PrimarySource {
    fn resolve(&self) -> room_segmentation::Result<Arc<dyn Segmenter>> {
        match self {
            PrimarySource::Cached { cache, model } => {
                let model = cache.get_or_create(model)?;
                Ok(model as Arc<dyn Segmenter>)
            }
            PrimarySource::Fixed(segmenter) => Ok(Arc::clone(segmenter)),
        }
    }
}

/// What the segmentation strategy produced
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryOutcome {
    RoomsFound(Vec<PixelRoomRect>),
    NoRooms,
    /// Capability missing or runtime failure; the reason is kept for metadata
    Unrecoverable(String),
}

impl PrimaryOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            PrimaryOutcome::RoomsFound(_) => "rooms_found",
            PrimaryOutcome::NoRooms => "no_rooms",
            PrimaryOutcome::Unrecoverable(_) => "unrecoverable",
        }
    }
}

/// Decision taken on a [`PrimaryOutcome`]
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackDecision {
    UsePrimary(Vec<PixelRoomRect>),
    RunHybrid,
}

/// The hybrid detector runs exactly when the primary found nothing usable
pub fn select_fallback(outcome: PrimaryOutcome) -> FallbackDecision {
    match outcome {
        PrimaryOutcome::RoomsFound(rooms) if !rooms.is_empty() => FallbackDecision::UsePrimary(rooms),
        _ => FallbackDecision::RunHybrid,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Segmentation,
    Hybrid,
    None,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Segmentation => "segmentation",
            DetectionMethod::Hybrid => "hybrid",
            DetectionMethod::None => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub rooms: Vec<PixelRoomRect>,
    pub method_used: DetectionMethod,
    pub execution_time_ms: u128,
    pub metadata: DetectionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMetadata {
    pub primary_outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_error: Option<String>,
    pub segmentation_rooms: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_rooms: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<String>,
    pub total_execution_time_ms: u128,
    pub method_timings: Vec<(String, u128)>,
}

/// Runs segmentation first and the hybrid detector when it comes up empty
pub struct DetectorOrchestrator {
    primary: PrimarySource,
    hybrid: Arc<dyn HybridDetector>,
    capabilities: Capabilities,
    min_room_area: f64,
}

impl DetectorOrchestrator {
    pub fn new(
        primary: PrimarySource,
        hybrid: Arc<dyn HybridDetector>,
        capabilities: Capabilities,
        min_room_area: f64,
    ) -> Self {
        Self {
            primary,
            hybrid,
            capabilities,
            min_room_area,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Detect rooms on one image.
    ///
    /// Primary failures are absorbed; hybrid failures propagate.
    pub fn detect_rooms(
        &self,
        image: &RgbImage,
        gray: &GrayImage,
        enhanced: bool,
        debug_dir: Option<&Path>,
    ) -> Result<DetectionResult> {
        let start = Instant::now();
        let mut method_timings = Vec::new();

        let (outcome, model_info) = self.run_primary(image, &mut method_timings);
        let primary_outcome = outcome.tag().to_string();
        let primary_error = match &outcome {
            PrimaryOutcome::Unrecoverable(reason) => Some(reason.clone()),
            _ => None,
        };

        let (rooms, method_used, segmentation_rooms, hybrid_rooms) = match select_fallback(outcome) {
            FallbackDecision::UsePrimary(rooms) => {
                let count = rooms.len();
                (rooms, DetectionMethod::Segmentation, count, None)
            }
            FallbackDecision::RunHybrid => {
                warn!(
                    "Segmentation produced no rooms ({}), falling back to {}",
                    primary_outcome,
                    self.hybrid.name()
                );
                let hybrid_start = Instant::now();
                let rooms = self
                    .hybrid
                    .detect(image, gray, enhanced, debug_dir)
                    .map_err(|e| AnalysisError::pipeline("hybrid detection", e))?;
                method_timings.push(("hybrid".to_string(), hybrid_start.elapsed().as_millis()));

                let method = if rooms.is_empty() {
                    DetectionMethod::None
                } else {
                    DetectionMethod::Hybrid
                };
                let count = rooms.len();
                (rooms, method, 0, Some(count))
            }
        };

        let elapsed = start.elapsed().as_millis();
        info!(
            "Detection finished: {} rooms via {} in {}ms",
            rooms.len(),
            method_used.as_str(),
            elapsed
        );

        Ok(DetectionResult {
            rooms,
            method_used,
            execution_time_ms: elapsed,
            metadata: DetectionMetadata {
                primary_outcome,
                primary_error,
                segmentation_rooms,
                hybrid_rooms,
                model_info,
                total_execution_time_ms: elapsed,
                method_timings,
            },
        })
    }

    fn run_primary(&self, image: &RgbImage, timings: &mut Vec<(String, u128)>) -> (PrimaryOutcome, Option<String>) {
        if !self.capabilities.segmentation {
            return (
                PrimaryOutcome::Unrecoverable("segmentation capability unavailable".to_string()),
                None,
            );
        }

        let start = Instant::now();
        let segmenter = match self.primary.resolve() {
            Ok(segmenter) => segmenter,
            Err(e) => {
                warn!("Segmentation model unavailable: {}", e);
                return (PrimaryOutcome::Unrecoverable(e.to_string()), None);
            }
        };
        let model_info = Some(segmenter.model_info());

        let mask = match segmenter.predict(image) {
            Ok(mask) => mask,
            Err(e) => {
                warn!("Segmentation failed: {}", e);
                timings.push(("segmentation".to_string(), start.elapsed().as_millis()));
                return (PrimaryOutcome::Unrecoverable(e.to_string()), model_info);
            }
        };
        let rooms = extract_rooms(&mask, self.min_room_area);

        let elapsed = start.elapsed().as_millis();
        timings.push(("segmentation".to_string(), elapsed));
        info!("Segmentation found {} rooms in {}ms", rooms.len(), elapsed);

        let outcome = if rooms.is_empty() {
            PrimaryOutcome::NoRooms
        } else {
            PrimaryOutcome::RoomsFound(rooms)
        };
        (outcome, model_info)
    }
}
