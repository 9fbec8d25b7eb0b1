//! End-to-end analysis of one floor-plan image.

use crate::capabilities::Capabilities;
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::export;
use crate::hybrid::ClassicalHybridDetector;
use crate::orchestrator::{DetectionMetadata, DetectionMethod, DetectorOrchestrator, PrimarySource};
use crate::preview::render_preview;
use crate::projector::{project_rooms, ProjectedRoom};
use crate::scale::{ExtentScaleCalibrator, ScaleCalibrator, ScaleEstimate};
use room_segmentation::{ModelCache, PixelRoomRect};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One image plus the per-request overrides
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub image_bytes: Vec<u8>,
    /// Skip scale detection and use this value
    pub pixels_per_metre: Option<f64>,
    pub floor_height: Option<f64>,
    pub enhanced_segmentation: Option<bool>,
    pub building_name: Option<String>,
}

impl AnalysisRequest {
    pub fn new(image_bytes: Vec<u8>) -> Self {
        Self {
            image_bytes,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub input: PathBuf,
    pub gbxml: PathBuf,
    pub obj: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PathBuf>,
    pub result: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub job_id: String,
    pub status: String,
    pub created_at: String,
    pub processing_time_sec: f64,
    pub method: DetectionMethod,
    pub scale: ScaleEstimate,
    pub image_size: ImageSize,
    pub rooms_detected: usize,
    pub total_area_m2: f64,
    pub floor_height_m: f64,
    pub rooms: Vec<ProjectedRoom>,
    pub pixel_rooms: Vec<PixelRoomRect>,
    pub files: ArtifactPaths,
    pub detection: DetectionMetadata,
}

/// Shared entry point; safe to call from several threads at once
pub struct FloorplanAnalyzer {
    config: AnalyzerConfig,
    orchestrator: DetectorOrchestrator,
    calibrator: Box<dyn ScaleCalibrator>,
}

impl FloorplanAnalyzer {
    /// Analyzer with the cached segmentation model and the classical fallback
    pub fn new(config: AnalyzerConfig, cache: Arc<ModelCache>, capabilities: Capabilities) -> Result<Self> {
        config.validate()?;
        let orchestrator = DetectorOrchestrator::new(
            PrimarySource::Cached {
                cache,
                model: config.model.clone(),
            },
            Arc::new(ClassicalHybridDetector::new(config.hybrid.clone())),
            capabilities,
            config.min_room_area,
        );
        let calibrator = Box::new(ExtentScaleCalibrator::new(config.assumed_plan_extent_m));
        Ok(Self {
            config,
            orchestrator,
            calibrator,
        })
    }

    pub fn with_components(
        config: AnalyzerConfig,
        orchestrator: DetectorOrchestrator,
        calibrator: Box<dyn ScaleCalibrator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            orchestrator,
            calibrator,
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.orchestrator.capabilities()
    }

    /// Decode, detect, project and export; artifacts go to a fresh job directory
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let start = Instant::now();
        let floor_height = request.floor_height.unwrap_or(self.config.floor_height);
        let enhanced = request
            .enhanced_segmentation
            .unwrap_or(self.config.enhanced_segmentation);
        let building_name = request.building_name.as_deref().unwrap_or("Building");

        if !(floor_height.is_finite() && floor_height > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "floor_height must be positive, got {floor_height}"
            )));
        }
        if let Some(ppm) = request.pixels_per_metre {
            if !(ppm.is_finite() && ppm > 0.0) {
                return Err(AnalysisError::Configuration(format!(
                    "pixels_per_metre must be a positive number, got {ppm}"
                )));
            }
        }

        let job_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let job_dir = self.config.output_dir.join(&job_id);
        std::fs::create_dir_all(&job_dir)
            .map_err(|e| AnalysisError::pipeline(format!("creating {}", job_dir.display()), e))?;
        info!("Analysis {} started ({} bytes)", job_id, request.image_bytes.len());

        let decoded = image::load_from_memory(&request.image_bytes)?;
        let rgb = decoded.to_rgb8();
        let gray = decoded.to_luma8();
        let (width, height) = rgb.dimensions();

        let input_path = job_dir.join("input.png");
        save_image(&rgb, &input_path)?;

        let scale = match request.pixels_per_metre {
            Some(ppm) => ScaleEstimate::user_provided(ppm),
            None => ScaleEstimate::detected(self.calibrator.detect(&gray)),
        };
        info!(
            "Scale: {:.2} px/m ({}, confidence {})",
            scale.pixels_per_metre, scale.scale_text, scale.confidence
        );

        let detection = self
            .orchestrator
            .detect_rooms(&rgb, &gray, enhanced, Some(&job_dir))?;
        if detection.rooms.is_empty() {
            warn!("Analysis {}: no rooms detected", job_id);
            return Err(AnalysisError::DetectionEmpty);
        }

        let rooms = project_rooms(&detection.rooms, height, scale.pixels_per_metre)?;
        let metric: Vec<_> = rooms.iter().map(|r| r.metric).collect();
        let total_area: f64 = metric.iter().map(|r| r.area_m2).sum();

        let gbxml_path = job_dir.join("floorplan.xml");
        export::write_gbxml(&gbxml_path, &metric, floor_height, building_name)?;
        let obj_path = job_dir.join("floorplan.obj");
        export::write_obj(&obj_path, &metric, floor_height)?;

        let preview_path = if self.config.write_preview {
            let path = job_dir.join("preview.png");
            save_image(&render_preview(&rgb, &detection.rooms), &path)?;
            Some(path)
        } else {
            None
        };

        let result = AnalysisResult {
            job_id: job_id.clone(),
            status: "success".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            processing_time_sec: (start.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            method: detection.method_used,
            scale,
            image_size: ImageSize { width, height },
            rooms_detected: rooms.len(),
            total_area_m2: (total_area * 10.0).round() / 10.0,
            floor_height_m: floor_height,
            rooms,
            pixel_rooms: detection.rooms,
            files: ArtifactPaths {
                input: input_path,
                gbxml: gbxml_path,
                obj: obj_path,
                preview: preview_path,
                result: job_dir.join("result.json"),
            },
            detection: detection.metadata,
        };

        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| AnalysisError::pipeline("serialising result", e))?;
        std::fs::write(&result.files.result, json)
            .map_err(|e| AnalysisError::pipeline(format!("writing {}", result.files.result.display()), e))?;

        info!(
            "Analysis {} finished: {} rooms, {:.1} m² via {} in {:.2}s",
            job_id,
            result.rooms_detected,
            result.total_area_m2,
            result.method.as_str(),
            result.processing_time_sec
        );
        Ok(result)
    }
}

fn save_image(image: &image::RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| AnalysisError::pipeline(format!("writing {}", path.display()), e))
}
