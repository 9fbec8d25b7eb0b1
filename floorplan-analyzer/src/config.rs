use crate::error::{AnalysisError, Result};
use crate::hybrid::HybridConfig;
use room_segmentation::{DevicePreference, ModelConfig, DEFAULT_MIN_AREA};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Settings for the whole analysis pipeline.
///
/// Layered as defaults, then an optional JSON file, then `FLOORPLAN_*`
/// environment variables; the CLI applies its flags last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub model: ModelConfig,
    /// Minimum enclosed area (px²) for a segmented region to become a room
    #[serde(default = "default_min_room_area")]
    pub min_room_area: f64,
    /// Extrusion height (m) used when a request does not give one
    #[serde(default = "default_floor_height")]
    pub floor_height: f64,
    #[serde(default = "default_enhanced")]
    pub enhanced_segmentation: bool,
    /// Parent directory of the per-job artifact directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Plan extent (m) the scale heuristic assumes for the longer image side
    #[serde(default = "default_assumed_plan_extent")]
    pub assumed_plan_extent_m: f64,
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default = "default_write_preview")]
    pub write_preview: bool,
}

fn default_min_room_area() -> f64 {
    DEFAULT_MIN_AREA
}

fn default_floor_height() -> f64 {
    3.0
}

fn default_enhanced() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("floorplan-results")
}

fn default_assumed_plan_extent() -> f64 {
    20.0
}

fn default_write_preview() -> bool {
    true
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            min_room_area: default_min_room_area(),
            floor_height: default_floor_height(),
            enhanced_segmentation: default_enhanced(),
            output_dir: default_output_dir(),
            assumed_plan_extent_m: default_assumed_plan_extent(),
            hybrid: HybridConfig::default(),
            write_preview: default_write_preview(),
        }
    }
}

impl AnalyzerConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| AnalysisError::Configuration(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Overlay `FLOORPLAN_*` variables read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FLOORPLAN_MODEL_PATH") {
            self.model.weights_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("FLOORPLAN_IMAGE_SIZE") {
            match raw.parse() {
                Ok(size) => self.model.image_size = size,
                Err(_) => warn!("Ignoring FLOORPLAN_IMAGE_SIZE={}: not an integer", raw),
            }
        }
        if let Some(raw) = lookup("FLOORPLAN_DEVICE") {
            match raw.parse::<DevicePreference>() {
                Ok(device) => self.model.device = device,
                Err(e) => warn!("Ignoring FLOORPLAN_DEVICE: {}", e),
            }
        }
        if let Some(raw) = lookup("FLOORPLAN_MIN_AREA") {
            match raw.parse() {
                Ok(area) => self.min_room_area = area,
                Err(_) => warn!("Ignoring FLOORPLAN_MIN_AREA={}: not a number", raw),
            }
        }
        if let Some(dir) = lookup("FLOORPLAN_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if !(self.min_room_area.is_finite() && self.min_room_area >= 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "min_room_area must be a non-negative number, got {}",
                self.min_room_area
            )));
        }
        if !(self.floor_height.is_finite() && self.floor_height > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "floor_height must be positive, got {}",
                self.floor_height
            )));
        }
        if !(self.assumed_plan_extent_m.is_finite() && self.assumed_plan_extent_m > 0.0) {
            return Err(AnalysisError::Configuration(format!(
                "assumed_plan_extent_m must be positive, got {}",
                self.assumed_plan_extent_m
            )));
        }
        Ok(())
    }
}
