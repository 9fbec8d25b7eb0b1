//! Pixels-per-metre calibration.
//!
//! Scale-bar reading lives behind [`ScaleCalibrator`]; the bundled
//! [`ExtentScaleCalibrator`] only assumes a typical plan extent.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Supplied by the caller, not measured
    User,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::User => "user",
        };
        f.write_str(s)
    }
}

/// Raw calibrator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDetection {
    pub pixels_per_metre: f64,
    /// Human-readable description of what was detected
    pub scale_text: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSource {
    Detected,
    UserProvided,
}

/// Scale actually used for an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleEstimate {
    pub pixels_per_metre: f64,
    pub source: ScaleSource,
    pub scale_text: String,
    pub confidence: Confidence,
}

impl ScaleEstimate {
    pub fn user_provided(pixels_per_metre: f64) -> Self {
        Self {
            pixels_per_metre,
            source: ScaleSource::UserProvided,
            scale_text: "user_provided".to_string(),
            confidence: Confidence::User,
        }
    }

    pub fn detected(detection: ScaleDetection) -> Self {
        Self {
            pixels_per_metre: detection.pixels_per_metre,
            source: ScaleSource::Detected,
            scale_text: detection.scale_text,
            confidence: detection.confidence,
        }
    }
}

/// Estimates pixels-per-metre from a grayscale plan
pub trait ScaleCalibrator: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> ScaleDetection;
}

/// Assumes the longer image side spans a fixed number of metres
pub struct ExtentScaleCalibrator {
    assumed_extent_m: f64,
}

impl ExtentScaleCalibrator {
    pub fn new(assumed_extent_m: f64) -> Self {
        Self { assumed_extent_m }
    }
}

impl ScaleCalibrator for ExtentScaleCalibrator {
    fn detect(&self, gray: &GrayImage) -> ScaleDetection {
        let longest = gray.width().max(gray.height()).max(1) as f64;
        let ppm = longest / self.assumed_extent_m;
        debug!("Scale heuristic: {} px over {} m -> {:.2} px/m", longest, self.assumed_extent_m, ppm);
        ScaleDetection {
            pixels_per_metre: ppm,
            scale_text: format!("assumed {} m plan extent", self.assumed_extent_m),
            confidence: Confidence::Low,
        }
    }
}
