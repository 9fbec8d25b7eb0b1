//! Floor-plan segmentation model: preprocessing, network and postprocessing
//! behind a single `predict` entry point.

#[cfg(feature = "segmentation")]
mod network;
pub mod preprocess;

use crate::error::{Result, SegmentationError};
use crate::mask::SegmentationMask;
use crate::segmenter::Segmenter;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "segmentation")]
use tracing::{info, warn};

/// Weights looked up when no explicit path is configured
pub const DEFAULT_WEIGHTS_PATH: &str = "models/best_model.safetensors";

/// Square resolution the network runs at
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

/// Where inference should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA when compiled in and present, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            _ => Err(format!("unknown device: '{s}'")),
        }
    }
}

/// Everything needed to build one model instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Safetensors checkpoint; `None` means [`DEFAULT_WEIGHTS_PATH`]
    #[serde(default)]
    pub weights_path: Option<PathBuf>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub device: DevicePreference,
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: None,
            image_size: DEFAULT_IMAGE_SIZE,
            device: DevicePreference::Auto,
        }
    }
}

impl ModelConfig {
    pub fn resolved_weights_path(&self) -> PathBuf {
        self.weights_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS_PATH))
    }

    /// Identifier under which the model cache stores this configuration
    pub fn cache_key(&self) -> String {
        format!(
            "{}@{}/{}",
            self.resolved_weights_path().display(),
            self.image_size,
            self.device
        )
    }

    /// The encoder downsamples five times, so the input side must divide by 32
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 || self.image_size % 32 != 0 {
            return Err(SegmentationError::InvalidConfig(format!(
                "image size must be a positive multiple of 32, got {}",
                self.image_size
            )));
        }
        Ok(())
    }
}

/// Whether this build carries the tensor runtime at all
pub fn runtime_available() -> bool {
    cfg!(feature = "segmentation")
}

/// Trained (or randomly initialised) segmentation network placed on a device.
///
/// Weights are read-only after construction; one instance can serve
/// concurrent predictions.
pub struct SegmentationModel {
    #[cfg(feature = "segmentation")]
    network: network::FloorPlanUNet,
    #[cfg(feature = "segmentation")]
    device: candle_core::Device,
    image_size: u32,
    weights_path: PathBuf,
    weights_loaded: bool,
}

#[cfg(feature = "segmentation")]
impl SegmentationModel {
    /// Build the network, load weights if present and move it to the device.
    ///
    /// A missing weights file is not an error: the network keeps its random
    /// initialisation and a warning is logged.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        use candle_core::DType;
        use candle_nn::{VarBuilder, VarMap};

        config.validate()?;
        let device = select_device(config.device)?;

        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = network::FloorPlanUNet::new(crate::NUM_CLASSES, vb)?;

        let weights_path = config.resolved_weights_path();
        let weights_loaded = if weights_path.exists() {
            info!("Loading segmentation weights from {}", weights_path.display());
            varmap
                .load(&weights_path)
                .map_err(|e| SegmentationError::WeightLoad {
                    path: weights_path.clone(),
                    reason: e.to_string(),
                })?;
            true
        } else {
            warn!(
                "No segmentation weights at {}, running with random initialisation",
                weights_path.display()
            );
            false
        };

        info!(
            "Segmentation model initialised on {:?} at {}x{}",
            device, config.image_size, config.image_size
        );

        Ok(Self {
            network,
            device,
            image_size: config.image_size,
            weights_path,
            weights_loaded,
        })
    }

    /// Classify every pixel of `image`; the mask has the image's dimensions
    pub fn predict(&self, image: &RgbImage) -> Result<SegmentationMask> {
        use candle_core::{Module, Tensor};

        let (orig_w, orig_h) = image.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(SegmentationError::Inference("empty input image".to_string()));
        }

        let size = self.image_size as usize;
        let input = preprocess::to_model_input(image, self.image_size);
        let tensor = Tensor::from_vec(input, (1, 3, size, size), &self.device)?;

        let logits = self.network.forward(&tensor)?;
        let classes = logits.argmax(1)?.flatten_all()?.to_vec1::<u32>()?;
        let classes: Vec<u8> = classes.into_iter().map(|c| c as u8).collect();

        let low_res = SegmentationMask::from_raw(self.image_size, self.image_size, classes)?;
        Ok(low_res.resize_nearest(orig_w, orig_h))
    }
}

#[cfg(feature = "segmentation")]
fn select_device(preference: DevicePreference) -> Result<candle_core::Device> {
    use candle_core::Device;

    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => Device::cuda_if_available(0)
            .map_err(|e| SegmentationError::RuntimeUnavailable(format!("device probe failed: {e}"))),
        DevicePreference::Cuda => Device::new_cuda(0)
            .map_err(|e| SegmentationError::RuntimeUnavailable(format!("CUDA device unavailable: {e}"))),
    }
}

#[cfg(not(feature = "segmentation"))]
impl SegmentationModel {
    pub fn new(_config: &ModelConfig) -> Result<Self> {
        Err(SegmentationError::RuntimeUnavailable(
            "built without the `segmentation` feature".to_string(),
        ))
    }

    pub fn predict(&self, _image: &RgbImage) -> Result<SegmentationMask> {
        Err(SegmentationError::RuntimeUnavailable(
            "built without the `segmentation` feature".to_string(),
        ))
    }
}

impl SegmentationModel {
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    /// False when the network runs on random weights
    pub fn weights_loaded(&self) -> bool {
        self.weights_loaded
    }
}

impl Segmenter for SegmentationModel {
    fn predict(&self, image: &RgbImage) -> Result<SegmentationMask> {
        SegmentationModel::predict(self, image)
    }

    fn model_info(&self) -> String {
        format!(
            "ResNet34-UNet {}x{} (weights: {}{})",
            self.image_size,
            self.image_size,
            self.weights_path.display(),
            if self.weights_loaded { "" } else { ", not found" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(dir: &Path) -> ModelConfig {
        ModelConfig {
            weights_path: Some(dir.join("missing.safetensors")),
            image_size: 64,
            device: DevicePreference::Cpu,
        }
    }

    #[test]
    fn test_validate_rejects_unaligned_size() {
        let config = ModelConfig {
            image_size: 500,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SegmentationError::InvalidConfig(_))));
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_cache_key_distinguishes_configs() {
        let a = ModelConfig::default();
        let b = ModelConfig {
            image_size: 256,
            ..Default::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with(DEFAULT_WEIGHTS_PATH));
    }

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("CPU".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!("gpu".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[cfg(feature = "segmentation")]
    #[test]
    fn test_missing_weights_degrade_to_random_init() {
        let dir = tempfile::tempdir().unwrap();
        let model = SegmentationModel::new(&small_config(dir.path())).unwrap();

        assert!(!model.weights_loaded());
        assert!(model.model_info().contains("not found"));
    }

    #[cfg(feature = "segmentation")]
    #[test]
    fn test_predict_returns_original_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let model = SegmentationModel::new(&small_config(dir.path())).unwrap();
        let image = RgbImage::from_fn(90, 50, |x, y| image::Rgb([(x * 2) as u8, (y * 4) as u8, 200]));

        let mask = model.predict(&image).unwrap();

        assert_eq!(mask.dimensions(), (90, 50));
        assert!(mask.as_raw().iter().all(|&v| (v as usize) < crate::NUM_CLASSES));
    }

    #[cfg(feature = "segmentation")]
    #[test]
    fn test_cached_model_predicts_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let cache = crate::ModelCache::new();
        let image = RgbImage::from_fn(70, 70, |x, y| image::Rgb([(x ^ y) as u8, x as u8, y as u8]));

        let first_model = cache.get_or_create(&config).unwrap();
        let second_model = cache.get_or_create(&config).unwrap();
        let first = first_model.predict(&image).unwrap();
        let second = second_model.predict(&image).unwrap();

        assert!(std::sync::Arc::ptr_eq(&first_model, &second_model));
        assert_eq!(first, second);
    }

    #[cfg(feature = "segmentation")]
    #[test]
    fn test_corrupt_weights_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.safetensors");
        std::fs::write(&path, b"not a safetensors file").unwrap();
        let config = ModelConfig {
            weights_path: Some(path),
            ..small_config(dir.path())
        };

        let err = SegmentationModel::new(&config).err().unwrap();
        assert!(matches!(err, SegmentationError::WeightLoad { .. }));
    }

    #[cfg(not(feature = "segmentation"))]
    #[test]
    fn test_missing_runtime_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = SegmentationModel::new(&small_config(dir.path())).err().unwrap();
        assert!(matches!(err, SegmentationError::RuntimeUnavailable(_)));
        assert!(!runtime_available());
    }
}
