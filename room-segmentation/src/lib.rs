//! Per-pixel room segmentation for raster floor plans.
//!
//! [`SegmentationModel`] classifies every pixel into one of the
//! [`ClassLabel`] categories, [`extract_rooms`] turns the resulting
//! [`SegmentationMask`] into room rectangles, and [`ModelCache`] keeps one
//! loaded model per configuration for the lifetime of the process.

pub mod cache;
pub mod class_label;
pub mod error;
pub mod extractor;
pub mod mask;
pub mod model;
pub mod segmenter;

pub use cache::{ModelCache, PreloadReport};
pub use class_label::{ClassLabel, NUM_CLASSES};
pub use error::{Result, SegmentationError};
pub use extractor::{extract_rooms, PixelRoomRect, DEFAULT_MIN_AREA};
pub use mask::SegmentationMask;
pub use model::{runtime_available, DevicePreference, ModelConfig, SegmentationModel};
pub use segmenter::{Segmenter, StaticSegmenter};
