//! Segmenter interface used by the detection pipeline
//!
//! Lets the orchestrator run against the real network or against a fixed mask
//! in tests.

use crate::error::Result;
use crate::mask::SegmentationMask;
use image::RgbImage;

/// Dense per-pixel classifier for floor plans
pub trait Segmenter: Send + Sync {
    /// Classify every pixel; the mask has the same dimensions as `image`
    fn predict(&self, image: &RgbImage) -> Result<SegmentationMask>;

    /// Get model info
    fn model_info(&self) -> String;
}

/// Segmenter that returns a prepared mask, resized to the requested image
pub struct StaticSegmenter {
    mask: SegmentationMask,
}

impl StaticSegmenter {
    pub fn new(mask: SegmentationMask) -> Self {
        Self { mask }
    }
}

impl Segmenter for StaticSegmenter {
    fn predict(&self, image: &RgbImage) -> Result<SegmentationMask> {
        Ok(self.mask.resize_nearest(image.width(), image.height()))
    }

    fn model_info(&self) -> String {
        format!("Static mask ({}x{})", self.mask.width(), self.mask.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_label::ClassLabel;

    #[test]
    fn test_static_segmenter_matches_image_size() {
        let mut mask = SegmentationMask::filled(10, 10, ClassLabel::Background);
        mask.fill_rect(0, 0, 5, 10, ClassLabel::Kitchen);
        let segmenter = StaticSegmenter::new(mask);

        let image = RgbImage::new(40, 20);
        let predicted = segmenter.predict(&image).unwrap();

        assert_eq!(predicted.dimensions(), (40, 20));
        assert_eq!(predicted.get(0, 0), ClassLabel::Kitchen);
        assert_eq!(predicted.get(39, 19), ClassLabel::Background);
    }
}
