use crate::class_label::{ClassLabel, NUM_CLASSES};
use crate::error::{Result, SegmentationError};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

/// Per-pixel class indices for one image.
///
/// Every stored value is a valid class index (`< NUM_CLASSES`).
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    classes: GrayImage,
}

impl SegmentationMask {
    /// Build a mask from row-major class indices
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if let Some(bad) = data.iter().find(|&&v| v as usize >= NUM_CLASSES) {
            return Err(SegmentationError::InvalidMask(format!(
                "class index {} out of range (max {})",
                bad,
                NUM_CLASSES - 1
            )));
        }
        let expected = width as usize * height as usize;
        let actual = data.len();
        let classes = GrayImage::from_raw(width, height, data).ok_or_else(|| {
            SegmentationError::InvalidMask(format!(
                "expected {} values for {}x{}, got {}",
                expected, width, height, actual
            ))
        })?;
        Ok(Self { classes })
    }

    /// Mask with every pixel set to `label`
    pub fn filled(width: u32, height: u32, label: ClassLabel) -> Self {
        Self {
            classes: GrayImage::from_pixel(width, height, Luma([label.index()])),
        }
    }

    pub fn width(&self) -> u32 {
        self.classes.width()
    }

    pub fn height(&self) -> u32 {
        self.classes.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.classes.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> ClassLabel {
        ClassLabel::from_index_lossy(self.classes.get_pixel(x, y)[0])
    }

    pub fn set(&mut self, x: u32, y: u32, label: ClassLabel) {
        self.classes.put_pixel(x, y, Luma([label.index()]));
    }

    /// Paint an axis-aligned rectangle, clipped to the mask
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, label: ClassLabel) {
        let x_end = x.saturating_add(w).min(self.width());
        let y_end = y.saturating_add(h).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.set(px, py, label);
            }
        }
    }

    /// Binary image with 255 where the pixel equals `label`, 0 elsewhere
    pub fn binary_for(&self, label: ClassLabel) -> GrayImage {
        let target = label.index();
        let (width, height) = self.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            if self.classes.get_pixel(x, y)[0] == target {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    /// Number of pixels carrying `label`
    pub fn count(&self, label: ClassLabel) -> usize {
        let target = label.index();
        self.classes.pixels().filter(|p| p[0] == target).count()
    }

    /// Resize with nearest-neighbour sampling so class indices are never blended
    pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self {
            classes: imageops::resize(&self.classes, width, height, FilterType::Nearest),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        self.classes.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_out_of_range_index() {
        let err = SegmentationMask::from_raw(2, 1, vec![3, 11]).unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidMask(_)));
    }

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        assert!(SegmentationMask::from_raw(2, 2, vec![0, 1, 2]).is_err());
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut mask = SegmentationMask::filled(10, 10, ClassLabel::Background);
        mask.fill_rect(8, 8, 5, 5, ClassLabel::Kitchen);
        assert_eq!(mask.count(ClassLabel::Kitchen), 4);
        assert_eq!(mask.get(9, 9), ClassLabel::Kitchen);
    }

    #[test]
    fn test_nearest_resize_never_invents_classes() {
        let mut mask = SegmentationMask::filled(8, 8, ClassLabel::Background);
        mask.fill_rect(0, 0, 4, 8, ClassLabel::Bedroom);
        mask.fill_rect(4, 0, 4, 8, ClassLabel::Garage);

        let resized = mask.resize_nearest(37, 23);
        assert_eq!(resized.dimensions(), (37, 23));
        for &v in resized.as_raw() {
            assert!(v == ClassLabel::Bedroom.index() || v == ClassLabel::Garage.index());
        }
    }
}
