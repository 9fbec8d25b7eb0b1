use crate::class_label::ClassLabel;
use crate::mask::SegmentationMask;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest enclosed area (px²) a region needs to count as a room
pub const DEFAULT_MIN_AREA: f64 = 500.0;

/// Axis-aligned room rectangle in image space (origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRoomRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub class_name: ClassLabel,
}

/// Extract one rectangle per external connected region of every room class.
///
/// Background and wall are skipped. Regions whose enclosed area is below
/// `min_area` are dropped; the comparison is inclusive. Order of the result
/// is not meaningful.
pub fn extract_rooms(mask: &SegmentationMask, min_area: f64) -> Vec<PixelRoomRect> {
    let mut rooms = Vec::new();

    for label in ClassLabel::room_labels() {
        if mask.count(label) == 0 {
            continue;
        }

        let binary = with_background_frame(&mask.binary_for(label));
        let contours: Vec<Contour<u32>> = find_contours(&binary);

        for contour in contours.iter().filter(|c| is_external(c)) {
            let area = contour_area(&contour.points);
            if area < min_area {
                continue;
            }
            if let Some(rect) = bounding_rect(&contour.points, label) {
                // Undo the frame offset
                rooms.push(PixelRoomRect {
                    x: rect.x - 1,
                    y: rect.y - 1,
                    ..rect
                });
            }
        }
    }

    debug!("Extracted {} rooms from {}x{} mask", rooms.len(), mask.width(), mask.height());
    rooms
}

/// Copy of `binary` inside a 1 px background border.
///
/// Border following misclassifies regions that touch the left image edge;
/// with the frame every region is bounded by background.
fn with_background_frame(binary: &GrayImage) -> GrayImage {
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    image::imageops::replace(&mut framed, binary, 1, 1);
    framed
}

/// Outer borders not nested in a hole of another region
fn is_external(contour: &Contour<u32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Shoelace area of the polygon through the border pixel centres
pub fn contour_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (twice_area / 2.0).abs()
}

fn bounding_rect(points: &[Point<u32>], label: ClassLabel) -> Option<PixelRoomRect> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;

    Some(PixelRoomRect {
        x: min_x,
        y: min_y,
        w: max_x - min_x + 1,
        h: max_y - min_y + 1,
        class_name: label,
    })
}
