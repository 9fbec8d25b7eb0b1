//! Secondary room detector used when segmentation finds nothing.
//!
//! The default implementation is classical: threshold the plan into free
//! space and ink, optionally seal small wall gaps, and take every enclosed
//! free-space component as a room.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;
use room_segmentation::{ClassLabel, PixelRoomRect};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info, warn};

/// Fallback detector interface
pub trait HybridDetector: Send + Sync {
    /// Detect rooms; rectangles use the same schema as the segmentation path.
    ///
    /// `debug_dir` may be `None`; implementations must not require it.
    fn detect(
        &self,
        image: &RgbImage,
        gray: &GrayImage,
        enhanced: bool,
        debug_dir: Option<&Path>,
    ) -> anyhow::Result<Vec<PixelRoomRect>>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Minimum component size in pixels
    #[serde(default = "default_min_area")]
    pub min_area: usize,
    /// Components larger than this share of the image are treated as background
    #[serde(default = "default_max_area_ratio")]
    pub max_area_ratio: f32,
    /// Thin elongated shapes above this aspect ratio are wall remnants
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f64,
    /// Erosion radius (px) applied to free space in enhanced mode
    #[serde(default = "default_gap_radius")]
    pub gap_radius: u8,
}

fn default_min_area() -> usize {
    500
}

fn default_max_area_ratio() -> f32 {
    0.3
}

fn default_max_aspect_ratio() -> f64 {
    15.0
}

fn default_gap_radius() -> u8 {
    2
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            min_area: default_min_area(),
            max_area_ratio: default_max_area_ratio(),
            max_aspect_ratio: default_max_aspect_ratio(),
            gap_radius: default_gap_radius(),
        }
    }
}

/// Threshold + connected-components detector
pub struct ClassicalHybridDetector {
    config: HybridConfig,
}

impl ClassicalHybridDetector {
    pub fn new(config: HybridConfig) -> Self {
        Self { config }
    }
}

impl Default for ClassicalHybridDetector {
    fn default() -> Self {
        Self::new(HybridConfig::default())
    }
}

impl HybridDetector for ClassicalHybridDetector {
    fn detect(
        &self,
        _image: &RgbImage,
        gray: &GrayImage,
        enhanced: bool,
        debug_dir: Option<&Path>,
    ) -> anyhow::Result<Vec<PixelRoomRect>> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let level = otsu_level(gray);
        let mut free_space = threshold_image(gray, level);
        let grow = if enhanced && self.config.gap_radius > 0 {
            free_space = erode(&free_space, Norm::LInf, self.config.gap_radius);
            self.config.gap_radius as u32
        } else {
            0
        };

        if let Some(dir) = debug_dir {
            let path = dir.join("hybrid_binary.png");
            if let Err(e) = free_space.save(&path) {
                warn!("Failed to write debug image {}: {}", path.display(), e);
            }
        }

        let max_area = (width as f32 * height as f32 * self.config.max_area_ratio) as usize;
        let components = find_enclosed_components(&free_space);
        debug!("Hybrid detector: otsu level {}, {} enclosed components", level, components.len());

        let mut rooms: Vec<(usize, PixelRoomRect)> = components
            .into_iter()
            .filter(|c| c.area >= self.config.min_area && c.area < max_area)
            .filter(|c| c.aspect_ratio() < self.config.max_aspect_ratio)
            .map(|c| (c.area, c.to_rect(grow, width, height)))
            .collect();

        // Largest first keeps the output stable between runs
        rooms.sort_by(|a, b| b.0.cmp(&a.0).then((a.1.y, a.1.x).cmp(&(b.1.y, b.1.x))));

        info!("Hybrid detector found {} rooms (enhanced={})", rooms.len(), enhanced);
        Ok(rooms.into_iter().map(|(_, rect)| rect).collect())
    }

    fn name(&self) -> &str {
        "classical_cv"
    }
}

/// Free space (brighter than `threshold`) becomes 255, ink becomes 0
fn threshold_image(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let val = if pixel[0] > threshold { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([val]));
    }
    binary
}

#[derive(Debug, Clone, Copy)]
struct Component {
    area: usize,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Component {
    fn aspect_ratio(&self) -> f64 {
        let w = (self.max_x - self.min_x + 1) as f64;
        let h = (self.max_y - self.min_y + 1) as f64;
        w.max(h) / w.min(h)
    }

    /// Bounding box grown by `grow` px to undo erosion, clipped to the image
    fn to_rect(self, grow: u32, width: u32, height: u32) -> PixelRoomRect {
        let x0 = self.min_x.saturating_sub(grow);
        let y0 = self.min_y.saturating_sub(grow);
        let x1 = (self.max_x + grow).min(width - 1);
        let y1 = (self.max_y + grow).min(height - 1);
        PixelRoomRect {
            x: x0,
            y: y0,
            w: x1 - x0 + 1,
            h: y1 - y0 + 1,
            class_name: ClassLabel::Other,
        }
    }
}

/// 4-connected white components that do not touch the image border
fn find_enclosed_components(img: &GrayImage) -> Vec<Component> {
    let (width, height) = img.dimensions();
    let mut visited = vec![false; width as usize * height as usize];
    let mut components = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = (y as usize * width as usize) + x as usize;
            if img.get_pixel(x, y)[0] == 255 && !visited[idx] {
                let (component, touches_border) = flood_fill(img, x, y, &mut visited);
                if !touches_border {
                    components.push(component);
                }
            }
        }
    }
    components
}

fn flood_fill(img: &GrayImage, start_x: u32, start_y: u32, visited: &mut [bool]) -> (Component, bool) {
    let (width, height) = img.dimensions();
    let mut queue = VecDeque::new();
    let mut component = Component {
        area: 0,
        min_x: start_x,
        min_y: start_y,
        max_x: start_x,
        max_y: start_y,
    };
    let mut touches_border = false;

    queue.push_back((start_x, start_y));
    visited[(start_y as usize * width as usize) + start_x as usize] = true;

    while let Some((x, y)) = queue.pop_front() {
        component.area += 1;
        component.min_x = component.min_x.min(x);
        component.min_y = component.min_y.min(y);
        component.max_x = component.max_x.max(x);
        component.max_y = component.max_y.max(y);
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            touches_border = true;
        }

        // 4-connectivity so diagonal gaps in walls do not merge rooms
        for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0 && nx < width as i32 && ny >= 0 && ny < height as i32 {
                let px = nx as u32;
                let py = ny as u32;
                let nidx = (py as usize * width as usize) + px as usize;
                if !visited[nidx] && img.get_pixel(px, py)[0] == 255 {
                    visited[nidx] = true;
                    queue.push_back((px, py));
                }
            }
        }
    }

    (component, touches_border)
}
