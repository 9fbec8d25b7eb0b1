//! Pixel to metric conversion.
//!
//! Image space has its origin top-left with y pointing down; metric space
//! has its origin bottom-left with y pointing up.

use crate::error::{AnalysisError, Result};
use room_segmentation::{ClassLabel, PixelRoomRect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room rectangle in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRoomRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub area_m2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceType {
    Corridor,
    Circulation,
    Room,
}

impl SpaceType {
    /// Elongation heuristic: aspect above 5 is a corridor, above 3 circulation
    pub fn classify(width: f64, height: f64) -> Self {
        let aspect = width.max(height) / width.min(height).max(0.1);
        if aspect > 5.0 {
            SpaceType::Corridor
        } else if aspect > 3.0 {
            SpaceType::Circulation
        } else {
            SpaceType::Room
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceType::Corridor => "Corridor",
            SpaceType::Circulation => "Circulation",
            SpaceType::Room => "Room",
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRoom {
    pub class_name: ClassLabel,
    #[serde(flatten)]
    pub metric: MetricRoomRect,
    pub space_type: SpaceType,
}

fn check_ppm(ppm: f64) -> Result<()> {
    if ppm.is_finite() && ppm > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::Configuration(format!(
            "pixels_per_metre must be a positive number, got {ppm}"
        )))
    }
}

pub fn project(rect: &PixelRoomRect, image_height: u32, ppm: f64) -> Result<MetricRoomRect> {
    check_ppm(ppm)?;
    let width = rect.w as f64 / ppm;
    let height = rect.h as f64 / ppm;
    Ok(MetricRoomRect {
        x: rect.x as f64 / ppm,
        y: (image_height as f64 - rect.y as f64 - rect.h as f64) / ppm,
        width,
        height,
        area_m2: width * height,
    })
}

/// Inverse of [`project`], rounding to the nearest pixel
pub fn unproject(metric: &MetricRoomRect, image_height: u32, ppm: f64, class_name: ClassLabel) -> Result<PixelRoomRect> {
    check_ppm(ppm)?;
    let w = (metric.width * ppm).round();
    let h = (metric.height * ppm).round();
    let x = (metric.x * ppm).round();
    let y = (image_height as f64 - metric.y * ppm - h).round();
    if x < 0.0 || y < 0.0 || w <= 0.0 || h <= 0.0 {
        return Err(AnalysisError::Configuration(format!(
            "metric rectangle {metric:?} falls outside a {image_height} px high image"
        )));
    }
    Ok(PixelRoomRect {
        x: x as u32,
        y: y as u32,
        w: w as u32,
        h: h as u32,
        class_name,
    })
}

/// Project every room and attach its space type
pub fn project_rooms(rooms: &[PixelRoomRect], image_height: u32, ppm: f64) -> Result<Vec<ProjectedRoom>> {
    rooms
        .iter()
        .map(|rect| {
            let metric = project(rect, image_height, ppm)?;
            Ok(ProjectedRoom {
                class_name: rect.class_name,
                space_type: SpaceType::classify(metric.width, metric.height),
                metric,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, w: u32, h: u32) -> PixelRoomRect {
        PixelRoomRect {
            x,
            y,
            w,
            h,
            class_name: ClassLabel::Bedroom,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_project_flips_y() {
        let metric = project(&rect(100, 50, 80, 40), 600, 100.0).unwrap();

        assert!(close(metric.x, 1.0));
        assert!(close(metric.y, 5.1));
        assert!(close(metric.width, 0.8));
        assert!(close(metric.height, 0.4));
        assert!(close(metric.area_m2, 0.32));
    }

    #[test]
    fn test_round_trip() {
        let original = rect(37, 211, 154, 89);
        for ppm in [1.0, 42.5, 137.0] {
            let metric = project(&original, 480, ppm).unwrap();
            let back = unproject(&metric, 480, ppm, ClassLabel::Bedroom).unwrap();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn test_rejects_bad_scale() {
        for ppm in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                project(&rect(0, 0, 10, 10), 100, ppm),
                Err(AnalysisError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_space_type() {
        assert_eq!(SpaceType::classify(1.0, 6.0), SpaceType::Corridor);
        assert_eq!(SpaceType::classify(1.0, 4.0), SpaceType::Circulation);
        assert_eq!(SpaceType::classify(2.0, 2.0), SpaceType::Room);
        assert_eq!(SpaceType::classify(1.0, 5.0), SpaceType::Circulation);
        assert_eq!(SpaceType::classify(1.0, 3.0), SpaceType::Room);
        // Tiny sides are clamped to 0.1 m
        assert_eq!(SpaceType::classify(0.01, 0.3), SpaceType::Room);
    }

    #[test]
    fn test_project_rooms_keeps_labels() {
        let rooms = [rect(0, 0, 100, 600), rect(0, 0, 200, 200)];
        let projected = project_rooms(&rooms, 600, 100.0).unwrap();

        assert_eq!(projected[0].space_type, SpaceType::Corridor);
        assert_eq!(projected[1].space_type, SpaceType::Room);
        assert!(projected.iter().all(|r| r.class_name == ClassLabel::Bedroom));
    }
}
