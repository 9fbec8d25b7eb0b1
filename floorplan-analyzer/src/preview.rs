use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use room_segmentation::PixelRoomRect;
use tracing::warn;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_WIDTH: u32 = 2;
const LABEL_SCALE: f32 = 18.0;
/// Label offset from the room's top-left corner
const LABEL_OFFSET: u32 = 5;

const LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Copy of `image` with every detected room outlined in green and numbered `#1`, `#2`, ...
pub fn render_preview(image: &RgbImage, rooms: &[PixelRoomRect]) -> RgbImage {
    let mut preview = image.clone();
    let font = match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Preview font unusable, drawing outlines only: {}", e);
            None
        }
    };

    for (i, room) in rooms.iter().enumerate() {
        for inset in 0..OUTLINE_WIDTH {
            if room.w <= 2 * inset || room.h <= 2 * inset {
                break;
            }
            let rect = Rect::at((room.x + inset) as i32, (room.y + inset) as i32)
                .of_size(room.w - 2 * inset, room.h - 2 * inset);
            draw_hollow_rect_mut(&mut preview, rect, OUTLINE);
        }

        if let Some(font) = &font {
            draw_text_mut(
                &mut preview,
                OUTLINE,
                room.x.saturating_add(LABEL_OFFSET) as i32,
                room.y.saturating_add(LABEL_OFFSET) as i32,
                PxScale::from(LABEL_SCALE),
                font,
                &format!("#{}", i + 1),
            );
        }
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_segmentation::ClassLabel;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn room(x: u32, y: u32, w: u32, h: u32) -> PixelRoomRect {
        PixelRoomRect {
            x,
            y,
            w,
            h,
            class_name: ClassLabel::Kitchen,
        }
    }

    fn patch(image: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Vec<Rgb<u8>> {
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .map(|(x, y)| *image.get_pixel(x, y))
            .collect()
    }

    fn green_pixels(image: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        patch(image, x0, y0, x1, y1)
            .iter()
            .filter(|p| p[1] > p[0])
            .count()
    }

    #[test]
    fn test_outlines_rooms() {
        let image = RgbImage::from_pixel(100, 100, WHITE);

        let preview = render_preview(&image, &[room(10, 10, 60, 60)]);

        assert_eq!(*preview.get_pixel(10, 10), OUTLINE);
        assert_eq!(*preview.get_pixel(11, 40), OUTLINE);
        assert_eq!(*preview.get_pixel(69, 69), OUTLINE);
        assert_eq!(*preview.get_pixel(50, 50), WHITE);
        assert_eq!(*preview.get_pixel(5, 5), WHITE);
        assert_eq!(*preview.get_pixel(90, 90), WHITE);
    }

    #[test]
    fn test_rooms_are_numbered() {
        let image = RgbImage::from_pixel(200, 100, WHITE);
        let rooms = [room(10, 10, 80, 80), room(110, 10, 80, 80)];

        let preview = render_preview(&image, &rooms);

        // Label area sits inside the outline, clear of the 2 px border
        assert!(green_pixels(&preview, 13, 13, 45, 40) > 0);
        assert!(green_pixels(&preview, 113, 13, 145, 40) > 0);
        // Labels differ between rooms
        assert_ne!(patch(&preview, 13, 13, 45, 40), patch(&preview, 113, 13, 145, 40));
    }
}
