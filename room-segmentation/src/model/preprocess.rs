use image::imageops::{self, FilterType};
use image::RgbImage;

/// Per-channel statistics of the ImageNet-pretrained encoder (RGB order)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize to `size`x`size` (aspect ratio is not preserved), scale to [0, 1]
/// and normalise each channel. Returns planar CHW data in RGB order.
pub fn to_model_input(image: &RgbImage, size: u32) -> Vec<f32> {
    let resized = if image.dimensions() == (size, size) {
        image.clone()
    } else {
        imageops::resize(image, size, size, FilterType::Triangle)
    };

    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_is_planar_and_normalised() {
        let image = RgbImage::from_pixel(20, 10, Rgb([255, 0, 128]));
        let data = to_model_input(&image, 32);

        assert_eq!(data.len(), 3 * 32 * 32);
        let plane = 32 * 32;
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((data[0] - red).abs() < 1e-5);
        assert!((data[plane + 17] - green).abs() < 1e-5);
        let blue = (128.0 / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((data[2 * plane + plane - 1] - blue).abs() < 1e-5);
    }
}
