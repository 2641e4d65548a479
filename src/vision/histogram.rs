//! Quantized HSV color histograms.

use image::RgbImage;

use crate::vector::Vector;
use crate::vision::color::rgb_to_hsv;

pub const HUE_BINS: usize = 12;
pub const SATURATION_BINS: usize = 6;
pub const VALUE_BINS: usize = 6;
pub const HISTOGRAM_DIMENSION: usize = HUE_BINS * SATURATION_BINS * VALUE_BINS;

fn quantize(value: f32, bins: usize) -> usize {
    ((value * bins as f32) as usize).min(bins - 1)
}

/// L1-normalized 12x6x6 HSV histogram, flattened hue-major.
pub fn hsv_histogram(image: &RgbImage) -> Vector {
    let mut bins = vec![0.0f32; HISTOGRAM_DIMENSION];
    for pixel in image.pixels() {
        let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let hq = quantize(h / 360.0, HUE_BINS);
        let sq = quantize(s, SATURATION_BINS);
        let vq = quantize(v, VALUE_BINS);
        bins[(hq * SATURATION_BINS + sq) * VALUE_BINS + vq] += 1.0;
    }
    Vector::new(bins).l1_normalized()
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn test_uniform_image_fills_one_bin() {
        let hist = hsv_histogram(&RgbImage::from_pixel(16, 16, Rgb([255, 0, 0])));
        assert_eq!(hist.dimension(), 432);
        let filled: Vec<usize> = (0..hist.dimension())
            .filter(|i| hist.data[*i] > 0.0)
            .collect();
        // hue 0, saturation 1.0 and value 1.0 clamp into the last bins
        assert_eq!(filled, vec![5 * VALUE_BINS + 5]);
        assert!((hist.data.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_colors_intersect() {
        let red = RgbImage::from_pixel(8, 8, Rgb([220, 30, 30]));
        let half = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 { Rgb([220, 30, 30]) } else { Rgb([30, 30, 220]) }
        });
        let blue = RgbImage::from_pixel(8, 8, Rgb([30, 30, 220]));

        let red = hsv_histogram(&red);
        assert!((red.histogram_intersection(&hsv_histogram(&half)) - 0.5).abs() < 1e-4);
        assert!(red.histogram_intersection(&hsv_histogram(&blue)) < 1e-6);
    }
}
