//! Dominant color classification and file-name color hints.

use image::RgbImage;
use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::Color;

/// Mean value below which a desaturated image is black.
const BLACK_MAX_VALUE: f32 = 0.18;
const BLACK_MAX_SATURATION: f32 = 0.25;
/// Mean value above which a desaturated image is white.
const WHITE_MIN_VALUE: f32 = 0.90;
const WHITE_MAX_SATURATION: f32 = 0.08;
/// Mean saturation below which an image is gray.
const GRAY_MAX_SATURATION: f32 = 0.15;

/// Pixels below either bound do not vote on hue.
const MASK_MIN_SATURATION: f32 = 0.25;
const MASK_MIN_VALUE: f32 = 0.25;
/// Minimum share of voting pixels before hue voting is trusted.
const MIN_CHROMATIC_SHARE: f32 = 0.03;
/// Mean value separating gray from black when too few pixels vote.
const NEUTRAL_SPLIT_VALUE: f32 = 0.35;

/// Non-overlapping hue ranges in degrees, `[start, end)`.
const HUE_RANGES: [(f32, f32, Color); 8] = [
    (0.0, 15.0, Color::Red),
    (15.0, 45.0, Color::Orange),
    (45.0, 75.0, Color::Yellow),
    (75.0, 165.0, Color::Green),
    (165.0, 255.0, Color::Blue),
    (255.0, 315.0, Color::Purple),
    (315.0, 345.0, Color::Red),
    (345.0, 360.0, Color::Red),
];

lazy_static! {
    static ref NAME_SEPARATORS: Regex = Regex::new(r"[\\/_\-.]+").unwrap();
}

/// RGB bytes to `(hue in degrees [0, 360), saturation [0, 1], value [0, 1])`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    if delta == 0.0 {
        return (0.0, s, v);
    }

    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    ((h * 60.0).rem_euclid(360.0), s, v)
}

fn hue_color(hue: f32) -> Color {
    HUE_RANGES
        .iter()
        .find(|(start, end, _)| hue >= *start && hue < *end)
        .map(|(_, _, color)| *color)
        .unwrap_or(Color::Red)
}

/// Classify the dominant color of an image.
///
/// Neutral conditions are checked on the image means first, so dark or washed
/// out images never win a hue vote. Remaining images vote with their saturated
/// pixels over the canonical hue ranges.
pub fn classify_color(image: &RgbImage) -> Color {
    let total = (image.width() as usize) * (image.height() as usize);
    if total == 0 {
        return Color::Assorted;
    }

    let hsv: Vec<(f32, f32, f32)> = image
        .pixels()
        .map(|p| rgb_to_hsv(p[0], p[1], p[2]))
        .collect();
    let mean_s = hsv.iter().map(|(_, s, _)| s).sum::<f32>() / total as f32;
    let mean_v = hsv.iter().map(|(_, _, v)| v).sum::<f32>() / total as f32;

    if mean_v < BLACK_MAX_VALUE && mean_s < BLACK_MAX_SATURATION {
        return Color::Black;
    }
    if mean_v > WHITE_MIN_VALUE && mean_s < WHITE_MAX_SATURATION {
        return Color::White;
    }
    if mean_s < GRAY_MAX_SATURATION {
        return Color::Gray;
    }

    let mut tally = [
        (Color::Red, 0usize),
        (Color::Orange, 0),
        (Color::Yellow, 0),
        (Color::Green, 0),
        (Color::Blue, 0),
        (Color::Purple, 0),
    ];
    let mut voters = 0usize;
    for (h, s, v) in &hsv {
        if *s < MASK_MIN_SATURATION || *v < MASK_MIN_VALUE {
            continue;
        }
        voters += 1;
        let color = hue_color(*h);
        if let Some(entry) = tally.iter_mut().find(|(c, _)| *c == color) {
            entry.1 += 1;
        }
    }

    if (voters as f32) < total as f32 * MIN_CHROMATIC_SHARE {
        return if mean_v > NEUTRAL_SPLIT_VALUE {
            Color::Gray
        } else {
            Color::Black
        };
    }

    // First maximum wins, so ties resolve in hue order.
    let mut best = tally[0];
    for entry in &tally[1..] {
        if entry.1 > best.1 {
            best = *entry;
        }
    }
    best.0
}

/// Color word found in an image file name, e.g. `blue_running_shoe.jpg`.
pub fn color_from_filename(name: &str) -> Option<Color> {
    let lowered = name.to_lowercase();
    NAME_SEPARATORS
        .split(&lowered)
        .flat_map(|part| part.split_whitespace())
        .filter_map(Color::parse)
        .find(|color| color.is_specific())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn uniform(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(32, 32, Rgb([r, g, b]))
    }

    #[test]
    fn test_rgb_to_hsv() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert!((h - 240.0).abs() < 1e-3);
        let (h, s, _) = rgb_to_hsv(128, 128, 128);
        assert_eq!((h, s), (0.0, 0.0));
    }

    #[test]
    fn test_dark_gray_is_black() {
        assert_eq!(classify_color(&uniform(40, 40, 40)), Color::Black);
    }

    #[test]
    fn test_hue_220_is_blue() {
        let (h, _, _) = rgb_to_hsv(0, 85, 255);
        assert!((h - 220.0).abs() < 0.5);
        assert_eq!(classify_color(&uniform(0, 85, 255)), Color::Blue);
    }

    #[test]
    fn test_neutrals() {
        assert_eq!(classify_color(&uniform(250, 250, 250)), Color::White);
        assert_eq!(classify_color(&uniform(150, 150, 150)), Color::Gray);
    }

    #[test]
    fn test_hue_ranges() {
        assert_eq!(classify_color(&uniform(220, 20, 20)), Color::Red);
        assert_eq!(classify_color(&uniform(230, 20, 60)), Color::Red);
        assert_eq!(classify_color(&uniform(230, 130, 20)), Color::Orange);
        assert_eq!(classify_color(&uniform(230, 220, 20)), Color::Yellow);
        assert_eq!(classify_color(&uniform(20, 200, 40)), Color::Green);
        assert_eq!(classify_color(&uniform(140, 30, 220)), Color::Purple);
    }

    #[test]
    fn test_color_from_filename() {
        assert_eq!(color_from_filename("blue_running_shoe.jpg"), Some(Color::Blue));
        assert_eq!(color_from_filename("bags/Grey-Tote.png"), Some(Color::Gray));
        assert_eq!(color_from_filename("tote_assorted.png"), None);
        assert_eq!(color_from_filename("bluetooth.png"), None);
    }
}
