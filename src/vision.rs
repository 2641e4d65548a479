pub mod color;
pub mod histogram;
pub mod image;
pub mod overrides;

use crate::catalog::{Category, Color};
use crate::vector::Vector;

use self::color::{classify_color, color_from_filename};
use self::histogram::hsv_histogram;
use self::image::PreparedImage;
use self::overrides::ImageOverride;

pub use self::image::{DirectoryImageSource, ImageSource};
pub use self::overrides::ImageOverrides;

/// Auxiliary features computed for every image, whatever the vision backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFeatures {
    pub histogram: Vector,
    pub dominant_color: Color,
}

impl ImageFeatures {
    pub fn extract(image: &PreparedImage) -> Self {
        Self {
            histogram: hsv_histogram(image.pixels()),
            dominant_color: classify_color(image.pixels()),
        }
    }
}

/// Color attached to a catalog image: override, then catalog color, then a
/// color word in the file name, then the detected dominant color.
pub fn resolve_color(
    manual: Option<&ImageOverride>,
    catalog: Option<Color>,
    file_name: Option<&str>,
    detected: Color,
) -> Color {
    manual
        .and_then(|o| o.color)
        .or(catalog)
        .or_else(|| file_name.and_then(color_from_filename))
        .unwrap_or(detected)
}

/// Category attached to a catalog image: override, then catalog category.
pub fn resolve_category(
    manual: Option<&ImageOverride>,
    catalog: Option<Category>,
) -> Option<Category> {
    manual.and_then(|o| o.category).or(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_resolution_order() {
        let manual = ImageOverride {
            color: Some(Color::Green),
            category: None,
        };
        assert_eq!(
            resolve_color(Some(&manual), Some(Color::Red), Some("blue.jpg"), Color::Black),
            Color::Green
        );
        assert_eq!(
            resolve_color(None, Some(Color::Red), Some("blue.jpg"), Color::Black),
            Color::Red
        );
        assert_eq!(
            resolve_color(None, None, Some("blue.jpg"), Color::Black),
            Color::Blue
        );
        assert_eq!(resolve_color(None, None, Some("x.jpg"), Color::Black), Color::Black);
    }

    #[test]
    fn test_category_resolution() {
        let manual = ImageOverride {
            color: None,
            category: Some(Category::Caps),
        };
        assert_eq!(
            resolve_category(Some(&manual), Some(Category::Bags)),
            Some(Category::Caps)
        );
        assert_eq!(resolve_category(None, None), None);
    }
}
