//! Canonical category and color tokens.
//!
//! Both vocabularies are closed. Anything that does not normalize to a member
//! is treated as absent, never as an arbitrary string.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

fn normalize_token(raw: &str) -> String {
    raw.nfkc().collect::<String>().trim().to_lowercase()
}

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bags,
    Caps,
    Jackets,
    Shoes,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bags,
        Category::Caps,
        Category::Jackets,
        Category::Shoes,
    ];

    /// Normalize a raw token (case-insensitive, singular aliases accepted).
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "bag" | "bags" => Some(Category::Bags),
            "cap" | "caps" => Some(Category::Caps),
            "jacket" | "jackets" => Some(Category::Jackets),
            "shoe" | "shoes" => Some(Category::Shoes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bags => "bags",
            Category::Caps => "caps",
            Category::Jackets => "jackets",
            Category::Shoes => "shoes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Blue,
    Green,
    Black,
    White,
    Yellow,
    Brown,
    Gray,
    Purple,
    Orange,
    Assorted,
}

impl Color {
    pub const ALL: [Color; 11] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Black,
        Color::White,
        Color::Yellow,
        Color::Brown,
        Color::Gray,
        Color::Purple,
        Color::Orange,
        Color::Assorted,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "red" => Some(Color::Red),
            "blue" => Some(Color::Blue),
            "green" => Some(Color::Green),
            "black" => Some(Color::Black),
            "white" => Some(Color::White),
            "yellow" => Some(Color::Yellow),
            "brown" => Some(Color::Brown),
            "gray" | "grey" => Some(Color::Gray),
            "purple" => Some(Color::Purple),
            "orange" => Some(Color::Orange),
            "assorted" => Some(Color::Assorted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Black => "black",
            Color::White => "white",
            Color::Yellow => "yellow",
            Color::Brown => "brown",
            Color::Gray => "gray",
            Color::Purple => "purple",
            Color::Orange => "orange",
            Color::Assorted => "assorted",
        }
    }

    /// Black, white and gray.
    pub fn is_neutral(&self) -> bool {
        matches!(self, Color::Black | Color::White | Color::Gray)
    }

    /// Whether this color names a concrete hue or neutral (i.e. not `assorted`).
    pub fn is_specific(&self) -> bool {
        !matches!(self, Color::Assorted)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_aliases() {
        assert_eq!(Category::parse("Shoe"), Some(Category::Shoes));
        assert_eq!(Category::parse("  BAGS "), Some(Category::Bags));
        assert_eq!(Category::parse("dresses"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn test_color_aliases() {
        assert_eq!(Color::parse("Grey"), Some(Color::Gray));
        assert_eq!(Color::parse("PURPLE"), Some(Color::Purple));
        assert_eq!(Color::parse("teal"), None);
    }

    #[test]
    fn test_neutral_colors() {
        let neutrals: Vec<_> = Color::ALL.iter().filter(|c| c.is_neutral()).collect();
        assert_eq!(neutrals, vec![&Color::Black, &Color::White, &Color::Gray]);
        assert!(!Color::Assorted.is_specific());
    }
}
