//! Text analysis shared by the text encoders and the tag-overlap boost.
//!
//! ```text
//! Text → NFKC → lowercase → Unicode word segmentation → tokens (len >= 2)
//! ```

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Minimum token length in characters.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Split text into normalized word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized
        .unicode_words()
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by adjacent-pair bigrams (joined by a single space).
pub fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let mut out: Vec<String> = tokens.to_vec();
    if max_n >= 2 {
        out.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    }
    out
}

/// Character trigrams of a single token, with boundary markers.
pub fn char_trigrams(token: &str) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('<')
        .chain(token.chars())
        .chain(std::iter::once('>'))
        .collect();
    padded
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_normalizes() {
        assert_eq!(
            tokenize("Ｗinter JACKET, waterproof & warm!"),
            vec!["winter", "jacket", "waterproof", "warm"]
        );
    }

    #[test]
    fn test_tokenize_drops_single_chars() {
        assert_eq!(tokenize("a b cd"), vec!["cd"]);
    }

    #[test]
    fn test_ngrams() {
        let tokens = tokenize("red running shoes");
        let grams = ngrams(&tokens, 2);
        assert_eq!(
            grams,
            vec!["red", "running", "shoes", "red running", "running shoes"]
        );
        assert_eq!(ngrams(&tokens, 1).len(), 3);
    }

    #[test]
    fn test_char_trigrams() {
        assert_eq!(char_trigrams("cap"), vec!["<ca", "cap", "ap>"]);
    }
}
