//! Query and corpus tokenization.
//!
//! UAX #29 word segmentation, lowercased. Han, Hiragana and Katakana
//! text falls out as one token per character, which keeps Chinese and
//! Japanese queries matchable without a dictionary. The same function
//! runs on both the index side and the query side; lexical recall
//! depends on that symmetry, not on any particular segmentation choice.

use unicode_segmentation::UnicodeSegmentation;

pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}
