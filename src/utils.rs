use unicode_normalization::UnicodeNormalization;

/// Folds full-width letters, digits and punctuation to their half-width forms
/// (and half-width katakana to full-width), then trims and collapses runs of
/// whitespace to a single space.
pub fn fold_width(text: &str) -> String {
    let folded = text.nfkc().collect::<String>();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
