//! Token-overlap similarity between detector phrases and expected items.

use std::collections::BTreeSet;

/// Default minimum score for a phrase to satisfy an expected item.
///
/// Deliberately low: phrases and item labels are short and use overlapping
/// but different vocabularies.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.15;

/// Jaccard similarity of the lower-cased whitespace tokens of both strings.
///
/// Returns a value in `[0, 1]`; two empty strings score `0`.
pub fn similarity(phrase: &str, expected: &str) -> f32 {
    let a = tokens(phrase);
    let b = tokens(expected);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    intersection as f32 / union as f32
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_phrases_score_one() {
        assert_eq!(similarity("gray shirt", "Gray Shirt"), 1.0);
    }

    #[test]
    fn underscored_labels_do_not_split_into_tokens() {
        assert_eq!(similarity("gray shirt", "shirt_1"), 0.0);
        assert_eq!(similarity("shirt 1", "shirt_1"), 0.0);
    }

    #[test]
    fn partial_overlap_is_jaccard() {
        // {gray, shirt} vs {shirt}: 1 / 2
        assert_eq!(similarity("gray shirt", "shirt"), 0.5);
        // {blue, denim, jeans} vs {black, jeans}: 1 / 4
        assert_eq!(similarity("blue denim jeans", "black jeans"), 0.25);
    }

    #[test]
    fn disjoint_or_empty_scores_zero() {
        assert_eq!(similarity("zipper", "jacket"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("   ", "shirt"), 0.0);
    }

    #[test]
    fn repeated_tokens_count_once() {
        assert_eq!(similarity("shirt shirt", "shirt"), 1.0);
    }
}
