//! Closed set of wearable categories and the free-text adapter that maps
//! detector phrases and expected-item labels onto it.
//!
//! Everything downstream of this module (suppression priority, boosted
//! scoring, accessory fallbacks) works on [`GarmentCategory`] values; only
//! [`GarmentCategory::from_text`] looks at raw strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A whole wearable item, as opposed to a detail fragment (zipper, logo, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentCategory {
    Top,
    Outerwear,
    Dress,
    Bottom,
    Footwear,
    Bag,
    Headwear,
    Eyewear,
    Scarf,
    Gloves,
    Socks,
    Belt,
    Watch,
    Ring,
    Bracelet,
    Necklace,
    Earrings,
}

const KEYWORDS: &[(&str, GarmentCategory)] = &[
    ("shirt", GarmentCategory::Top),
    ("tshirt", GarmentCategory::Top),
    ("tee", GarmentCategory::Top),
    ("top", GarmentCategory::Top),
    ("blouse", GarmentCategory::Top),
    ("sweater", GarmentCategory::Top),
    ("hoodie", GarmentCategory::Top),
    ("sweatshirt", GarmentCategory::Top),
    ("tank", GarmentCategory::Top),
    ("polo", GarmentCategory::Top),
    ("cardigan", GarmentCategory::Top),
    ("jersey", GarmentCategory::Top),
    ("camisole", GarmentCategory::Top),
    ("turtleneck", GarmentCategory::Top),
    ("jacket", GarmentCategory::Outerwear),
    ("coat", GarmentCategory::Outerwear),
    ("blazer", GarmentCategory::Outerwear),
    ("parka", GarmentCategory::Outerwear),
    ("vest", GarmentCategory::Outerwear),
    ("windbreaker", GarmentCategory::Outerwear),
    ("trench", GarmentCategory::Outerwear),
    ("puffer", GarmentCategory::Outerwear),
    ("dress", GarmentCategory::Dress),
    ("gown", GarmentCategory::Dress),
    ("jumpsuit", GarmentCategory::Dress),
    ("romper", GarmentCategory::Dress),
    ("pants", GarmentCategory::Bottom),
    ("trousers", GarmentCategory::Bottom),
    ("jeans", GarmentCategory::Bottom),
    ("shorts", GarmentCategory::Bottom),
    ("skirt", GarmentCategory::Bottom),
    ("leggings", GarmentCategory::Bottom),
    ("chinos", GarmentCategory::Bottom),
    ("joggers", GarmentCategory::Bottom),
    ("sweatpants", GarmentCategory::Bottom),
    ("shoe", GarmentCategory::Footwear),
    ("sneaker", GarmentCategory::Footwear),
    ("boot", GarmentCategory::Footwear),
    ("sandal", GarmentCategory::Footwear),
    ("heel", GarmentCategory::Footwear),
    ("loafer", GarmentCategory::Footwear),
    ("slipper", GarmentCategory::Footwear),
    ("trainer", GarmentCategory::Footwear),
    ("footwear", GarmentCategory::Footwear),
    ("bag", GarmentCategory::Bag),
    ("handbag", GarmentCategory::Bag),
    ("backpack", GarmentCategory::Bag),
    ("purse", GarmentCategory::Bag),
    ("tote", GarmentCategory::Bag),
    ("clutch", GarmentCategory::Bag),
    ("hat", GarmentCategory::Headwear),
    ("cap", GarmentCategory::Headwear),
    ("beanie", GarmentCategory::Headwear),
    ("beret", GarmentCategory::Headwear),
    ("headband", GarmentCategory::Headwear),
    ("glasses", GarmentCategory::Eyewear),
    ("sunglasses", GarmentCategory::Eyewear),
    ("eyeglasses", GarmentCategory::Eyewear),
    ("scarf", GarmentCategory::Scarf),
    ("shawl", GarmentCategory::Scarf),
    ("glove", GarmentCategory::Gloves),
    ("gloves", GarmentCategory::Gloves),
    ("mitten", GarmentCategory::Gloves),
    ("sock", GarmentCategory::Socks),
    ("socks", GarmentCategory::Socks),
    ("stocking", GarmentCategory::Socks),
    ("belt", GarmentCategory::Belt),
    ("watch", GarmentCategory::Watch),
    ("smartwatch", GarmentCategory::Watch),
    ("ring", GarmentCategory::Ring),
    ("bracelet", GarmentCategory::Bracelet),
    ("bangle", GarmentCategory::Bracelet),
    ("necklace", GarmentCategory::Necklace),
    ("pendant", GarmentCategory::Necklace),
    ("choker", GarmentCategory::Necklace),
    ("earring", GarmentCategory::Earrings),
    ("earrings", GarmentCategory::Earrings),
];

impl GarmentCategory {
    /// Map a single normalized token onto a category.
    ///
    /// Plural forms (`shoes`, `dresses`) fall back to their singular keyword.
    pub fn from_token(token: &str) -> Option<Self> {
        lookup(token)
            .or_else(|| token.strip_suffix("es").and_then(lookup))
            .or_else(|| token.strip_suffix('s').and_then(lookup))
    }

    /// The first category mentioned anywhere in `text`, if any.
    pub fn from_text(text: &str) -> Option<Self> {
        category_tokens(text).find_map(|token| Self::from_token(&token))
    }

    /// Accessories that may borrow a related detection's box when undetected.
    pub fn is_small_accessory(self) -> bool {
        matches!(
            self,
            GarmentCategory::Socks
                | GarmentCategory::Watch
                | GarmentCategory::Belt
                | GarmentCategory::Ring
                | GarmentCategory::Bracelet
                | GarmentCategory::Necklace
                | GarmentCategory::Earrings
        )
    }

    /// Categories whose detections can stand in for this accessory.
    ///
    /// Empty for anything that is not a small accessory.
    pub fn fallback_anchors(self) -> &'static [GarmentCategory] {
        use GarmentCategory::*;
        match self {
            Socks => &[Footwear],
            Belt => &[Bottom, Dress],
            Necklace => &[Top, Dress, Outerwear],
            Earrings => &[Headwear],
            Watch | Bracelet | Ring => &[Top, Outerwear],
            _ => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GarmentCategory::Top => "top",
            GarmentCategory::Outerwear => "outerwear",
            GarmentCategory::Dress => "dress",
            GarmentCategory::Bottom => "bottom",
            GarmentCategory::Footwear => "footwear",
            GarmentCategory::Bag => "bag",
            GarmentCategory::Headwear => "headwear",
            GarmentCategory::Eyewear => "eyewear",
            GarmentCategory::Scarf => "scarf",
            GarmentCategory::Gloves => "gloves",
            GarmentCategory::Socks => "socks",
            GarmentCategory::Belt => "belt",
            GarmentCategory::Watch => "watch",
            GarmentCategory::Ring => "ring",
            GarmentCategory::Bracelet => "bracelet",
            GarmentCategory::Necklace => "necklace",
            GarmentCategory::Earrings => "earrings",
        }
    }
}

impl fmt::Display for GarmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lookup(token: &str) -> Option<GarmentCategory> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == token)
        .map(|(_, category)| *category)
}

/// Lower-cased alphabetic runs of `text`; `top_1` yields `top`, `t-shirt`
/// yields `t` and `shirt`.
fn category_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_labels() {
        assert_eq!(
            GarmentCategory::from_text("gray shirt"),
            Some(GarmentCategory::Top)
        );
        assert_eq!(
            GarmentCategory::from_text("top_1"),
            Some(GarmentCategory::Top)
        );
        assert_eq!(
            GarmentCategory::from_text("Denim JEANS"),
            Some(GarmentCategory::Bottom)
        );
        assert_eq!(
            GarmentCategory::from_text("white t-shirt"),
            Some(GarmentCategory::Top)
        );
    }

    #[test]
    fn tolerates_plurals() {
        assert_eq!(
            GarmentCategory::from_text("running shoes"),
            Some(GarmentCategory::Footwear)
        );
        assert_eq!(
            GarmentCategory::from_text("summer dresses"),
            Some(GarmentCategory::Dress)
        );
        assert_eq!(
            GarmentCategory::from_text("gold earrings"),
            Some(GarmentCategory::Earrings)
        );
    }

    #[test]
    fn detail_fragments_have_no_category() {
        assert_eq!(GarmentCategory::from_text("zipper"), None);
        assert_eq!(GarmentCategory::from_text("metal button"), None);
        assert_eq!(GarmentCategory::from_text("collar"), None);
        assert_eq!(GarmentCategory::from_text(""), None);
    }

    #[test]
    fn small_accessories_have_anchors() {
        for category in [
            GarmentCategory::Socks,
            GarmentCategory::Watch,
            GarmentCategory::Belt,
            GarmentCategory::Ring,
            GarmentCategory::Bracelet,
            GarmentCategory::Necklace,
            GarmentCategory::Earrings,
        ] {
            assert!(category.is_small_accessory());
            assert!(!category.fallback_anchors().is_empty());
        }
        assert!(!GarmentCategory::Top.is_small_accessory());
        assert!(GarmentCategory::Top.fallback_anchors().is_empty());
        assert_eq!(
            GarmentCategory::Socks.fallback_anchors(),
            &[GarmentCategory::Footwear]
        );
    }
}
