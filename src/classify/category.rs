//! Storm Category Classifier
//! Maps free-text event types onto the fixed storm taxonomy.

use serde::Serialize;
use std::fmt;

/// Storm category labels used to group records for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Wind")]
    Wind,
    #[serde(rename = "Flood")]
    Flood,
    #[serde(rename = "Tropical Cyclone")]
    TropicalCyclone,
    #[serde(rename = "Winter Storm")]
    WinterStorm,
    #[serde(rename = "Heat")]
    Heat,
    #[serde(rename = "Hail")]
    Hail,
    #[serde(rename = "Tornado")]
    Tornado,
    #[serde(rename = "Rain")]
    Rain,
    #[serde(rename = "Wildfire")]
    Wildfire,
    #[serde(rename = "Lightning")]
    Lightning,
    #[serde(rename = "Avalanche")]
    Avalanche,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Wind,
        Category::Flood,
        Category::TropicalCyclone,
        Category::WinterStorm,
        Category::Heat,
        Category::Hail,
        Category::Tornado,
        Category::Rain,
        Category::Wildfire,
        Category::Lightning,
        Category::Avalanche,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Wind => "Wind",
            Category::Flood => "Flood",
            Category::TropicalCyclone => "Tropical Cyclone",
            Category::WinterStorm => "Winter Storm",
            Category::Heat => "Heat",
            Category::Hail => "Hail",
            Category::Tornado => "Tornado",
            Category::Rain => "Rain",
            Category::Wildfire => "Wildfire",
            Category::Lightning => "Lightning",
            Category::Avalanche => "Avalanche",
            Category::Other => "other",
        }
    }

    /// Reverse of [`Category::label`]. Exact, case-sensitive match.
    pub fn from_label(label: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single (pattern -> category) rule. Patterns are stored upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRule {
    pub pattern: &'static str,
    pub category: Category,
}

const fn rule(pattern: &'static str, category: Category) -> CategoryRule {
    CategoryRule { pattern, category }
}

/// Ordered rule list. Later matches override earlier ones, so ICE and
/// WINTER take precedence over a WIND match on the same event.
pub const CATEGORY_RULES: [CategoryRule; 16] = [
    rule("WIND", Category::Wind),
    rule("FLOOD", Category::Flood),
    rule("HURRICANE", Category::TropicalCyclone),
    rule("SNOW", Category::WinterStorm),
    rule("HEAT", Category::Heat),
    rule("HAIL", Category::Hail),
    rule("TORNADO", Category::Tornado),
    rule("RAIN", Category::Rain),
    // Duplicate of rule 0; has no effect under last-match-wins.
    rule("WIND", Category::Wind),
    rule("TROPICAL", Category::TropicalCyclone),
    rule("WINTER", Category::WinterStorm),
    rule("FIRE", Category::Wildfire),
    rule("LIGHTNING", Category::Lightning),
    rule("AVALANCHE", Category::Avalanche),
    rule("ICE", Category::WinterStorm),
    rule("BLIZZARD", Category::WinterStorm),
];

/// Assigns event types to categories.
pub struct Classifier;

impl Classifier {
    /// Classify an event type string. Case-insensitive, unanchored substring
    /// match; the last matching rule wins; no match yields `Other`.
    pub fn classify(event_type: &str) -> Category {
        let upper = event_type.to_ascii_uppercase();
        CATEGORY_RULES
            .iter()
            .fold(Category::Other, |current, rule| {
                if upper.contains(rule.pattern) {
                    rule.category
                } else {
                    current
                }
            })
    }

    /// Indices of rules repeating an earlier (pattern, category) pair.
    ///
    /// Such rules can never change an outcome: any event they match was
    /// already matched by the earlier copy with the same label.
    pub fn redundant_rules() -> Vec<usize> {
        CATEGORY_RULES
            .iter()
            .enumerate()
            .filter(|&(i, rule)| CATEGORY_RULES[..i].contains(rule))
            .map(|(i, _)| i)
            .collect()
    }
}
