use serde::{Deserialize, Serialize};

use super::profile::merge_unique;

const CUISINE_TERMS: [&str; 10] = [
    "italian",
    "asian",
    "mexican",
    "indian",
    "mediterranean",
    "american",
    "thai",
    "japanese",
    "chinese",
    "korean",
];

const DIETARY_TERMS: [(&str, &str); 7] = [
    ("vegetarian", "Vegetarian"),
    ("vegan", "Vegan"),
    ("gluten-free", "Gluten-free"),
    ("no nuts", "No nuts"),
    ("no dairy", "No dairy"),
    ("low sodium", "Low sodium"),
    ("no shellfish", "No shellfish"),
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPreferences {
    pub preferences: Vec<String>,
    pub dietary: Vec<String>,
}

impl ExtractedPreferences {
    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty() && self.dietary.is_empty()
    }
}

/// Case-insensitive substring match against a fixed vocabulary. There is no
/// negation handling: "not vegetarian" still yields `Vegetarian`.
pub fn extract_preferences(text: &str) -> ExtractedPreferences {
    let lowered = text.to_lowercase();
    let mut extracted = ExtractedPreferences::default();

    merge_unique(
        &mut extracted.preferences,
        CUISINE_TERMS.iter().filter(|term| lowered.contains(*term)).map(|term| term.to_string()),
    );
    merge_unique(
        &mut extracted.dietary,
        DIETARY_TERMS
            .iter()
            .filter(|(term, _)| lowered.contains(term))
            .map(|(_, restriction)| restriction.to_string()),
    );

    extracted
}

#[cfg(test)]
mod tests {
    use super::extract_preferences;

    #[test]
    fn extracts_cuisine_and_dietary_tags() {
        let extracted = extract_preferences("I love Italian food and I am vegetarian");

        assert_eq!(extracted.preferences, vec!["italian"]);
        assert_eq!(extracted.dietary, vec!["Vegetarian"]);
    }

    #[test]
    fn negation_is_not_understood() {
        let extracted = extract_preferences("I am not vegetarian");
        assert_eq!(extracted.dietary, vec!["Vegetarian"]);
    }

    #[test]
    fn multiple_terms_follow_vocabulary_order() {
        let extracted =
            extract_preferences("Thai or KOREAN tonight, gluten-free with no shellfish please");

        assert_eq!(extracted.preferences, vec!["thai", "korean"]);
        assert_eq!(extracted.dietary, vec!["Gluten-free", "No shellfish"]);
    }

    #[test]
    fn unrelated_text_extracts_nothing() {
        assert!(extract_preferences("what's the weather like").is_empty());
    }

    #[test]
    fn repeated_mentions_are_deduplicated() {
        let extracted = extract_preferences("italian, more italian, always Italian");
        assert_eq!(extracted.preferences, vec!["italian"]);
    }
}
