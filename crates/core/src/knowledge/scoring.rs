//! Personalization scoring for restaurant recommendations

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::catalog::{Restaurant, RestaurantCatalog};
use super::profile::UserProfile;

/// Boosts added on top of a restaurant's base rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Cuisine matches at least one preference tag (default: 0.5)
    pub cuisine_match: f64,
    /// User needs vegetarian/vegan and the restaurant serves it (default: 0.3)
    pub dietary_fit: f64,
    /// User has ordered from the restaurant before (default: 0.2)
    pub order_affinity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { cuisine_match: 0.5, dietary_fit: 0.3, order_affinity: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub restaurant: Restaurant,
    pub personalization_score: f64,
}

/// Filters and ranks the catalog for one user
#[derive(Debug, Clone, Default)]
pub struct PersonalizationScorer {
    weights: ScoringWeights,
}

impl PersonalizationScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Restaurants whose cuisine matches a preference and that satisfy a
    /// vegetarian requirement, ordered by descending score. Ties keep catalog
    /// order.
    pub fn rank(&self, profile: &UserProfile, catalog: &RestaurantCatalog) -> Vec<Recommendation> {
        let needs_vegetarian = profile.requires_vegetarian();

        let mut ranked = catalog
            .restaurants()
            .iter()
            .filter(|restaurant| matches_cuisine(profile, restaurant))
            .filter(|restaurant| !needs_vegetarian || restaurant.has_vegetarian_option())
            .map(|restaurant| Recommendation {
                restaurant: restaurant.clone(),
                personalization_score: self.score(restaurant, profile),
            })
            .collect::<Vec<_>>();

        // sort_by is stable
        ranked.sort_by(|left, right| {
            right
                .personalization_score
                .partial_cmp(&left.personalization_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    pub fn score(&self, restaurant: &Restaurant, profile: &UserProfile) -> f64 {
        let mut score = restaurant.rating;

        if matches_cuisine(profile, restaurant) {
            score += self.weights.cuisine_match;
        }
        if profile.requires_vegetarian() && restaurant.has_vegetarian_option() {
            score += self.weights.dietary_fit;
        }
        if profile.has_ordered_from(&restaurant.name) {
            score += self.weights.order_affinity;
        }

        score
    }
}

/// Case-insensitive substring test of each preference tag against the cuisine.
pub fn matches_cuisine(profile: &UserProfile, restaurant: &Restaurant) -> bool {
    let cuisine = restaurant.cuisine.to_lowercase();
    profile
        .preferences
        .iter()
        .map(|tag| tag.trim().to_lowercase())
        .any(|tag| !tag.is_empty() && cuisine.contains(&tag))
}
