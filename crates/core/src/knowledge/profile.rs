use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub restaurant: String,
    pub dish: String,
    pub quantity: u32,
    pub price: Option<Decimal>,
    pub ordered_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(restaurant: impl Into<String>, dish: impl Into<String>) -> Self {
        Self {
            restaurant: restaurant.into(),
            dish: dish.into(),
            quantity: 1,
            price: None,
            ordered_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!("{} from {}", self.dish, self.restaurant)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub preferences: Vec<String>,
    pub dietary: Vec<String>,
    pub location: String,
    pub last_order: Option<String>,
    pub order_history: Vec<OrderRecord>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            preferences: Vec::new(),
            dietary: Vec::new(),
            location: location.into(),
            last_order: None,
            order_history: Vec::new(),
        }
    }

    pub fn with_preferences(mut self, preferences: &[&str]) -> Self {
        merge_unique(&mut self.preferences, preferences.iter().map(|tag| tag.to_string()));
        self
    }

    pub fn with_dietary(mut self, dietary: &[&str]) -> Self {
        merge_unique(&mut self.dietary, dietary.iter().map(|tag| tag.to_string()));
        self
    }

    pub fn with_last_order(mut self, last_order: impl Into<String>) -> Self {
        self.last_order = Some(last_order.into());
        self
    }

    /// True when any dietary tag mentions vegetarian or vegan.
    pub fn requires_vegetarian(&self) -> bool {
        self.dietary.iter().any(|tag| {
            let tag = tag.to_lowercase();
            tag.contains("vegetarian") || tag.contains("vegan")
        })
    }

    pub fn has_ordered_from(&self, restaurant_name: &str) -> bool {
        self.order_history.iter().any(|order| order.restaurant == restaurant_name)
    }
}

/// Appends values not already present, keeping first-seen order.
pub fn merge_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

pub fn demo_profiles() -> Vec<UserProfile> {
    vec![
        UserProfile::new("1", "Sarah Johnson", "Downtown SF")
            .with_preferences(&["Italian", "Vegetarian", "Healthy"])
            .with_dietary(&["No nuts", "Low sodium"])
            .with_last_order("Mediterranean Bowl from Fresh & Green"),
        UserProfile::new("2", "Mike Chen", "Mission District")
            .with_preferences(&["Asian", "Spicy", "Quick"])
            .with_dietary(&["No shellfish"])
            .with_last_order("Kung Pao Chicken from Golden Dragon"),
        UserProfile::new("3", "Emma Rodriguez", "North Beach")
            .with_preferences(&["Mexican", "Authentic", "Family-sized"])
            .with_dietary(&["Gluten-free"])
            .with_last_order("Tacos al Pastor from Taqueria El Farolito"),
    ]
}
