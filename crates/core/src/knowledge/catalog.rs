use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    pub price: Decimal,
    pub vegetarian: bool,
}

impl Dish {
    pub fn new(name: &str, price_cents: i64, vegetarian: bool) -> Self {
        Self { name: name.to_string(), price: Decimal::new(price_cents, 2), vegetarian }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub cuisine: String,
    pub dishes: Vec<Dish>,
    pub rating: f64,
    pub delivery_time: String,
}

impl Restaurant {
    pub fn has_vegetarian_option(&self) -> bool {
        self.dishes.iter().any(|dish| dish.vegetarian)
    }
}

/// Fixed, ordered restaurant catalog. Iteration order is the tie-break order
/// for ranked results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestaurantCatalog {
    restaurants: Vec<Restaurant>,
}

impl RestaurantCatalog {
    pub fn new(restaurants: Vec<Restaurant>) -> Self {
        Self { restaurants }
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }
}

impl Default for RestaurantCatalog {
    fn default() -> Self {
        Self::new(vec![
            Restaurant {
                id: "1".to_string(),
                name: "Tony's Italian".to_string(),
                cuisine: "Italian".to_string(),
                dishes: vec![
                    Dish::new("Margherita Pizza", 1899, true),
                    Dish::new("Pasta Carbonara", 1699, false),
                    Dish::new("Bruschetta", 899, true),
                ],
                rating: 4.8,
                delivery_time: "25-35 min".to_string(),
            },
            Restaurant {
                id: "2".to_string(),
                name: "Golden Dragon".to_string(),
                cuisine: "Asian".to_string(),
                dishes: vec![
                    Dish::new("Kung Pao Chicken", 1599, false),
                    Dish::new("Vegetable Stir Fry", 1399, true),
                    Dish::new("Dim Sum Platter", 1299, false),
                ],
                rating: 4.6,
                delivery_time: "20-30 min".to_string(),
            },
            Restaurant {
                id: "3".to_string(),
                name: "Fresh & Green".to_string(),
                cuisine: "Healthy".to_string(),
                dishes: vec![
                    Dish::new("Mediterranean Bowl", 1499, true),
                    Dish::new("Quinoa Salad", 1299, true),
                    Dish::new("Grilled Salmon", 1899, false),
                ],
                rating: 4.7,
                delivery_time: "15-25 min".to_string(),
            },
            Restaurant {
                id: "4".to_string(),
                name: "Taqueria El Farolito".to_string(),
                cuisine: "Mexican".to_string(),
                dishes: vec![
                    Dish::new("Tacos al Pastor", 1199, false),
                    Dish::new("Veggie Burrito", 1099, true),
                    Dish::new("Guacamole & Chips", 699, true),
                ],
                rating: 4.5,
                delivery_time: "18-28 min".to_string(),
            },
        ])
    }
}
