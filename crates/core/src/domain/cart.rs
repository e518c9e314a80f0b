use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub restaurant: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub modifiers: Vec<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

pub fn cart_total(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AddedToCart,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub status: OrderStatus,
    pub items: Vec<CartItem>,
}

impl OrderResult {
    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{cart_total, CartItem};

    fn item(price_cents: i64, quantity: u32) -> CartItem {
        CartItem {
            name: "Margherita Pizza".to_string(),
            restaurant: "Tony's Italian".to_string(),
            unit_price: Decimal::new(price_cents, 2),
            quantity,
            modifiers: Vec::new(),
        }
    }

    #[test]
    fn totals_multiply_price_by_quantity() {
        let items = vec![item(1899, 2), item(1499, 1)];
        assert_eq!(cart_total(&items), Decimal::new(5297, 2));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }
}
