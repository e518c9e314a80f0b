use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use echoshop_core::domain::cart::{cart_total, CartItem};

pub const READY_IN: &str = "25-30 minutes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub user_id: String,
    pub items: Vec<CartItem>,
    pub item_count: usize,
    pub total: Decimal,
    pub ready_in: String,
}

impl Receipt {
    pub fn new(user_id: impl Into<String>, items: Vec<CartItem>) -> Self {
        Self {
            user_id: user_id.into(),
            item_count: items.len(),
            total: cart_total(&items),
            items,
            ready_in: READY_IN.to_string(),
        }
    }
}

/// Per-user in-memory carts.
#[derive(Debug, Default)]
pub struct CartBook {
    carts: Mutex<HashMap<String, Vec<CartItem>>>,
}

impl CartBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<CartItem>>> {
        match self.carts.lock() {
            Ok(carts) => carts,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, user_id: &str, item: CartItem) {
        self.lock().entry(user_id.to_string()).or_default().push(item);
    }

    pub fn items(&self, user_id: &str) -> Vec<CartItem> {
        self.lock().get(user_id).cloned().unwrap_or_default()
    }

    /// Empties the user's cart and returns what it held.
    pub fn take(&self, user_id: &str) -> Vec<CartItem> {
        self.lock().remove(user_id).unwrap_or_default()
    }
}
