use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

fn default_quantity() -> i32 {
    1
}

/// A product line inside a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default, with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
}

impl Item {
    pub fn new(item_id: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            unit_price,
        }
    }
}

/// Adding to an item would take its quantity past `i32::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("quantity of item {item_id} would exceed {max}", max = i32::MAX)]
pub struct QuantityOverflow {
    pub item_id: String,
}

impl QuantityOverflow {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
        }
    }
}

/// The items owned by one customer or anonymous session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub customer_id: String,
    pub items: Vec<Item>,
}

impl Cart {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    /// Upsert that increments the quantity of an existing line.
    /// Returns the stored item; the cart is unchanged on overflow.
    pub fn add(&mut self, item: Item) -> Result<Item, QuantityOverflow> {
        match self.items.iter_mut().find(|i| i.item_id == item.item_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| QuantityOverflow::new(&item.item_id))?;
                Ok(existing.clone())
            }
            None => {
                self.items.push(item.clone());
                Ok(item)
            }
        }
    }

    /// Upsert that replaces the quantity of an existing line.
    /// Returns the stored item.
    pub fn update(&mut self, item: Item) -> Item {
        match self.items.iter_mut().find(|i| i.item_id == item.item_id) {
            Some(existing) => {
                existing.quantity = item.quantity;
                existing.clone()
            }
            None => {
                self.items.push(item.clone());
                item
            }
        }
    }

    /// Returns `true` if an item was removed.
    pub fn remove(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.item_id != item_id);
        self.items.len() != before
    }

    /// Moves every item of `other` into this cart using the add rule.
    ///
    /// Either every item is merged or, on overflow, none is.
    pub fn merge(&mut self, other: Cart) -> Result<(), QuantityOverflow> {
        let mut merged = self.items.clone();
        for item in other.items {
            match merged.iter_mut().find(|i| i.item_id == item.item_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(item.quantity)
                        .ok_or_else(|| QuantityOverflow::new(&item.item_id))?;
                }
                None => merged.push(item),
            }
        }
        self.items = merged;
        Ok(())
    }

    pub fn sort_items(&mut self) {
        self.items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    }
}
