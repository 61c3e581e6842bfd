//! Catalog products and stock reservations.

use std::collections::BTreeMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A catalog product with its live stock count.
///
/// Products are never deleted, only deactivated. Stock is unsigned so a
/// negative count cannot be represented at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Current unit price.
    pub price: Money,
    /// Units available for reservation.
    pub stock: u32,
    pub active: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Product {
    /// Creates a new active product with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            category: category.into(),
            price,
            stock,
            active: true,
            description: None,
            image_url: None,
        }
    }

    /// Returns true if `quantity` units could be reserved right now.
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.active && quantity <= self.stock
    }
}

/// Catalog-management edit of a product's descriptive fields.
///
/// Stock is deliberately absent: stock only moves through the inventory ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl ProductUpdate {
    /// Applies the set fields onto `product`.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(active) = self.active {
            product.active = active;
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = Some(image_url.clone());
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.active.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
    }
}

/// A request to take `quantity` units of one product out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl Reservation {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Collapses reservations to one entry per product, sorted by product id.
///
/// The sort order is the lock acquisition order used by every ledger
/// implementation. Quantities saturate instead of wrapping, which can only
/// ever make a reservation fail, never succeed spuriously.
pub fn merge_reservations(items: impl IntoIterator<Item = Reservation>) -> Vec<Reservation> {
    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in items {
        let entry = merged.entry(item.product_id).or_insert(0);
        *entry = entry.saturating_add(item.quantity);
    }
    merged
        .into_iter()
        .map(|(product_id, quantity)| Reservation::new(product_id, quantity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product_is_active() {
        let product = Product::new("Silk Saree", "Sarees", Money::from_major(100), 5);
        assert!(product.active);
        assert!(product.can_supply(5));
        assert!(!product.can_supply(6));
    }

    #[test]
    fn test_inactive_product_cannot_supply() {
        let mut product = Product::new("Silk Saree", "Sarees", Money::from_major(100), 5);
        product.active = false;
        assert!(!product.can_supply(1));
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut product = Product::new("Silk Saree", "Sarees", Money::from_major(100), 5);
        let update = ProductUpdate {
            price: Some(Money::from_major(150)),
            active: Some(false),
            ..Default::default()
        };
        update.apply_to(&mut product);

        assert_eq!(product.price, Money::from_major(150));
        assert!(!product.active);
        assert_eq!(product.name, "Silk Saree");
        assert_eq!(product.stock, 5);
        assert!(ProductUpdate::default().is_empty());
        assert!(!update.is_empty());
    }

    #[test]
    fn test_merge_reservations_sums_and_sorts() {
        let a = ProductId::new();
        let b = ProductId::new();
        let merged = merge_reservations([
            Reservation::new(b, 1),
            Reservation::new(a, 2),
            Reservation::new(b, 4),
        ]);

        assert_eq!(merged.len(), 2);
        assert!(merged[0].product_id < merged[1].product_id);
        let total_b = merged.iter().find(|r| r.product_id == b).unwrap().quantity;
        assert_eq!(total_b, 5);
    }

    #[test]
    fn test_merge_reservations_saturates() {
        let a = ProductId::new();
        let merged = merge_reservations([Reservation::new(a, u32::MAX), Reservation::new(a, 1)]);
        assert_eq!(merged[0].quantity, u32::MAX);
    }
}
