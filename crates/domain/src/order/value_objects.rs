//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::product::Product;

use super::OrderError;

/// A priced line of an order, frozen at placement time.
///
/// Fields are private and there are no setters: later edits to the
/// referenced product's name or price never reach an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    product_id: ProductId,
    product_name: String,
    unit_price: Money,
    quantity: u32,
}

impl OrderItem {
    /// Creates an order item from stored values.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Snapshots the product's current name and price.
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self::new(product.id, product.name.clone(), product.price, quantity)
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Unit price at order time.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns `unit_price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Sums the line totals of `items` exactly.
pub fn total_of(items: &[OrderItem]) -> Result<Money, OrderError> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(OrderError::AmountOverflow)
    })
}

/// Delivery address for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub mobile: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ShippingAddress {
    /// Checks required fields and maximum lengths.
    pub fn validate(&self) -> Result<(), OrderError> {
        required("name", &self.name, 100)?;
        required("mobile", &self.mobile, 20)?;
        required("address_line1", &self.address_line1, 255)?;
        if let Some(line2) = &self.address_line2 {
            max_len("address_line2", line2, 255)?;
        }
        required("city", &self.city, 100)?;
        required("state", &self.state, 100)?;
        required("pincode", &self.pincode, 10)?;
        Ok(())
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.trim().is_empty() {
        return Err(OrderError::InvalidShipping {
            field,
            reason: "is required",
        });
    }
    max_len(field, value, max)
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.chars().count() > max {
        return Err(OrderError::InvalidShipping {
            field,
            reason: "is too long",
        });
    }
    Ok(())
}

/// Customer's request to send an order back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub reason: String,
    pub requested_at: DateTime<Utc>,

    /// Carrier number of the parcel coming back, set when the return completes.
    #[serde(default)]
    pub return_tracking_number: Option<String>,
}

impl ReturnRequest {
    /// Maximum accepted reason length, in characters.
    pub const MAX_REASON_LEN: usize = 500;

    pub fn new(reason: impl Into<String>, requested_at: DateTime<Utc>) -> Result<Self, OrderError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(OrderError::InvalidReturnReason("reason is required"));
        }
        if reason.chars().count() > Self::MAX_REASON_LEN {
            return Err(OrderError::InvalidReturnReason("reason is too long"));
        }
        Ok(Self {
            reason,
            requested_at,
            return_tracking_number: None,
        })
    }

    /// Returns the record as it stands once the return is complete.
    pub fn completed(mut self, return_tracking_number: Option<&str>) -> Self {
        let tracking = return_tracking_number
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(tracking) = tracking {
            self.return_tracking_number = Some(tracking.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::address;

    #[test]
    fn test_snapshot_copies_name_and_price() {
        let mut product = Product::new("Silk Saree", "Sarees", Money::from_major(100), 5);
        let item = OrderItem::snapshot(&product, 2);

        product.price = Money::from_major(150);
        product.name = "Renamed".to_string();

        assert_eq!(item.unit_price(), Money::from_major(100));
        assert_eq!(item.product_name(), "Silk Saree");
        assert_eq!(item.line_total(), Some(Money::from_major(200)));
    }

    #[test]
    fn test_total_of_items() {
        let items = vec![
            OrderItem::new(ProductId::new(), "A", Money::from_minor(1999), 3),
            OrderItem::new(ProductId::new(), "B", Money::from_minor(1), 7),
        ];
        assert_eq!(total_of(&items).unwrap(), Money::from_minor(6004));
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let items = vec![OrderItem::new(
            ProductId::new(),
            "A",
            Money::from_minor(i64::MAX),
            2,
        )];
        assert!(matches!(total_of(&items), Err(OrderError::AmountOverflow)));
    }

    #[test]
    fn test_valid_address() {
        assert!(address().validate().is_ok());
    }

    #[test]
    fn test_address_missing_field() {
        let mut addr = address();
        addr.city = "   ".to_string();
        assert!(matches!(
            addr.validate(),
            Err(OrderError::InvalidShipping { field: "city", .. })
        ));
    }

    #[test]
    fn test_address_field_too_long() {
        let mut addr = address();
        addr.pincode = "12345678901".to_string();
        assert!(matches!(
            addr.validate(),
            Err(OrderError::InvalidShipping { field: "pincode", .. })
        ));
    }

    #[test]
    fn test_return_reason_rules() {
        let now = Utc::now();
        assert!(ReturnRequest::new("damaged", now).is_ok());
        assert!(ReturnRequest::new("  ", now).is_err());
        assert!(ReturnRequest::new("x".repeat(501), now).is_err());
    }

    #[test]
    fn test_completed_keeps_return_tracking() {
        let request = ReturnRequest::new("damaged", Utc::now()).unwrap();
        assert_eq!(request.return_tracking_number, None);

        let done = request.clone().completed(Some(" RTN-1 "));
        assert_eq!(done.return_tracking_number.as_deref(), Some("RTN-1"));
        assert_eq!(done.reason, "damaged");

        assert_eq!(request.clone().completed(Some("  ")), request);
        assert_eq!(request.clone().completed(None), request);
    }
}
