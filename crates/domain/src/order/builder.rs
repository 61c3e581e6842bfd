//! Builds the priced order snapshot from validated lines.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};

use super::value_objects::total_of;
use super::{Order, OrderError, OrderItem, PaymentMethod, ShippingAddress, ValidatedLine};

/// Freezes validated lines into a new [`Order`].
///
/// Purely additive: it copies the name and price of each product as they
/// were when validated and never touches the product itself.
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    order_id: OrderId,
    user_id: UserId,
    shipping: ShippingAddress,
    payment_method: PaymentMethod,
    lines: Vec<ValidatedLine>,
}

impl OrderBuilder {
    /// Starts a builder with a freshly generated order id.
    pub fn new(user_id: UserId, shipping: ShippingAddress, payment_method: PaymentMethod) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id,
            shipping,
            payment_method,
            lines: Vec::new(),
        }
    }

    /// Overrides the generated order id.
    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn lines(mut self, lines: Vec<ValidatedLine>) -> Self {
        self.lines = lines;
        self
    }

    /// Snapshots the lines and computes the total.
    pub fn build(self, now: DateTime<Utc>) -> Result<Order, OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let items: Vec<OrderItem> = self
            .lines
            .iter()
            .map(|line| OrderItem::snapshot(line.product(), line.quantity()))
            .collect();
        let total_amount = total_of(&items)?;

        Ok(Order::placed(
            self.order_id,
            self.user_id,
            items,
            total_amount,
            self.payment_method,
            self.shipping,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::money::Money;
    use crate::order::{CartLine, IntakeLimits, OrderStatus, PaymentStatus, validate_cart};
    use crate::product::Product;
    use crate::test_support::address;

    #[test]
    fn test_build_prices_and_totals() {
        let a = Product::new("Kurta", "Kurtas", Money::from_minor(49_950), 10);
        let b = Product::new("Dupatta", "Accessories", Money::from_minor(12_000), 10);
        let products: HashMap<_, _> = [(a.id, a.clone()), (b.id, b.clone())].into();
        let lines = validate_cart(
            &[CartLine::new(a.id, 2), CartLine::new(b.id, 3)],
            &products,
            &IntakeLimits::default(),
        )
        .unwrap();

        let order = OrderBuilder::new(UserId::new(), address(), PaymentMethod::Upi)
            .lines(lines)
            .build(Utc::now())
            .unwrap();

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[0].product_name(), "Kurta");
        assert_eq!(order.total_amount(), Money::from_minor(2 * 49_950 + 3 * 12_000));
        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.total_quantity(), 5);
    }

    #[test]
    fn test_build_without_lines_fails() {
        let result = OrderBuilder::new(UserId::new(), address(), PaymentMethod::Upi).build(Utc::now());
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_builder_uses_given_order_id() {
        let a = Product::new("Kurta", "Kurtas", Money::from_minor(100), 1);
        let products: HashMap<_, _> = [(a.id, a.clone())].into();
        let lines =
            validate_cart(&[CartLine::new(a.id, 1)], &products, &IntakeLimits::default()).unwrap();
        let id = OrderId::new();

        let order = OrderBuilder::new(UserId::new(), address(), PaymentMethod::Card)
            .order_id(id)
            .lines(lines)
            .build(Utc::now())
            .unwrap();
        assert_eq!(order.id(), id);
    }
}
