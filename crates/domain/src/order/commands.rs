//! Order commands.

use common::{OrderId, ProductId, UserId, Version};
use serde::{Deserialize, Serialize};

use super::{PaymentMethod, PaymentStatus, ShippingAddress, StatusEvent};

/// One requested cart line.
///
/// Quantity is signed so that malformed input reaches the validator and is
/// rejected with the offending line instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place an order from a cart.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The authenticated customer.
    pub user_id: UserId,

    /// Requested lines, in cart order.
    pub lines: Vec<CartLine>,

    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        user_id: UserId,
        lines: Vec<CartLine>,
        shipping: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id,
            lines,
            shipping,
            payment_method,
        }
    }

    /// Returns the distinct product ids referenced by the cart, sorted.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|line| line.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Command to move an order through the fulfillment state machine.
#[derive(Debug, Clone)]
pub struct TransitionOrder {
    pub order_id: OrderId,
    pub event: StatusEvent,

    /// Fulfillment version the caller last observed.
    pub expected_version: Version,
}

impl TransitionOrder {
    /// Creates a new TransitionOrder command.
    pub fn new(order_id: OrderId, event: StatusEvent, expected_version: Version) -> Self {
        Self {
            order_id,
            event,
            expected_version,
        }
    }
}

/// Command for a customer to ask for a return.
#[derive(Debug, Clone)]
pub struct RequestReturn {
    pub order_id: OrderId,
    pub reason: String,
}

impl RequestReturn {
    /// Creates a new RequestReturn command.
    pub fn new(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

/// Command carrying a payment provider callback.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub status: PaymentStatus,

    /// Payment version the caller last observed.
    pub expected_version: Version,

    /// Provider-side payment reference.
    pub reference: Option<String>,
}

impl RecordPayment {
    /// Creates a new RecordPayment command.
    pub fn new(
        order_id: OrderId,
        status: PaymentStatus,
        expected_version: Version,
        reference: Option<String>,
    ) -> Self {
        Self {
            order_id,
            status,
            expected_version,
            reference,
        }
    }
}
