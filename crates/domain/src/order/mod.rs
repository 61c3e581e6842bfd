//! Order aggregate and related types.

mod aggregate;
mod builder;
mod commands;
mod intake;
mod payment;
mod status;
mod value_objects;

pub use aggregate::{Order, OrderParts, PaymentChange, StatusChange};
pub use builder::OrderBuilder;
pub use commands::*;
pub use intake::{IntakeLimits, ValidatedLine, validate_cart, validate_order};
pub use payment::{PaymentMethod, PaymentStatus};
pub use status::{OrderStatus, ReturnStatus, StatusEvent};
pub use value_objects::{OrderItem, ReturnRequest, ShippingAddress, total_of};

use common::ProductId;
use thiserror::Error;

use crate::money::Money;

/// Errors that can occur during order operations.
///
/// Cart errors carry the 1-based line number they were found on.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line quantity is outside `1..=max`.
    #[error("Line {line}: invalid quantity {quantity} (must be between 1 and {max})")]
    InvalidQuantity { line: usize, quantity: i64, max: u32 },

    /// A line references an unknown product.
    #[error("Line {line}: product {product_id} not found")]
    ProductNotFound { line: usize, product_id: ProductId },

    /// A line references a deactivated product.
    #[error("Line {line}: product {product_id} is inactive")]
    ProductInactive { line: usize, product_id: ProductId },

    /// Not enough stock to cover the line.
    #[error(
        "Line {line}: insufficient stock for product {product_id} (requested {requested}, available {available})"
    )]
    InsufficientStock {
        line: usize,
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A shipping field is missing or too long.
    #[error("Invalid shipping {field}: {reason}")]
    InvalidShipping {
        field: &'static str,
        reason: &'static str,
    },

    /// Order amounts do not fit in the money representation.
    #[error("Order amount overflow")]
    AmountOverflow,

    /// The event has no row in the transition table for the current state.
    #[error("Invalid transition: cannot {event} from {from} state")]
    InvalidTransition {
        from: OrderStatus,
        event: &'static str,
    },

    /// The payment callback would move the payment status illegally.
    #[error("Invalid payment transition: {from} -> {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Dispatch needs a non-empty tracking number.
    #[error("Tracking number is required")]
    TrackingNumberRequired,

    /// Return reason missing or too long.
    #[error("Invalid return reason: {0}")]
    InvalidReturnReason(&'static str),

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Stored total does not equal the sum of the stored lines.
    #[error("Order total {recorded} does not match item sum {computed}")]
    TotalMismatch { recorded: Money, computed: Money },
}

impl OrderError {
    /// Returns true for malformed input, as opposed to catalog or state conflicts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::EmptyCart
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidShipping { .. }
                | OrderError::AmountOverflow
                | OrderError::TrackingNumberRequired
                | OrderError::InvalidReturnReason(_)
                | OrderError::NoItems
        )
    }

    /// Short machine-readable kind, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::ProductInactive { .. } => "product_inactive",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidTransition { .. } | OrderError::InvalidPaymentTransition { .. } => {
                "invalid_transition"
            }
            OrderError::TotalMismatch { .. } => "corrupt_order",
            _ => "validation_error",
        }
    }
}
