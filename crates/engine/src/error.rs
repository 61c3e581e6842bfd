//! Engine error types.

use common::ProductId;
use domain::OrderError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Intake validation or state machine rejection.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Ledger, version or persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller's role or identity does not allow the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No order carries the tracking number.
    #[error("No order with tracking number {0}")]
    TrackingNumberNotFound(String),

    /// A catalog edit was malformed.
    #[error("Invalid product {product_id}: {reason}")]
    InvalidProduct {
        product_id: ProductId,
        reason: &'static str,
    },

    /// The notification collaborator failed.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// The payment collaborator failed.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),
}

impl EngineError {
    /// Short machine-readable kind, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Order(e) => e.kind(),
            EngineError::Store(e) => e.kind(),
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::TrackingNumberNotFound(_) => "order_not_found",
            EngineError::InvalidProduct { .. } => "validation_error",
            EngineError::Notification(_) | EngineError::PaymentGateway(_) => {
                "collaborator_failure"
            }
        }
    }

    pub(crate) fn unauthorized(action: &str) -> Self {
        EngineError::Unauthorized(format!("not allowed to {action}"))
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn test_kind_passes_through() {
        assert_eq!(EngineError::from(OrderError::EmptyCart).kind(), "validation_error");
        assert_eq!(
            EngineError::from(StoreError::OrderNotFound(OrderId::new())).kind(),
            "order_not_found"
        );
        assert_eq!(EngineError::unauthorized("dispatch").kind(), "unauthorized");
    }

    #[test]
    fn test_transparent_messages() {
        let err = EngineError::from(OrderError::TrackingNumberRequired);
        assert_eq!(err.to_string(), "Tracking number is required");
    }
}
