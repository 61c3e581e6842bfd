use common::{OrderId, ProductId, Version};
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A product with this id already exists.
    #[error("Product already exists: {0}")]
    DuplicateProduct(ProductId),

    /// The product was deactivated before the reservation took its lock.
    #[error("Product {0} is inactive")]
    ProductInactive(ProductId),

    /// Stock at reservation time does not cover the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Restocking would push the counter past its maximum.
    #[error("Stock overflow for product {0}")]
    StockOverflow(ProductId),

    /// A product lock could not be taken within the configured timeout.
    #[error("Lock contention on {resource}")]
    Conflict { resource: String },

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this id already exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// Another order already carries this tracking number.
    #[error("Tracking number already in use: {0}")]
    DuplicateTrackingNumber(String),

    /// The expected version did not match the stored one.
    #[error("Version conflict for order {order_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// A stored row could not be turned back into a valid value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the storage layer itself failed.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_)
                | StoreError::Migration(_)
                | StoreError::Serialization(_)
                | StoreError::Corrupt(_)
        )
    }

    /// Short machine-readable kind, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::ProductNotFound(_) => "product_not_found",
            StoreError::ProductInactive(_) => "product_inactive",
            StoreError::InsufficientStock { .. } => "insufficient_stock",
            StoreError::OrderNotFound(_) => "order_not_found",
            StoreError::VersionConflict { .. } => "version_conflict",
            StoreError::Conflict { .. } => "conflict",
            StoreError::DuplicateProduct(_)
            | StoreError::DuplicateOrder(_)
            | StoreError::DuplicateTrackingNumber(_) => "duplicate",
            StoreError::StockOverflow(_) => "validation_error",
            StoreError::Corrupt(_)
            | StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Serialization(_) => "persistence_failure",
        }
    }
}

impl From<OrderError> for StoreError {
    fn from(err: OrderError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
