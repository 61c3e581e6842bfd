use async_trait::async_trait;
use common::{OrderId, ProductId, UserId, Version};
use domain::{Order, PaymentChange, Product, ProductUpdate, Reservation, StatusChange};

use crate::{Result, StoreError};

/// Read and write access to catalog products.
///
/// Stock is deliberately not writable here; it only moves through the
/// [`InventoryLedger`].
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Adds a new product. Fails with `DuplicateProduct` if the id is taken.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Retrieves a product by id.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Retrieves the products that exist among `product_ids`.
    ///
    /// Unknown ids are skipped; callers decide whether that is an error.
    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Applies a partial update and returns the updated product.
    async fn update_product(&self, product_id: ProductId, update: ProductUpdate)
    -> Result<Product>;
}

/// The single mutator of product stock.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Decrements stock for every reservation, or for none of them.
    ///
    /// Stock is re-checked at the moment of the decrement. Fails with
    /// `InsufficientStock` or `ProductNotFound` for the first offending
    /// product, and with `Conflict` if a product lock cannot be taken in time.
    async fn reserve_all(&self, reservations: &[Reservation]) -> Result<()>;

    /// Adds stock to a product and returns the updated product.
    async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<Product>;
}

/// Persistence gateway for orders.
///
/// Implementations must make [`commit_order`](OrderStore::commit_order)
/// atomic: the stock decrement for every item and the order insert either
/// both happen or neither does.
#[async_trait]
pub trait OrderStore: Catalog + InventoryLedger {
    /// Reserves the order's stock and persists the order in one transaction.
    async fn commit_order(&self, order: &Order) -> Result<()>;

    /// Retrieves an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders placed by a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Retrieves the order carrying a tracking number.
    async fn order_by_tracking(&self, tracking_number: &str) -> Result<Option<Order>>;

    /// Writes a planned status change if the order is still at `expected`.
    ///
    /// Fails with `VersionConflict` otherwise. Returns the updated order.
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: Version,
        change: StatusChange,
    ) -> Result<Order>;

    /// Writes a planned payment change if the payment fields are still at
    /// `expected`. Returns the updated order.
    async fn update_payment(
        &self,
        order_id: OrderId,
        expected: Version,
        change: PaymentChange,
    ) -> Result<Order>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Retrieves an order, failing with `OrderNotFound` if it does not exist.
    async fn require_order(&self, order_id: OrderId) -> Result<Order> {
        self.get_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    /// Retrieves a product, failing with `ProductNotFound` if it does not exist.
    async fn require_product(&self, product_id: ProductId) -> Result<Product> {
        self.get_product(product_id)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))
    }
}

impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
