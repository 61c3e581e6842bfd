use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId, Version};
use domain::{
    Order, PaymentChange, Product, ProductUpdate, Reservation, StatusChange, merge_reservations,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Catalog, InventoryLedger, OrderStore},
};

/// Tuning for [`InMemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreOptions {
    /// How long a reservation waits for each product lock before giving up
    /// with `Conflict`.
    pub lock_timeout: Duration,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Order>,
    /// Commit order, oldest first.
    committed: Vec<OrderId>,
    by_tracking: HashMap<String, OrderId>,
}

/// In-memory store for testing and development.
///
/// Each product sits behind its own async mutex. A reservation locks every
/// product it touches in ascending id order, re-checks stock, and only then
/// decrements, so orders over disjoint products never wait on each other
/// and overlapping ones cannot deadlock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Arc<Mutex<Product>>>>>,
    orders: Arc<RwLock<OrderTable>>,
    options: MemoryStoreOptions,
}

type LockedLine = (Reservation, OwnedMutexGuard<Product>);

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with custom lock settings.
    pub fn with_options(options: MemoryStoreOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the number of products in the catalog.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.orders.len()
    }

    async fn cell(&self, product_id: ProductId) -> Result<Arc<Mutex<Product>>> {
        self.products
            .read()
            .await
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn lock_with_timeout(
        &self,
        product_id: ProductId,
        cell: Arc<Mutex<Product>>,
    ) -> Result<OwnedMutexGuard<Product>> {
        tokio::time::timeout(self.options.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::Conflict {
                resource: format!("product {product_id}"),
            })
    }

    /// Locks every product in `reservations`, which must be sorted by id.
    async fn lock_lines(&self, reservations: Vec<Reservation>) -> Result<Vec<LockedLine>> {
        let mut cells = Vec::with_capacity(reservations.len());
        {
            let products = self.products.read().await;
            for reservation in reservations {
                let cell = products
                    .get(&reservation.product_id)
                    .cloned()
                    .ok_or(StoreError::ProductNotFound(reservation.product_id))?;
                cells.push((reservation, cell));
            }
        }

        let mut locked = Vec::with_capacity(cells.len());
        for (reservation, cell) in cells {
            let guard = self.lock_with_timeout(reservation.product_id, cell).await?;
            locked.push((reservation, guard));
        }
        Ok(locked)
    }

    /// Checks every locked line first, then decrements all of them.
    fn take_stock(locked: &mut [LockedLine]) -> Result<()> {
        for (reservation, product) in locked.iter() {
            if !product.active {
                return Err(StoreError::ProductInactive(product.id));
            }
            if product.stock < reservation.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: product.id,
                    requested: reservation.quantity,
                    available: product.stock,
                });
            }
        }
        for (reservation, product) in locked.iter_mut() {
            product.stock -= reservation.quantity;
        }
        Ok(())
    }

    fn claim_tracking(
        table: &OrderTable,
        order_id: OrderId,
        change: &StatusChange,
    ) -> Result<()> {
        if let Some(tracking_number) = change.tracking_number()
            && let Some(owner) = table.by_tracking.get(tracking_number)
            && *owner != order_id
        {
            return Err(StoreError::DuplicateTrackingNumber(
                tracking_number.to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(StoreError::DuplicateProduct(product.id));
        }
        products.insert(product.id, Arc::new(Mutex::new(product)));
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let cell = self.products.read().await.get(&product_id).cloned();
        match cell {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let cells: Vec<_> = {
            let products = self.products.read().await;
            product_ids
                .iter()
                .filter_map(|id| products.get(id).cloned())
                .collect()
        };

        let mut found = Vec::with_capacity(cells.len());
        for cell in cells {
            found.push(cell.lock().await.clone());
        }
        Ok(found)
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        let cell = self.cell(product_id).await?;
        let mut product = self.lock_with_timeout(product_id, cell).await?;
        update.apply_to(&mut product);
        Ok(product.clone())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    #[tracing::instrument(skip(self, reservations), fields(lines = reservations.len()))]
    async fn reserve_all(&self, reservations: &[Reservation]) -> Result<()> {
        let merged = merge_reservations(reservations.iter().copied());
        let mut locked = self.lock_lines(merged).await?;
        Self::take_stock(&mut locked)
    }

    #[tracing::instrument(skip(self))]
    async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let cell = self.cell(product_id).await?;
        let mut product = self.lock_with_timeout(product_id, cell).await?;
        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or(StoreError::StockOverflow(product_id))?;
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn commit_order(&self, order: &Order) -> Result<()> {
        let mut locked = self.lock_lines(order.reservations()).await?;

        // Product locks are always taken before the order table, never after.
        let mut table = self.orders.write().await;
        if table.orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateOrder(order.id()));
        }
        Self::take_stock(&mut locked)?;
        table.orders.insert(order.id(), order.clone());
        table.committed.push(order.id());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let table = self.orders.read().await;
        // Stable sort over newest-committed-first keeps equal timestamps in commit order.
        let mut orders: Vec<Order> = table
            .committed
            .iter()
            .rev()
            .filter_map(|id| table.orders.get(id))
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|order| std::cmp::Reverse(order.created_at()));
        Ok(orders)
    }

    async fn order_by_tracking(&self, tracking_number: &str) -> Result<Option<Order>> {
        let table = self.orders.read().await;
        Ok(table
            .by_tracking
            .get(tracking_number)
            .and_then(|id| table.orders.get(id))
            .cloned())
    }

    #[tracing::instrument(skip(self, change), fields(to = %change.to()))]
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: Version,
        change: StatusChange,
    ) -> Result<Order> {
        let mut table = self.orders.write().await;
        let actual = table
            .orders
            .get(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?
            .version();
        if actual != expected {
            return Err(StoreError::VersionConflict {
                order_id,
                expected,
                actual,
            });
        }
        Self::claim_tracking(&table, order_id, &change)?;

        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.apply_status_change(change);
        let updated = order.clone();
        if let Some(tracking_number) = updated.tracking_number() {
            table
                .by_tracking
                .insert(tracking_number.to_string(), order_id);
        }
        Ok(updated)
    }

    #[tracing::instrument(skip(self, change), fields(to = %change.to()))]
    async fn update_payment(
        &self,
        order_id: OrderId,
        expected: Version,
        change: PaymentChange,
    ) -> Result<Order> {
        let mut table = self.orders.write().await;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if order.payment_version() != expected {
            return Err(StoreError::VersionConflict {
                order_id,
                expected,
                actual: order.payment_version(),
            });
        }

        order.apply_payment_change(change);
        Ok(order.clone())
    }
}
