use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId, Version};
use domain::{
    Money, Order, OrderItem, OrderParts, PaymentChange, Product, ProductUpdate, Reservation,
    ReturnRequest, ShippingAddress, StatusChange, merge_reservations,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Catalog, InventoryLedger, OrderStore},
};

const PRODUCT_COLUMNS: &str =
    "id, name, category, price_minor, stock, active, description, image_url";

const ORDER_COLUMNS: &str = "id, user_id, items, total_minor, payment_method, payment_status, \
     payment_reference, status, tracking_number, shipping, return_reason, return_requested_at, \
     return_tracking_number, created_at, version, payment_version";

/// Tuning for [`PostgresStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostgresStoreOptions {
    /// Bound on waiting for row locks, applied with `SET LOCAL lock_timeout`.
    pub lock_timeout: Duration,
}

impl Default for PostgresStoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// PostgreSQL-backed store.
///
/// Reservations lock the affected product rows with `SELECT ... FOR UPDATE`
/// in id order inside the same transaction that inserts the order.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    options: PostgresStoreOptions,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self::with_options(pool, PostgresStoreOptions::default())
    }

    /// Creates a store with custom lock settings.
    pub fn with_options(pool: PgPool, options: PostgresStoreOptions) -> Self {
        Self { pool, options }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Starts a transaction whose row-lock waits are bounded.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        let millis = self.options.lock_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Locks, re-checks and decrements stock for `reservations`.
    ///
    /// `reservations` must already be merged per product.
    async fn take_stock(
        tx: &mut Transaction<'static, Postgres>,
        reservations: &[Reservation],
    ) -> Result<()> {
        let ids: Vec<Uuid> = reservations
            .iter()
            .map(|reservation| reservation.product_id.as_uuid())
            .collect();

        let rows = sqlx::query(
            "SELECT id, stock, active FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_lock_error)?;

        let mut current = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = ProductId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let stock = stock_from_db(row.try_get("stock")?)?;
            let active: bool = row.try_get("active")?;
            current.insert(id, (stock, active));
        }

        for reservation in reservations {
            let (stock, active) = current
                .get(&reservation.product_id)
                .copied()
                .ok_or(StoreError::ProductNotFound(reservation.product_id))?;
            if !active {
                return Err(StoreError::ProductInactive(reservation.product_id));
            }
            if stock < reservation.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: reservation.product_id,
                    requested: reservation.quantity,
                    available: stock,
                });
            }
        }

        for reservation in reservations {
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
                .bind(reservation.product_id.as_uuid())
                .bind(i64::from(reservation.quantity))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Explains why a version-guarded update matched no row.
    async fn version_miss(
        &self,
        order_id: OrderId,
        expected: Version,
        column: &'static str,
    ) -> StoreError {
        let sql = format!("SELECT {column} FROM orders WHERE id = $1");
        let actual = sqlx::query_scalar::<_, i64>(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await;

        match actual {
            Ok(Some(actual)) => StoreError::VersionConflict {
                order_id,
                expected,
                actual: Version::new(actual),
            },
            Ok(None) => StoreError::OrderNotFound(order_id),
            Err(e) => StoreError::Database(e),
        }
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            price: Money::from_minor(row.try_get("price_minor")?),
            stock: stock_from_db(row.try_get("stock")?)?,
            active: row.try_get("active")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let items: Vec<OrderItem> = serde_json::from_value(row.try_get("items")?)?;
        let shipping: ShippingAddress = serde_json::from_value(row.try_get("shipping")?)?;

        let return_reason: Option<String> = row.try_get("return_reason")?;
        let return_requested_at: Option<DateTime<Utc>> = row.try_get("return_requested_at")?;
        let return_request = match (return_reason, return_requested_at) {
            (Some(reason), Some(requested_at)) => Some(ReturnRequest {
                reason,
                requested_at,
                return_tracking_number: row.try_get("return_tracking_number")?,
            }),
            _ => None,
        };

        let parts = OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items,
            total_amount: Money::from_minor(row.try_get("total_minor")?),
            payment_method: parse_column(row, "payment_method")?,
            payment_status: parse_column(row, "payment_status")?,
            payment_reference: row.try_get("payment_reference")?,
            status: parse_column(row, "status")?,
            tracking_number: row.try_get("tracking_number")?,
            shipping,
            return_request,
            created_at: row.try_get("created_at")?,
            version: Version::new(row.try_get("version")?),
            payment_version: Version::new(row.try_get("payment_version")?),
        };
        Ok(Order::from_parts(parts)?)
    }
}

fn stock_from_db(stock: i64) -> Result<u32> {
    u32::try_from(stock).map_err(|_| StoreError::Corrupt(format!("stock {stock} out of range")))
}

fn parse_column<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::Corrupt)
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

/// Lock timeouts and deadlocks become retryable `Conflict`s.
fn map_lock_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && matches!(db_err.code().as_deref(), Some("55P03") | Some("40P01"))
    {
        return StoreError::Conflict {
            resource: "products".to_string(),
        };
    }
    StoreError::Database(err)
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, price_minor, stock, active, description, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price.minor())
        .bind(i64::from(product.stock))
        .bind(product.active)
        .bind(&product.description)
        .bind(&product.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, "products_pkey") {
                return StoreError::DuplicateProduct(product.id);
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = product_ids.iter().map(ProductId::as_uuid).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows = sqlx::query(&sql).bind(&ids).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_product).collect()
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        let sql = format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                category = COALESCE($3, category),
                price_minor = COALESCE($4, price_minor),
                active = COALESCE($5, active),
                description = COALESCE($6, description),
                image_url = COALESCE($7, image_url)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let mut tx = self.begin().await?;
        let row = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .bind(update.name)
            .bind(update.category)
            .bind(update.price.map(|price| price.minor()))
            .bind(update.active)
            .bind(update.description)
            .bind(update.image_url)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_lock_error)?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let product = Self::row_to_product(&row)?;
        tx.commit().await?;
        Ok(product)
    }
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    #[tracing::instrument(skip(self, reservations), fields(lines = reservations.len()))]
    async fn reserve_all(&self, reservations: &[Reservation]) -> Result<()> {
        let merged = merge_reservations(reservations.iter().copied());
        if merged.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await?;
        Self::take_stock(&mut tx, &merged).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let sql = format!(
            "UPDATE products SET stock = stock + $2 \
             WHERE id = $1 AND stock + $2 <= $3 \
             RETURNING {PRODUCT_COLUMNS}"
        );

        let mut tx = self.begin().await?;
        let row = sqlx::query(&sql)
            .bind(product_id.as_uuid())
            .bind(i64::from(quantity))
            .bind(i64::from(u32::MAX))
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_lock_error)?;
        tx.commit().await?;

        match row {
            Some(row) => Self::row_to_product(&row),
            None => match self.get_product(product_id).await? {
                Some(_) => Err(StoreError::StockOverflow(product_id)),
                None => Err(StoreError::ProductNotFound(product_id)),
            },
        }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn commit_order(&self, order: &Order) -> Result<()> {
        let items = serde_json::to_value(order.items())?;
        let shipping = serde_json::to_value(order.shipping())?;

        let mut tx = self.begin().await?;
        Self::take_stock(&mut tx, &order.reservations()).await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_minor, payment_method, payment_status,
                                payment_reference, status, tracking_number, shipping,
                                created_at, version, payment_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(items)
        .bind(order.total_amount().minor())
        .bind(order.payment_method().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.payment_reference())
        .bind(order.status().as_str())
        .bind(order.tracking_number())
        .bind(shipping)
        .bind(order.created_at())
        .bind(order.version().as_i64())
        .bind(order.payment_version().as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if violates(&e, "orders_pkey") {
                return StoreError::DuplicateOrder(order.id());
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn order_by_tracking(&self, tracking_number: &str) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE tracking_number = $1");
        let row = sqlx::query(&sql)
            .bind(tracking_number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self, change), fields(to = %change.to()))]
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: Version,
        change: StatusChange,
    ) -> Result<Order> {
        let sql = format!(
            r#"
            UPDATE orders SET
                status = $3,
                tracking_number = COALESCE($4, tracking_number),
                return_reason = COALESCE($5, return_reason),
                return_requested_at = COALESCE($6, return_requested_at),
                return_tracking_number = COALESCE($7, return_tracking_number),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(expected.as_i64())
            .bind(change.to().as_str())
            .bind(change.tracking_number())
            .bind(change.return_request().map(|r| r.reason.as_str()))
            .bind(change.return_request().map(|r| r.requested_at))
            .bind(
                change
                    .return_request()
                    .and_then(|r| r.return_tracking_number.as_deref()),
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, "unique_tracking_number") {
                    return StoreError::DuplicateTrackingNumber(
                        change.tracking_number().unwrap_or_default().to_string(),
                    );
                }
                StoreError::Database(e)
            })?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => Err(self.version_miss(order_id, expected, "version").await),
        }
    }

    #[tracing::instrument(skip(self, change), fields(to = %change.to()))]
    async fn update_payment(
        &self,
        order_id: OrderId,
        expected: Version,
        change: PaymentChange,
    ) -> Result<Order> {
        let sql = format!(
            r#"
            UPDATE orders SET
                payment_status = $3,
                payment_reference = COALESCE($4, payment_reference),
                payment_version = payment_version + 1
            WHERE id = $1 AND payment_version = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .bind(expected.as_i64())
            .bind(change.to().as_str())
            .bind(change.reference())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_order(&row),
            None => Err(self.version_miss(order_id, expected, "payment_version").await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lock_timeout() {
        assert_eq!(
            PostgresStoreOptions::default().lock_timeout,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_stock_out_of_range_is_corrupt() {
        assert_eq!(stock_from_db(7).unwrap(), 7);
        assert!(matches!(stock_from_db(-1), Err(StoreError::Corrupt(_))));
        assert!(matches!(
            stock_from_db(i64::from(u32::MAX) + 1),
            Err(StoreError::Corrupt(_))
        ));
    }
}
