//! PostgreSQL integration tests
//!
//! These tests need Docker and use a shared PostgreSQL container, so they are
//! ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{ProductId, UserId, Version};
use domain::{
    CartLine, IntakeLimits, Money, Order, OrderBuilder, OrderStatus, PaymentMethod, PaymentStatus,
    Product, ProductUpdate, Reservation, ReturnStatus, ShippingAddress, StatusEvent,
    validate_cart,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{Catalog, InventoryLedger, OrderStore, OrderStoreExt, PostgresStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_catalog_and_orders.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Nikhil Das".to_string(),
        mobile: "9833333333".to_string(),
        address_line1: "3 Ring Road".to_string(),
        address_line2: Some("Block C".to_string()),
        city: "Delhi".to_string(),
        state: "Delhi".to_string(),
        pincode: "110001".to_string(),
    }
}

fn order_for(products: &[&Product], quantities: &[i64]) -> Order {
    let catalog: HashMap<ProductId, Product> =
        products.iter().map(|p| (p.id, (*p).clone())).collect();
    let lines: Vec<CartLine> = products
        .iter()
        .zip(quantities)
        .map(|(p, q)| CartLine::new(p.id, *q))
        .collect();
    let validated = validate_cart(&lines, &catalog, &IntakeLimits::default()).unwrap();
    OrderBuilder::new(UserId::new(), address(), PaymentMethod::Razorpay)
        .lines(validated)
        .build(Utc::now())
        .unwrap()
}

async fn seed(store: &PostgresStore, name: &str, stock: u32) -> Product {
    let product = Product::new(name, "Sarees", Money::from_minor(129_900), stock);
    store.insert_product(product.clone()).await.unwrap();
    product
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn product_round_trip_and_update() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 4).await;

    assert_eq!(store.require_product(product.id).await.unwrap(), product);
    assert!(matches!(
        store.insert_product(product.clone()).await,
        Err(StoreError::DuplicateProduct(_))
    ));

    let updated = store
        .update_product(
            product.id,
            ProductUpdate {
                price: Some(Money::from_minor(139_900)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, Money::from_minor(139_900));
    assert_eq!(updated.name, "Kanjivaram");
    assert_eq!(updated.stock, 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn commit_order_persists_snapshot() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 4).await;
    let order = order_for(&[&product], &[3]);

    store.commit_order(&order).await.unwrap();

    let stored = store.require_order(order.id()).await.unwrap();
    assert_eq!(stored.items(), order.items());
    assert_eq!(stored.total_amount(), Money::from_minor(389_700));
    assert_eq!(stored.shipping(), order.shipping());
    assert_eq!(stored.status(), OrderStatus::Placed);
    assert_eq!(store.require_product(product.id).await.unwrap().stock, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn insufficient_stock_rolls_back_every_line() {
    let store = get_test_store().await;
    let a = seed(&store, "A", 10).await;
    let b = seed(&store, "B", 5).await;

    let mut stale_b = b.clone();
    stale_b.stock = 50;
    let order = order_for(&[&a, &stale_b], &[2, 40]);

    assert!(matches!(
        store.commit_order(&order).await,
        Err(StoreError::InsufficientStock { product_id, requested: 40, available: 5 })
            if product_id == b.id
    ));
    assert_eq!(store.require_product(a.id).await.unwrap().stock, 10);
    assert_eq!(store.require_product(b.id).await.unwrap().stock, 5);
    assert!(store.get_order(order.id()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn concurrent_orders_do_not_oversell() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 5).await;

    let first = order_for(&[&product], &[3]);
    let second = order_for(&[&product], &[3]);
    let (a, b) = tokio::join!(store.commit_order(&first), store.commit_order(&second));

    assert!(a.is_ok() ^ b.is_ok());
    assert_eq!(store.require_product(product.id).await.unwrap().stock, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn status_and_payment_updates_are_version_checked() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 5).await;
    let order = order_for(&[&product], &[1]);
    store.commit_order(&order).await.unwrap();

    let change = order
        .plan_transition(
            &StatusEvent::Dispatch {
                tracking_number: "TRK-PG-1".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
    let dispatched = store
        .update_status(order.id(), Version::first(), change.clone())
        .await
        .unwrap();
    assert_eq!(dispatched.status(), OrderStatus::Dispatched);
    assert_eq!(dispatched.tracking_number(), Some("TRK-PG-1"));

    assert!(matches!(
        store.update_status(order.id(), Version::first(), change).await,
        Err(StoreError::VersionConflict { .. })
    ));

    let by_tracking = store.order_by_tracking("TRK-PG-1").await.unwrap().unwrap();
    assert_eq!(by_tracking.id(), order.id());

    let payment = order.plan_payment(PaymentStatus::Paid, Some("pay_9".to_string())).unwrap();
    let paid = store
        .update_payment(order.id(), Version::first(), payment)
        .await
        .unwrap();
    assert_eq!(paid.payment_status(), PaymentStatus::Paid);
    assert_eq!(paid.payment_reference(), Some("pay_9"));
    assert_eq!(paid.version(), Version::new(2));
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn return_record_persists_through_completion() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 5).await;
    let order = order_for(&[&product], &[1]);
    store.commit_order(&order).await.unwrap();

    let change = order
        .plan_transition(
            &StatusEvent::RequestReturn {
                reason: "loose threads".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
    let requested = store
        .update_status(order.id(), Version::first(), change)
        .await
        .unwrap();
    assert_eq!(requested.return_status(), Some(ReturnStatus::Requested));

    let change = requested
        .plan_transition(
            &StatusEvent::CompleteReturn {
                return_tracking_number: Some("RTN-PG-1".to_string()),
            },
            Utc::now(),
        )
        .unwrap();
    store
        .update_status(order.id(), requested.version(), change)
        .await
        .unwrap();

    let stored = store.require_order(order.id()).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Returned);
    assert_eq!(stored.return_status(), Some(ReturnStatus::Refunded));
    let record = stored.return_request().unwrap();
    assert_eq!(record.reason, "loose threads");
    assert_eq!(record.return_tracking_number.as_deref(), Some("RTN-PG-1"));
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn restock_and_reserve() {
    let store = get_test_store().await;
    let product = seed(&store, "Kanjivaram", 1).await;

    assert_eq!(store.restock(product.id, 4).await.unwrap().stock, 5);
    store
        .reserve_all(&[Reservation::new(product.id, 5)])
        .await
        .unwrap();
    assert!(matches!(
        store.reserve_all(&[Reservation::new(product.id, 1)]).await,
        Err(StoreError::InsufficientStock { available: 0, .. })
    ));
    assert!(matches!(
        store.restock(ProductId::new(), 1).await,
        Err(StoreError::ProductNotFound(_))
    ));
}
