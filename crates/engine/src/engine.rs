//! The order engine: placement, queries and status/payment changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{OrderId, ProductId, UserId, Version};
use domain::{
    Money, Order, OrderBuilder, PlaceOrder, Product, ProductUpdate, RecordPayment, RequestReturn,
    StatusChange, StatusEvent, TransitionOrder, validate_order,
};
use serde::Serialize;
use store::{OrderStore, OrderStoreExt, StoreError};

use crate::auth::Actor;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::services::{Notification, Notifier, PaymentGateway, PaymentIntent};

/// A committed order with whatever the collaborators managed to add.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    /// Present for methods that pay through the provider, if it answered.
    pub payment_intent: Option<PaymentIntent>,
    /// Collaborator failures that did not affect the commit.
    pub warnings: Vec<String>,
}

/// An order after a status change, plus collaborator warnings.
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub order: Order,
    pub warnings: Vec<String>,
}

/// Entry point for every order operation.
///
/// Placement reads a fresh catalog snapshot, validates and prices the cart,
/// then hands the order to [`OrderStore::commit_order`], which reserves
/// stock and inserts the order atomically. If the commit loses a race
/// (lock contention or stock gone since the snapshot) the whole
/// read-validate-commit cycle is retried a bounded number of times.
pub struct OrderEngine<S: OrderStore> {
    store: S,
    notifier: Arc<dyn Notifier>,
    payments: Arc<dyn PaymentGateway>,
    config: EngineConfig,
}

impl<S: OrderStore> OrderEngine<S> {
    /// Creates a new engine over `store` with the given collaborators.
    pub fn new(
        store: S,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            payments,
            config,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates, prices and commits an order.
    ///
    /// On success stock for every line has been reserved and the order is
    /// `Placed`. On failure nothing was reserved and no order exists.
    #[tracing::instrument(skip(self, actor, cmd), fields(user_id = %cmd.user_id, lines = cmd.lines.len()))]
    pub async fn place_order(&self, actor: &Actor, cmd: PlaceOrder) -> Result<PlacedOrder> {
        let started = Instant::now();
        let result = self.try_place_order(actor, cmd).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id(),
                    total = %placed.order.total_amount(),
                    warnings = placed.warnings.len(),
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_rejections_total", "reason" => e.kind()).increment(1);
                if matches!(e, EngineError::Store(s) if s.is_persistence_failure()) {
                    tracing::error!(error = %e, "order placement failed");
                } else {
                    tracing::info!(reason = e.kind(), error = %e, "order rejected");
                }
            }
        }
        result
    }

    async fn try_place_order(&self, actor: &Actor, cmd: PlaceOrder) -> Result<PlacedOrder> {
        if !actor.can_act_for(cmd.user_id) {
            return Err(EngineError::unauthorized("place orders for another user"));
        }

        let order = self.commit_with_retry(&cmd).await?;

        let mut warnings = Vec::new();
        let payment_intent = self.request_payment_intent(&order, &mut warnings).await;
        self.notify(
            Notification::OrderPlaced {
                order_id: order.id(),
                user_id: order.user_id(),
                total: order.total_amount(),
            },
            &mut warnings,
        )
        .await;

        Ok(PlacedOrder {
            order,
            payment_intent,
            warnings,
        })
    }

    async fn commit_with_retry(&self, cmd: &PlaceOrder) -> Result<Order> {
        let limits = self.config.intake_limits();
        let order_id = OrderId::new();
        let product_ids = cmd.product_ids();
        let mut attempt = 1;

        loop {
            let products: HashMap<ProductId, Product> = self
                .store
                .get_products(&product_ids)
                .await?
                .into_iter()
                .map(|product| (product.id, product))
                .collect();

            let lines = validate_order(cmd, &products, &limits)?;
            let order = OrderBuilder::new(cmd.user_id, cmd.shipping.clone(), cmd.payment_method)
                .order_id(order_id)
                .lines(lines)
                .build(Utc::now())?;

            match self.store.commit_order(&order).await {
                Ok(()) => return Ok(order),
                Err(err) if lost_race(&err) && attempt < self.config.reservation_attempts => {
                    metrics::counter!("reservation_retries_total").increment(1);
                    tracing::warn!(
                        %order_id,
                        attempt,
                        error = %err,
                        "reservation lost a race, retrying"
                    );
                    tokio::time::sleep(self.config.reservation_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn request_payment_intent(
        &self,
        order: &Order,
        warnings: &mut Vec<String>,
    ) -> Option<PaymentIntent> {
        if !order.payment_method().requires_intent() {
            return None;
        }

        let created = tokio::time::timeout(
            self.config.payment_timeout,
            self.payments
                .create_intent(order.id(), order.total_amount(), &self.config.currency),
        )
        .await;

        match created {
            Ok(Ok(intent)) => {
                tracing::info!(
                    order_id = %order.id(),
                    intent_id = %intent.intent_id,
                    "payment intent created"
                );
                Some(intent)
            }
            Ok(Err(e)) => {
                collaborator_failed(
                    "payment",
                    format!("payment intent not created: {e}"),
                    warnings,
                );
                None
            }
            Err(_) => {
                collaborator_failed(
                    "payment",
                    "payment intent timed out".to_string(),
                    warnings,
                );
                None
            }
        }
    }

    async fn notify(&self, notification: Notification, warnings: &mut Vec<String>) {
        let kind = notification.kind();
        let sent = tokio::time::timeout(
            self.config.notification_timeout,
            self.notifier.notify(notification),
        )
        .await;

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => collaborator_failed(
                "notification",
                format!("{kind} notification failed: {e}"),
                warnings,
            ),
            Err(_) => collaborator_failed(
                "notification",
                format!("{kind} notification timed out"),
                warnings,
            ),
        }
    }
}

// Queries
impl<S: OrderStore> OrderEngine<S> {
    /// Retrieves an order visible to `actor`.
    #[tracing::instrument(skip(self, actor))]
    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let order = self.store.require_order(order_id).await?;
        if !actor.can_act_for(order.user_id()) {
            return Err(EngineError::unauthorized("view this order"));
        }
        Ok(order)
    }

    /// Retrieves a user's orders, newest first.
    #[tracing::instrument(skip(self, actor))]
    pub async fn orders_for_user(&self, actor: &Actor, user_id: UserId) -> Result<Vec<Order>> {
        if !actor.can_act_for(user_id) {
            return Err(EngineError::unauthorized("list another user's orders"));
        }
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Retrieves the order carrying `tracking_number`.
    #[tracing::instrument(skip(self, actor))]
    pub async fn order_by_tracking(&self, actor: &Actor, tracking_number: &str) -> Result<Order> {
        let tracking_number = tracking_number.trim();
        let order = self
            .store
            .order_by_tracking(tracking_number)
            .await?
            .ok_or_else(|| EngineError::TrackingNumberNotFound(tracking_number.to_string()))?;
        if !actor.can_act_for(order.user_id()) {
            return Err(EngineError::unauthorized("view this order"));
        }
        Ok(order)
    }
}

// Status and payment changes
impl<S: OrderStore> OrderEngine<S> {
    /// Applies a fulfillment event on behalf of staff.
    ///
    /// Fails with `VersionConflict` if the order moved past
    /// `cmd.expected_version`; the caller must re-read before retrying.
    #[tracing::instrument(skip(self, actor, cmd), fields(order_id = %cmd.order_id, event = cmd.event.name()))]
    pub async fn transition(&self, actor: &Actor, cmd: TransitionOrder) -> Result<OrderOutcome> {
        if !actor.is_staff() {
            return Err(EngineError::unauthorized("change order status"));
        }

        let order = self.store.require_order(cmd.order_id).await?;
        ensure_version(cmd.order_id, cmd.expected_version, order.version())?;
        let change = order.plan_transition(&cmd.event, Utc::now())?;
        let order = self
            .write_status(cmd.order_id, cmd.expected_version, change)
            .await?;

        let mut warnings = Vec::new();
        if let (StatusEvent::Dispatch { .. }, Some(tracking_number)) =
            (&cmd.event, order.tracking_number())
        {
            self.notify(
                Notification::OrderDispatched {
                    order_id: order.id(),
                    user_id: order.user_id(),
                    tracking_number: tracking_number.to_string(),
                },
                &mut warnings,
            )
            .await;
        }

        Ok(OrderOutcome { order, warnings })
    }

    /// Moves an order into `ReturnRequested` on behalf of its owner or staff.
    ///
    /// The engine picks the version itself, so a lost version race is
    /// retried against a fresh read a bounded number of times.
    #[tracing::instrument(skip(self, actor, cmd), fields(order_id = %cmd.order_id))]
    pub async fn request_return(&self, actor: &Actor, cmd: RequestReturn) -> Result<Order> {
        let event = StatusEvent::RequestReturn { reason: cmd.reason };
        let mut attempt = 1;

        loop {
            let order = self.store.require_order(cmd.order_id).await?;
            if !actor.can_act_for(order.user_id()) {
                return Err(EngineError::unauthorized("return this order"));
            }

            let change = order.plan_transition(&event, Utc::now())?;
            match self.write_status(order.id(), order.version(), change).await {
                Err(EngineError::Store(StoreError::VersionConflict { .. }))
                    if attempt < self.config.status_update_attempts =>
                {
                    tracing::warn!(attempt, "return request lost a version race, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Records a payment provider callback.
    #[tracing::instrument(skip(self, actor, cmd), fields(order_id = %cmd.order_id, status = %cmd.status))]
    pub async fn record_payment(&self, actor: &Actor, cmd: RecordPayment) -> Result<Order> {
        if !actor.is_staff() {
            return Err(EngineError::unauthorized("record payments"));
        }

        let order = self.store.require_order(cmd.order_id).await?;
        ensure_version(cmd.order_id, cmd.expected_version, order.payment_version())?;
        let change = order.plan_payment(cmd.status, cmd.reference)?;
        let order = self
            .store
            .update_payment(cmd.order_id, cmd.expected_version, change)
            .await?;

        metrics::counter!("payment_updates_total", "status" => cmd.status.as_str()).increment(1);
        tracing::info!(payment_version = %order.payment_version(), "payment status recorded");
        Ok(order)
    }

    async fn write_status(
        &self,
        order_id: OrderId,
        expected: Version,
        change: StatusChange,
    ) -> Result<Order> {
        let (from, to) = (change.from(), change.to());
        let order = self.store.update_status(order_id, expected, change).await?;

        metrics::counter!("order_transitions_total", "from" => from.as_str(), "to" => to.as_str())
            .increment(1);
        tracing::info!(%order_id, %from, %to, version = %order.version(), "order status changed");
        Ok(order)
    }
}

// Catalog
impl<S: OrderStore> OrderEngine<S> {
    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, actor, product), fields(product_id = %product.id))]
    pub async fn create_product(&self, actor: &Actor, product: Product) -> Result<Product> {
        if !actor.is_staff() {
            return Err(EngineError::unauthorized("manage the catalog"));
        }
        check_catalog_fields(
            product.id,
            Some(&product.name),
            Some(&product.category),
            Some(product.price),
        )?;

        self.store.insert_product(product.clone()).await?;
        tracing::info!(stock = product.stock, "product created");
        Ok(product)
    }

    /// Retrieves a product.
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        Ok(self.store.require_product(product_id).await?)
    }

    /// Edits a product's descriptive fields.
    #[tracing::instrument(skip(self, actor, update))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        if !actor.is_staff() {
            return Err(EngineError::unauthorized("manage the catalog"));
        }
        check_catalog_fields(
            product_id,
            update.name.as_deref(),
            update.category.as_deref(),
            update.price,
        )?;

        Ok(self.store.update_product(product_id, update).await?)
    }

    /// Adds stock through the inventory ledger.
    #[tracing::instrument(skip(self, actor))]
    pub async fn restock(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Product> {
        if !actor.is_staff() {
            return Err(EngineError::unauthorized("manage the catalog"));
        }
        if quantity == 0 {
            return Err(EngineError::InvalidProduct {
                product_id,
                reason: "restock quantity must be positive",
            });
        }

        let product = self.store.restock(product_id, quantity).await?;
        tracing::info!(stock = product.stock, "product restocked");
        Ok(product)
    }
}

/// Errors after which re-reading the catalog may let the order through.
fn lost_race(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Conflict { .. }
            | StoreError::InsufficientStock { .. }
            | StoreError::ProductInactive(_)
    )
}

fn ensure_version(order_id: OrderId, expected: Version, actual: Version) -> Result<()> {
    if expected != actual {
        return Err(StoreError::VersionConflict {
            order_id,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn check_catalog_fields(
    product_id: ProductId,
    name: Option<&str>,
    category: Option<&str>,
    price: Option<Money>,
) -> Result<()> {
    let reason = if name.is_some_and(|n| n.trim().is_empty()) {
        "name is required"
    } else if category.is_some_and(|c| c.trim().is_empty()) {
        "category is required"
    } else if price.is_some_and(|p| !p.is_positive()) {
        "price must be positive"
    } else {
        return Ok(());
    };
    Err(EngineError::InvalidProduct { product_id, reason })
}

fn collaborator_failed(collaborator: &'static str, message: String, warnings: &mut Vec<String>) {
    metrics::counter!("collaborator_failures_total", "collaborator" => collaborator).increment(1);
    tracing::warn!(collaborator, warning = %message, "collaborator call failed");
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_race_covers_stale_reads_only() {
        let product_id = ProductId::new();
        assert!(lost_race(&StoreError::Conflict {
            resource: "products".to_string()
        }));
        assert!(lost_race(&StoreError::InsufficientStock {
            product_id,
            requested: 3,
            available: 2
        }));
        assert!(!lost_race(&StoreError::ProductNotFound(product_id)));
        assert!(!lost_race(&StoreError::Corrupt("bad row".to_string())));
    }

    #[test]
    fn test_catalog_field_checks() {
        let id = ProductId::new();
        assert!(
            check_catalog_fields(id, Some("Saree"), Some("Sarees"), Some(Money::from_major(1)))
                .is_ok()
        );
        assert!(check_catalog_fields(id, None, None, None).is_ok());
        assert!(matches!(
            check_catalog_fields(id, Some("  "), None, None),
            Err(EngineError::InvalidProduct { reason: "name is required", .. })
        ));
        assert!(matches!(
            check_catalog_fields(id, None, None, Some(Money::zero())),
            Err(EngineError::InvalidProduct { reason: "price must be positive", .. })
        ));
    }

    #[test]
    fn test_ensure_version() {
        let id = OrderId::new();
        assert!(ensure_version(id, Version::first(), Version::first()).is_ok());
        assert!(matches!(
            ensure_version(id, Version::first(), Version::new(2)),
            Err(EngineError::Store(StoreError::VersionConflict { .. }))
        ));
    }
}
