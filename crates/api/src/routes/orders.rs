//! Order placement, query and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId, Version};
use domain::{
    CartLine, Order, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrder, RecordPayment,
    RequestReturn, ReturnStatus, ShippingAddress, StatusEvent, TransitionOrder,
};
use engine::{OrderOutcome, PaymentIntent, PlacedOrder};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use super::identity::Identity;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    /// Defaults to the caller. Staff may place orders on behalf of a user.
    pub user_id: Option<String>,
    pub items: Vec<CartLineRequest>,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    #[serde(flatten)]
    pub event: StatusEvent,
    pub expected_version: i64,
}

#[derive(Deserialize)]
pub struct ReturnRequestBody {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct PaymentCallbackRequest {
    pub status: PaymentStatus,
    pub expected_version: i64,
    pub reference: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total_minor: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping: ShippingAddress,
    pub return_reason: Option<String>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub return_status: Option<ReturnStatus>,
    pub return_tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
    pub payment_version: i64,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub unit_price_minor: i64,
    pub quantity: u32,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id().to_string(),
                    product_name: item.product_name().to_string(),
                    unit_price_minor: item.unit_price().minor(),
                    quantity: item.quantity(),
                })
                .collect(),
            total_minor: order.total_amount().minor(),
            payment_method: order.payment_method(),
            payment_status: order.payment_status(),
            payment_reference: order.payment_reference().map(String::from),
            tracking_number: order.tracking_number().map(String::from),
            shipping: order.shipping().clone(),
            return_reason: order.return_request().map(|r| r.reason.clone()),
            return_requested_at: order.return_request().map(|r| r.requested_at),
            return_status: order.return_status(),
            return_tracking_number: order
                .return_request()
                .and_then(|r| r.return_tracking_number.clone()),
            created_at: order.created_at(),
            version: order.version().as_i64(),
            payment_version: order.payment_version().as_i64(),
        }
    }
}

#[derive(Serialize)]
pub struct PlacedOrderResponse {
    pub order: OrderResponse,
    pub payment_intent: Option<PaymentIntent>,
    pub warnings: Vec<String>,
}

impl From<PlacedOrder> for PlacedOrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            order: OrderResponse::from(&placed.order),
            payment_intent: placed.payment_intent,
            warnings: placed.warnings,
        }
    }
}

#[derive(Serialize)]
pub struct OrderOutcomeResponse {
    pub order: OrderResponse,
    pub warnings: Vec<String>,
}

impl From<OrderOutcome> for OrderOutcomeResponse {
    fn from(outcome: OrderOutcome) -> Self {
        Self {
            order: OrderResponse::from(&outcome.order),
            warnings: outcome.warnings,
        }
    }
}

// -- Handlers --

/// POST /orders: validate, reserve and commit an order.
#[tracing::instrument(skip(state, actor, req))]
pub async fn place<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrderResponse>), ApiError> {
    let user_id = match req.user_id.as_deref() {
        Some(raw) => parse_id::<UserId>("user", raw)?,
        None => actor.user_id,
    };
    let lines = req
        .items
        .iter()
        .map(|line| -> Result<CartLine, ApiError> {
            let product_id: ProductId = parse_id("product", &line.product_id)?;
            Ok(CartLine::new(product_id, line.quantity))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cmd = PlaceOrder::new(user_id, lines, req.shipping, req.payment_method);
    let placed = state.engine.place_order(&actor, cmd).await?;

    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders/{id}: read an order.
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.engine.get_order(&actor, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/track/{tracking}: read an order by its tracking number.
#[tracing::instrument(skip(state, actor))]
pub async fn track<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(tracking): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.engine.order_by_tracking(&actor, &tracking).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /users/{id}/orders: a user's orders, newest first.
#[tracing::instrument(skip(state, actor))]
pub async fn list_for_user<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id: UserId = parse_id("user", &id)?;
    let orders = state.engine.orders_for_user(&actor, user_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// POST /orders/{id}/transitions: apply a fulfillment event.
#[tracing::instrument(skip(state, actor, req))]
pub async fn transition<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderOutcomeResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let cmd = TransitionOrder::new(order_id, req.event, Version::new(req.expected_version));
    let outcome = state.engine.transition(&actor, cmd).await?;
    Ok(Json(outcome.into()))
}

/// POST /orders/{id}/return: ask to send an order back.
#[tracing::instrument(skip(state, actor, req))]
pub async fn request_return<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(req): Json<ReturnRequestBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state
        .engine
        .request_return(&actor, RequestReturn::new(order_id, req.reason))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/payment: payment provider callback.
#[tracing::instrument(skip(state, actor, req))]
pub async fn record_payment<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(req): Json<PaymentCallbackRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let cmd = RecordPayment::new(
        order_id,
        req.status,
        Version::new(req.expected_version),
        req.reference,
    );
    let order = state.engine.record_payment(&actor, cmd).await?;
    Ok(Json(OrderResponse::from(&order)))
}
