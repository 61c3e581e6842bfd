//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use serde::Serialize;

use crate::money::Money;
use crate::product::{Reservation, merge_reservations};

use super::value_objects::total_of;
use super::{
    OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ReturnRequest,
    ReturnStatus, ShippingAddress, StatusEvent,
};

/// Order aggregate root.
///
/// Only constructed by [`OrderBuilder`](super::OrderBuilder) or rehydrated
/// through [`Order::from_parts`], both of which check that the order has
/// items and that the recorded total equals the sum of its lines. After
/// that the only mutations are validated [`StatusChange`]s and
/// [`PaymentChange`]s, each guarded by its own version counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    total_amount: Money,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_reference: Option<String>,
    status: OrderStatus,
    tracking_number: Option<String>,
    shipping: ShippingAddress,
    return_request: Option<ReturnRequest>,
    created_at: DateTime<Utc>,

    /// Guards the fulfillment fields.
    version: Version,

    /// Guards the payment fields.
    payment_version: Version,
}

/// Raw stored fields of an order, used to rehydrate it from persistence.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub shipping: ShippingAddress,
    pub return_request: Option<ReturnRequest>,
    pub created_at: DateTime<Utc>,
    pub version: Version,
    pub payment_version: Version,
}

/// A checked fulfillment transition, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    from: OrderStatus,
    to: OrderStatus,
    event: &'static str,
    tracking_number: Option<String>,
    return_request: Option<ReturnRequest>,
}

impl StatusChange {
    pub fn from(&self) -> OrderStatus {
        self.from
    }

    pub fn to(&self) -> OrderStatus {
        self.to
    }

    /// Name of the event that produced this change.
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Tracking number to attach, if the event carries one.
    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    /// Return request to record, if the event carries one.
    pub fn return_request(&self) -> Option<&ReturnRequest> {
        self.return_request.as_ref()
    }
}

/// A checked payment-status update, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChange {
    from: PaymentStatus,
    to: PaymentStatus,
    reference: Option<String>,
}

impl PaymentChange {
    pub fn from(&self) -> PaymentStatus {
        self.from
    }

    pub fn to(&self) -> PaymentStatus {
        self.to
    }

    /// Provider reference to record, if any.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

// Construction
impl Order {
    pub(crate) fn placed(
        id: OrderId,
        user_id: UserId,
        items: Vec<OrderItem>,
        total_amount: Money,
        payment_method: PaymentMethod,
        shipping: ShippingAddress,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            items,
            total_amount,
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            status: OrderStatus::Placed,
            tracking_number: None,
            shipping,
            return_request: None,
            created_at,
            version: Version::first(),
            payment_version: Version::first(),
        }
    }

    /// Rehydrates a stored order, re-checking its structural invariants.
    pub fn from_parts(parts: OrderParts) -> Result<Self, OrderError> {
        if parts.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        let computed = total_of(&parts.items)?;
        if computed != parts.total_amount {
            return Err(OrderError::TotalMismatch {
                recorded: parts.total_amount,
                computed,
            });
        }

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            items: parts.items,
            total_amount: parts.total_amount,
            payment_method: parts.payment_method,
            payment_status: parts.payment_status,
            payment_reference: parts.payment_reference,
            status: parts.status,
            tracking_number: parts.tracking_number,
            shipping: parts.shipping,
            return_request: parts.return_request,
            created_at: parts.created_at,
            version: parts.version,
            payment_version: parts.payment_version,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn shipping(&self) -> &ShippingAddress {
        &self.shipping
    }

    pub fn return_request(&self) -> Option<&ReturnRequest> {
        self.return_request.as_ref()
    }

    pub fn return_status(&self) -> Option<ReturnStatus> {
        self.status.return_status()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Version of the fulfillment fields.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Version of the payment fields.
    pub fn payment_version(&self) -> Version {
        self.payment_version
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(OrderItem::quantity).sum()
    }

    /// Stock this order takes out of inventory, one entry per product.
    pub fn reservations(&self) -> Vec<Reservation> {
        merge_reservations(
            self.items
                .iter()
                .map(|item| Reservation::new(item.product_id(), item.quantity())),
        )
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Order {
    /// Checks `event` against the transition table and the event's own rules.
    pub fn plan_transition(
        &self,
        event: &StatusEvent,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, OrderError> {
        let to = self
            .status
            .target(event)
            .ok_or(OrderError::InvalidTransition {
                from: self.status,
                event: event.name(),
            })?;

        let mut change = StatusChange {
            from: self.status,
            to,
            event: event.name(),
            tracking_number: None,
            return_request: None,
        };

        match event {
            StatusEvent::Dispatch { tracking_number } => {
                let tracking_number = tracking_number.trim();
                if tracking_number.is_empty() {
                    return Err(OrderError::TrackingNumberRequired);
                }
                change.tracking_number = Some(tracking_number.to_string());
            }
            StatusEvent::RequestReturn { reason } => {
                change.return_request = Some(ReturnRequest::new(reason.as_str(), now)?);
            }
            StatusEvent::CompleteReturn {
                return_tracking_number,
            } => {
                change.return_request = self
                    .return_request
                    .clone()
                    .map(|r| r.completed(return_tracking_number.as_deref()));
            }
            StatusEvent::MarkDelivered => {}
        }

        Ok(change)
    }

    /// Writes a planned transition and bumps the fulfillment version.
    ///
    /// Persistence layers call this only after matching the expected version,
    /// so `change.from()` is the current status.
    pub fn apply_status_change(&mut self, change: StatusChange) {
        debug_assert_eq!(change.from, self.status);
        self.status = change.to;
        if let Some(tracking_number) = change.tracking_number {
            self.tracking_number = Some(tracking_number);
        }
        if let Some(return_request) = change.return_request {
            self.return_request = Some(return_request);
        }
        self.version = self.version.next();
    }

    /// Checks a payment callback against the payment status rules.
    pub fn plan_payment(
        &self,
        to: PaymentStatus,
        reference: Option<String>,
    ) -> Result<PaymentChange, OrderError> {
        if !self.payment_status.can_transition_to(to) {
            return Err(OrderError::InvalidPaymentTransition {
                from: self.payment_status,
                to,
            });
        }
        Ok(PaymentChange {
            from: self.payment_status,
            to,
            reference,
        })
    }

    /// Writes a planned payment update and bumps the payment version.
    pub fn apply_payment_change(&mut self, change: PaymentChange) {
        debug_assert_eq!(change.from, self.payment_status);
        self.payment_status = change.to;
        if let Some(reference) = change.reference {
            self.payment_reference = Some(reference);
        }
        self.payment_version = self.payment_version.next();
    }
}
