//! Order fulfillment state machine.

use serde::{Deserialize, Serialize};

/// The fulfillment state of an order.
///
/// State transitions:
/// ```text
/// Placed ──dispatch──► Dispatched ──mark_delivered──► Delivered
///   │                      │                              │
///   └──────────────────────┴──────request_return──────────┘
///                                      │
///                                      ▼
///                              ReturnRequested ──complete_return──► Returned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Stock reserved and order committed.
    #[default]
    Placed,

    /// Handed to the carrier with a tracking number.
    Dispatched,

    /// Received by the customer.
    Delivered,

    /// Customer asked to send the goods back.
    ReturnRequested,

    /// Return accepted and refunded (terminal state).
    Returned,
}

/// Progress of a customer return, derived from the order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnStatus {
    /// Waiting for the goods to come back.
    Requested,

    /// Goods received and money returned.
    Refunded,
}

/// An event that asks the state machine to move an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Attach a tracking number and hand over to the carrier.
    Dispatch { tracking_number: String },

    /// Carrier confirmed delivery.
    MarkDelivered,

    /// Customer requests a return.
    RequestReturn { reason: String },

    /// Return accepted and refunded. The carrier number of the inbound
    /// parcel is kept on the return record when given.
    CompleteReturn {
        #[serde(default)]
        return_tracking_number: Option<String>,
    },
}

impl StatusEvent {
    /// Returns the event name used in errors, logs and the HTTP surface.
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::Dispatch { .. } => "dispatch",
            StatusEvent::MarkDelivered => "mark_delivered",
            StatusEvent::RequestReturn { .. } => "request_return",
            StatusEvent::CompleteReturn { .. } => "complete_return",
        }
    }
}

impl OrderStatus {
    /// All states, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::ReturnRequested,
        OrderStatus::Returned,
    ];

    /// Looks up the transition table.
    ///
    /// Returns the target state, or `None` when the (state, event) pair has
    /// no row in the table.
    pub fn target(&self, event: &StatusEvent) -> Option<OrderStatus> {
        use OrderStatus::*;

        match (self, event) {
            (Placed, StatusEvent::Dispatch { .. }) => Some(Dispatched),
            (Dispatched, StatusEvent::MarkDelivered) => Some(Delivered),
            (Placed | Dispatched | Delivered, StatusEvent::RequestReturn { .. }) => {
                Some(ReturnRequested)
            }
            (ReturnRequested, StatusEvent::CompleteReturn { .. }) => Some(Returned),
            _ => None,
        }
    }

    /// Returns true if some event moves this state directly to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, target),
            (Placed, Dispatched)
                | (Dispatched, Delivered)
                | (Placed | Dispatched | Delivered, ReturnRequested)
                | (ReturnRequested, Returned)
        )
    }

    /// Returns true if a return may be requested in this state.
    pub fn can_request_return(&self) -> bool {
        matches!(
            self,
            OrderStatus::Placed | OrderStatus::Dispatched | OrderStatus::Delivered
        )
    }

    /// Returns the return progress, or `None` if no return is open.
    pub fn return_status(&self) -> Option<ReturnStatus> {
        match self {
            OrderStatus::ReturnRequested => Some(ReturnStatus::Requested),
            OrderStatus::Returned => Some(ReturnStatus::Refunded),
            _ => None,
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Returned)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Dispatched => "Dispatched",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::ReturnRequested => "ReturnRequested",
            OrderStatus::Returned => "Returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{s}'"))
    }
}
