//! Notification collaborator trait and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::Money;

use crate::error::EngineError;

/// A message to the customer about their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The order was committed.
    OrderPlaced {
        order_id: OrderId,
        user_id: UserId,
        total: Money,
    },
    /// A tracking number was attached and the order shipped.
    OrderDispatched {
        order_id: OrderId,
        user_id: UserId,
        tracking_number: String,
    },
}

impl Notification {
    /// Short name, used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced { .. } => "order_placed",
            Notification::OrderDispatched { .. } => "order_dispatched",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            Notification::OrderPlaced { order_id, .. }
            | Notification::OrderDispatched { order_id, .. } => *order_id,
        }
    }
}

/// Trait for delivering customer notifications (email, SMS).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a notification.
    async fn notify(&self, notification: Notification) -> Result<(), EngineError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail_on_notify: bool,
    delay: Option<Duration>,
}

/// In-memory notifier for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the notifier to fail every call.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.state().fail_on_notify = fail;
    }

    /// Makes every call wait `delay` before delivering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Returns the notifications delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state().sent.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), EngineError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fail_on_notify {
            return Err(EngineError::Notification(format!(
                "mail server rejected {} for order {}",
                notification.kind(),
                notification.order_id()
            )));
        }
        tracing::debug!(
            kind = notification.kind(),
            order_id = %notification.order_id(),
            "notification sent"
        );
        state.sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed() -> Notification {
        Notification::OrderPlaced {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            total: Money::from_major(10),
        }
    }

    #[tokio::test]
    async fn test_records_sent() {
        let notifier = InMemoryNotifier::new();
        let notification = placed();
        notifier.notify(notification.clone()).await.unwrap();
        assert_eq!(notifier.sent(), vec![notification]);
    }

    #[tokio::test]
    async fn test_fail_on_notify() {
        let notifier = InMemoryNotifier::new();
        notifier.set_fail_on_notify(true);
        let result = notifier.notify(placed()).await;
        assert!(matches!(result, Err(EngineError::Notification(_))));
        assert!(notifier.sent().is_empty());
    }
}
