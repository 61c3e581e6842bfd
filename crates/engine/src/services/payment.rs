//! Payment provider trait and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::Money;
use serde::Serialize;

use crate::error::EngineError;

/// Provider-side payment order the client completes checkout against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    /// Identifier assigned by the payment provider.
    pub intent_id: String,
    /// Amount in minor currency units.
    pub amount: Money,
    pub currency: String,
    /// Our reference, the order id.
    pub receipt: String,
}

/// Trait for the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for a committed order.
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<PaymentIntent, EngineError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: Vec<PaymentIntent>,
    next_id: u32,
    fail_on_create: bool,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPaymentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to fail every intent request.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Makes every intent request wait `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Returns the number of intents created.
    pub fn intent_count(&self) -> usize {
        self.state().intents.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<PaymentIntent, EngineError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();

        if state.fail_on_create {
            return Err(EngineError::PaymentGateway(
                "provider unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let intent = PaymentIntent {
            intent_id: format!("order_{:04}", state.next_id),
            amount,
            currency: currency.to_string(),
            receipt: order_id.to_string(),
        };
        state.intents.push(intent.clone());

        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_intent_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let order_id = OrderId::new();

        let first = gateway
            .create_intent(order_id, Money::from_major(5), "INR")
            .await
            .unwrap();
        let second = gateway
            .create_intent(order_id, Money::from_major(5), "INR")
            .await
            .unwrap();

        assert_eq!(first.intent_id, "order_0001");
        assert_eq!(second.intent_id, "order_0002");
        assert_eq!(first.receipt, order_id.to_string());
        assert_eq!(first.amount.minor(), 500);
        assert_eq!(gateway.intent_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(true);

        let result = gateway
            .create_intent(OrderId::new(), Money::from_major(5), "INR")
            .await;
        assert!(matches!(result, Err(EngineError::PaymentGateway(_))));
        assert_eq!(gateway.intent_count(), 0);
    }
}
