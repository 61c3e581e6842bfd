//! Order intake and fulfillment flows.
//!
//! [`OrderEngine`] composes intake validation, the order builder and the
//! inventory ledger into a single placement call, and routes every later
//! status or payment change through the domain state machines with
//! optimistic version checks.
//!
//! Collaborators (notifications, payment provider) are passed in at
//! construction time as trait objects. Their failures never undo a
//! committed order; they come back as warnings on the result.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod services;

pub use auth::{Actor, Role};
pub use config::EngineConfig;
pub use engine::{OrderEngine, OrderOutcome, PlacedOrder};
pub use error::{EngineError, Result};
pub use services::{
    InMemoryNotifier, InMemoryPaymentGateway, Notification, Notifier, PaymentGateway,
    PaymentIntent,
};
