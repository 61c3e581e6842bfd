//! Collaborator traits and in-memory implementations.

pub mod notification;
pub mod payment;

pub use notification::{InMemoryNotifier, Notification, Notifier};
pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
