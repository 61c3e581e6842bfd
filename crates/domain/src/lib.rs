//! Domain layer for the order-intake and inventory engine.
//!
//! This crate provides:
//! - `Money` and catalog `Product` types
//! - Cart validation against a product snapshot
//! - The `OrderBuilder` that freezes validated lines into a priced `Order`
//! - The fulfillment state machine (`OrderStatus` + `StatusEvent`) and the
//!   orthogonal `PaymentStatus`

pub mod money;
pub mod order;
pub mod product;

pub use money::Money;
pub use order::{
    CartLine, IntakeLimits, Order, OrderBuilder, OrderError, OrderItem, OrderParts, OrderStatus,
    PaymentChange, PaymentMethod, PaymentStatus, PlaceOrder, RecordPayment, RequestReturn,
    ReturnRequest, ReturnStatus, ShippingAddress, StatusChange, StatusEvent, TransitionOrder,
    ValidatedLine, validate_cart, validate_order,
};
pub use product::{Product, ProductUpdate, Reservation, merge_reservations};
