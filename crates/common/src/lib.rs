//! Shared identifier and version types used across the order engine crates.

mod types;

pub use types::{OrderId, ProductId, UserId, Version};
