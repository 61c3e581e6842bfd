//! Persistence for the order engine.
//!
//! The [`InventoryLedger`] is the only writer of product stock. An order is
//! committed together with its stock decrement in one atomic step through
//! [`OrderStore::commit_order`], so no reader ever sees one without the other.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, MemoryStoreOptions};
pub use postgres::{PostgresStore, PostgresStoreOptions};
pub use store::{Catalog, InventoryLedger, OrderStore, OrderStoreExt};
