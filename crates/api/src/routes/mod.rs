//! HTTP route handlers.

pub mod health;
pub mod identity;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use engine::OrderEngine;
use store::OrderStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub engine: OrderEngine<S>,
}

fn parse_id<T>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}
