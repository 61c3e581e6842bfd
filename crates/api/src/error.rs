//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::EngineError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or body from the client.
    BadRequest(String),
    /// No usable caller identity on the request.
    MissingIdentity(String),
    /// Rejection or failure from the order engine.
    Engine(EngineError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::MissingIdentity(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Engine(err) => {
                let kind = err.kind();
                (status_for_kind(kind), kind)
            }
        }
    }
}

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "validation_error" => StatusCode::BAD_REQUEST,
        "product_not_found" | "order_not_found" => StatusCode::NOT_FOUND,
        "product_inactive" | "insufficient_stock" => StatusCode::UNPROCESSABLE_ENTITY,
        "invalid_transition" | "version_conflict" | "conflict" | "duplicate" => {
            StatusCode::CONFLICT
        }
        "unauthorized" => StatusCode::FORBIDDEN,
        "collaborator_failure" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::MissingIdentity(msg) => msg,
            ApiError::Engine(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, kind, "internal server error");
        }

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId, Version};
    use domain::{OrderError, OrderStatus};
    use store::StoreError;

    use super::*;

    fn status_of(err: EngineError) -> StatusCode {
        ApiError::from(err).status_and_kind().0
    }

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let product_id = ProductId::new();
        assert_eq!(
            status_of(OrderError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::OrderNotFound(OrderId::new()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                OrderError::InsufficientStock {
                    line: 1,
                    product_id,
                    requested: 3,
                    available: 2
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(
                OrderError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    event: "dispatch"
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                StoreError::VersionConflict {
                    order_id: OrderId::new(),
                    expected: Version::new(1),
                    actual: Version::new(2)
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(EngineError::Unauthorized("nope".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(StoreError::Corrupt("bad row".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_errors() {
        assert_eq!(
            ApiError::BadRequest("bad id".to_string()).status_and_kind(),
            (StatusCode::BAD_REQUEST, "validation_error")
        );
        assert_eq!(
            ApiError::MissingIdentity("no user".to_string()).status_and_kind(),
            (StatusCode::UNAUTHORIZED, "unauthenticated")
        );
    }
}
