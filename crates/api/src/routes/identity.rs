//! Caller identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity in the `x-user-id` and `x-user-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use engine::{Actor, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request.
///
/// A missing role header means `Customer`.
pub struct Identity(pub Actor);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::MissingIdentity(format!("missing {USER_ID_HEADER} header")))?
            .parse::<UserId>()
            .map_err(|e| ApiError::MissingIdentity(format!("invalid {USER_ID_HEADER}: {e}")))?;

        let role = match header(parts, USER_ROLE_HEADER)? {
            Some(role) => role.parse::<Role>().map_err(ApiError::MissingIdentity)?,
            None => Role::default(),
        };

        Ok(Self(Actor::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::MissingIdentity(format!("{name} is not valid text")))
        })
        .transpose()
}
