use super::error::ApiError;
use crate::errors::Error;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the id of the user whose ledger a request addresses.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner id taken from the `X-Owner-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .ok_or(ApiError::Core(Error::MissingOwner))
    }
}
