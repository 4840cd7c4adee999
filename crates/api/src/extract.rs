//! Request extractors.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use common::UserId;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Header carrying the caller's user id. Authentication happens upstream.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request acts.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("invalid {USER_ID_HEADER} header")))?;

        raw.trim()
            .parse()
            .map(CurrentUser)
            .map_err(|e| ApiError::BadRequest(format!("invalid {USER_ID_HEADER} header: {e}")))
    }
}

/// A JSON request body whose rejections answer like any other validation
/// failure: 400 with an `{error, kind}` body.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
