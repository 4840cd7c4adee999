//! HTTP route handlers.

pub mod enrollments;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod refunds;
pub mod trip_bookings;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a uuid-backed id from a path segment.
fn parse_id<T>(entity: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid {entity} id: {e}")))
}
