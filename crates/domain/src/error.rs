//! Booking error types.

use store::StoreError;
use thiserror::Error;

/// The finite resources whose capacity the ledger enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Inventory,
    Session,
    Trip,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Inventory => "inventory",
            Resource::Session => "course session",
            Resource::Trip => "trip",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during booking operations.
///
/// Every variant carries a message fit for showing to the user.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The request is malformed or empty.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced row does not exist (or, for trips, is not bookable).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request contradicts current state: a duplicate active
    /// reservation, an already-cancelled enrollment, an already-decided
    /// refund, or a cancellation outside the notice window.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The resource has no capacity left for this reservation.
    #[error("{resource} {id} is full: requested {requested}, available {available}")]
    CapacityExceeded {
        resource: Resource,
        id: String,
        requested: i64,
        available: i64,
    },

    /// The caller does not own the row it is acting on.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The underlying store failed.
    #[error("Database error: {0}")]
    Database(StoreError),
}

impl BookingError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns a stable snake_case name for the error kind, used in API
    /// responses and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation",
            BookingError::NotFound { .. } => "not_found",
            BookingError::Conflict(_) => "conflict",
            BookingError::CapacityExceeded { .. } => "capacity_exceeded",
            BookingError::Authorization(_) => "authorization",
            BookingError::Database(_) => "database",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            // Only reachable if a concurrent writer bypassed the ledger's
            // row locks; the unique index still holds the line.
            StoreError::UniqueViolation { constraint } => {
                BookingError::Conflict(format!("duplicate active reservation ({constraint})"))
            }
            other => BookingError::Database(other),
        }
    }
}
