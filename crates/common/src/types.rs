use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is a distinct type so that, for example, a `SessionId`
/// can never be passed where a `TripId` is expected.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifies a storefront user.
    UserId
);
uuid_id!(
    /// Identifies an order (the root of a checkout).
    OrderId
);
uuid_id!(
    /// Identifies a purchasable product and its inventory row.
    ProductId
);
uuid_id!(
    /// Identifies a course (the catalog entry a session belongs to).
    CourseId
);
uuid_id!(
    /// Identifies a scheduled course session.
    SessionId
);
uuid_id!(
    /// Identifies a dive trip.
    TripId
);
uuid_id!(
    /// Identifies a user's enrollment in a course session.
    EnrollmentId
);
uuid_id!(
    /// Identifies a user's booking on a trip.
    TripBookingId
);
uuid_id!(
    /// Identifies a refund request.
    RefundId
);
