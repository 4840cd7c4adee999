//! Row types persisted by the store and their lifecycle statuses.

use chrono::{DateTime, NaiveDate, Utc};
use common::{
    CourseId, EnrollmentId, Money, OrderId, ProductId, RefundId, SessionId, TripBookingId, TripId,
    UserId,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Implements `as_str`, `Display` and `FromStr` for a status enum from a
/// single variant/text table, so the stored text and the parser can never
/// drift apart.
macro_rules! status_text {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the stored text for this status.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(StoreError::InvalidData(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Lifecycle status of an order.
///
/// Orders are created `Pending`; every other transition is an
/// administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    /// Legacy fulfilment marker, stored upper-case.
    #[serde(rename = "SENT")]
    Sent,
}

status_text!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
    Sent => "SENT",
});

impl OrderStatus {
    /// Returns true if the order's reservations may still be released.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }
}

/// Status of a course-session enrollment.
///
/// ```text
/// Enrolled ──┬──► Cancelled   (owner or refund approval)
///            └──► Dropped     (order cancelled by an administrator)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Enrolled,
    Cancelled,
    Dropped,
}

status_text!(EnrollmentStatus {
    Enrolled => "enrolled",
    Cancelled => "cancelled",
    Dropped => "dropped",
});

impl EnrollmentStatus {
    /// Returns true if the enrollment occupies a seat.
    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Status of a trip booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripBookingStatus {
    #[default]
    Confirmed,
    Cancelled,
}

status_text!(TripBookingStatus {
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

impl TripBookingStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TripBookingStatus::Confirmed)
    }
}

/// Status of a refund request.
///
/// ```text
/// Pending ──┬──► Approved ──► Processed
///           └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Processed,
}

status_text!(RefundStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Processed => "processed",
});

impl RefundStatus {
    /// Returns true if an approve/reject decision can still be made.
    pub fn is_pending(&self) -> bool {
        matches!(self, RefundStatus::Pending)
    }
}

/// The root row of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A purchased product quantity. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Stock on hand for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product_id: ProductId,
    pub qty_on_hand: i64,
}

/// A scheduled run of a course with a fixed number of seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSession {
    pub id: SessionId,
    pub course_id: CourseId,
    pub starts_at: DateTime<Utc>,
    pub capacity: i64,
}

/// A dive trip with a fixed number of seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub title: String,
    pub seats_total: i64,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
}

/// A user's claim on one course-session seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub order_id: Option<OrderId>,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

/// A user's claim on one trip seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripBooking {
    pub id: TripBookingId,
    pub user_id: UserId,
    pub trip_id: TripId,
    pub order_id: Option<OrderId>,
    pub status: TripBookingStatus,
    pub paid_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// A request to reverse an enrollment's charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub user_id: UserId,
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
