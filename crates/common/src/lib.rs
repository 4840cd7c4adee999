//! Shared identifier and money types used across the booking engine crates.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    CourseId, EnrollmentId, OrderId, ProductId, RefundId, SessionId, TripBookingId, TripId, UserId,
};
