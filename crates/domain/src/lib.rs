//! Booking engine for the dive shop.
//!
//! This crate provides:
//! - `CapacityLedger` deciding inventory, session-seat and trip-seat capacity
//! - `OrderTransaction` placing mixed checkouts all-or-nothing
//! - `CancellationService` with its time-gated `CancellationPolicy`
//! - `BookingService` for order-less enrollments and trip bookings
//! - `RefundWorkflow`, the refund approval state machine

pub mod booking;
pub mod cancellation;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod order;
pub mod refund;
pub mod reservation;

pub use booking::BookingService;
pub use cancellation::{CancellationPolicy, CancellationService, DEFAULT_NOTICE_HOURS};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BookingError, Resource};
pub use ledger::{CapacityLedger, ReservationContext, Utilization};
pub use order::{
    CourseItem, CreateOrderRequest, OrderDetails, OrderTransaction, ProductItem, TripItem,
};
pub use refund::{RefundAction, RefundWorkflow};
pub use reservation::{Reservation, ReservationLine};
