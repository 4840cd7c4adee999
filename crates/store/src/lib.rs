//! Persistence layer for the booking engine.
//!
//! Every write goes through a [`UnitOfWork`] obtained from [`Store::begin`].
//! A unit either commits all of its writes or none of them; dropping a unit
//! without committing discards it.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, MemoryUnit};
pub use postgres::{PostgresStore, PostgresUnit};
pub use records::{
    CourseSession, Enrollment, EnrollmentStatus, InventoryItem, Order, OrderLine, OrderStatus,
    Refund, RefundStatus, Trip, TripBooking, TripBookingStatus,
};
pub use store::{Store, UnitOfWork};
