//! Checkout orders.

mod request;
mod transaction;

pub use request::{CourseItem, CreateOrderRequest, ProductItem, TripItem};
pub use transaction::OrderTransaction;

use serde::Serialize;
use store::{Enrollment, Order, OrderLine, TripBooking};

/// An order together with the rows created in its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub enrollments: Vec<Enrollment>,
    pub trip_bookings: Vec<TripBooking>,
}
