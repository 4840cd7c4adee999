use common::{Money, ProductId, SessionId, TripId};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;

/// A product quantity in a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

/// A course-session enrollment in a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseItem {
    pub session_id: SessionId,
    pub price: Money,
}

/// A trip booking in a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripItem {
    pub trip_id: TripId,
    pub price: Money,
}

/// A checkout request mixing products, course seats and trip seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub total: Money,
    #[serde(default)]
    pub items: Vec<ProductItem>,
    #[serde(default)]
    pub courses: Vec<CourseItem>,
    #[serde(default)]
    pub trips: Vec<TripItem>,
    /// Reference from the (simulated) payment step.
    #[serde(default)]
    pub payment_ref: Option<String>,
}

impl CreateOrderRequest {
    /// Creates an empty request for the given total.
    pub fn new(total: Money) -> Self {
        Self {
            total,
            items: Vec::new(),
            courses: Vec::new(),
            trips: Vec::new(),
            payment_ref: None,
        }
    }

    pub fn with_item(mut self, product_id: ProductId, quantity: u32, price: Money) -> Self {
        self.items.push(ProductItem {
            product_id,
            quantity,
            price,
        });
        self
    }

    pub fn with_course(mut self, session_id: SessionId, price: Money) -> Self {
        self.courses.push(CourseItem { session_id, price });
        self
    }

    pub fn with_trip(mut self, trip_id: TripId, price: Money) -> Self {
        self.trips.push(TripItem { trip_id, price });
        self
    }

    pub fn with_payment_ref(mut self, payment_ref: impl Into<String>) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }

    /// Checks the request shape before any write happens.
    ///
    /// Only items and courses count towards "at least one item"; a request
    /// holding nothing but trips is rejected.
    pub fn validate(&self) -> Result<(), BookingError> {
        if !self.total.is_positive() {
            return Err(BookingError::Validation(
                "total must be greater than zero".to_string(),
            ));
        }

        if self.items.is_empty() && self.courses.is_empty() {
            return Err(BookingError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(BookingError::Validation(format!(
                "quantity for product {} must be at least 1",
                item.product_id
            )));
        }

        let negative_price = self.items.iter().any(|i| i.price.is_negative())
            || self.courses.iter().any(|c| c.price.is_negative())
            || self.trips.iter().any(|t| t.price.is_negative());
        if negative_price {
            return Err(BookingError::Validation(
                "prices cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::ReservationLine;

    fn validation_message(request: &CreateOrderRequest) -> String {
        match request.validate() {
            Err(BookingError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zero_total_is_rejected() {
        let request = CreateOrderRequest::new(Money::zero()).with_item(
            ProductId::new(),
            1,
            Money::from_cents(100),
        );
        assert_eq!(validation_message(&request), "total must be greater than zero");
    }

    #[test]
    fn empty_order_is_rejected() {
        let request = CreateOrderRequest::new(Money::from_cents(100));
        assert_eq!(
            validation_message(&request),
            "order must contain at least one item"
        );
    }

    #[test]
    fn trips_alone_do_not_satisfy_the_item_rule() {
        let request = CreateOrderRequest::new(Money::from_cents(100))
            .with_trip(TripId::new(), Money::from_cents(100));
        assert_eq!(
            validation_message(&request),
            "order must contain at least one item"
        );
    }

    #[test]
    fn a_single_course_is_enough() {
        let request = CreateOrderRequest::new(Money::from_cents(100))
            .with_course(SessionId::new(), Money::from_cents(100));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let request = CreateOrderRequest::new(Money::from_cents(100)).with_item(
            ProductId::new(),
            0,
            Money::from_cents(100),
        );
        assert!(validation_message(&request).contains("must be at least 1"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let request = CreateOrderRequest::new(Money::from_cents(100))
            .with_course(SessionId::new(), Money::from_cents(100))
            .with_trip(TripId::new(), Money::from_cents(-1));
        assert_eq!(validation_message(&request), "prices cannot be negative");
    }

    #[test]
    fn lines_keep_items_courses_trips_order() {
        let product_id = ProductId::new();
        let session_id = SessionId::new();
        let trip_id = TripId::new();
        let request = CreateOrderRequest::new(Money::from_cents(100))
            .with_trip(trip_id, Money::from_cents(30))
            .with_course(session_id, Money::from_cents(20))
            .with_item(product_id, 2, Money::from_cents(25));

        let lines = ReservationLine::from_request(&request);

        assert_eq!(lines.len(), 3);
        assert!(matches!(lines[0], ReservationLine::Product { quantity: 2, .. }));
        assert!(matches!(lines[1], ReservationLine::CourseSeat { .. }));
        assert!(matches!(lines[2], ReservationLine::TripSeat { .. }));
    }

    #[test]
    fn lines_are_sorted_by_resource_id_within_each_group() {
        let mut products = [ProductId::new(), ProductId::new(), ProductId::new()];
        let forward = CreateOrderRequest::new(Money::from_cents(300))
            .with_item(products[0], 1, Money::from_cents(100))
            .with_item(products[1], 1, Money::from_cents(100))
            .with_item(products[2], 1, Money::from_cents(100));
        let backward = CreateOrderRequest::new(Money::from_cents(300))
            .with_item(products[2], 1, Money::from_cents(100))
            .with_item(products[1], 1, Money::from_cents(100))
            .with_item(products[0], 1, Money::from_cents(100));
        products.sort();

        let ids = |request: &CreateOrderRequest| -> Vec<ProductId> {
            ReservationLine::from_request(request)
                .into_iter()
                .filter_map(|line| match line {
                    ReservationLine::Product { product_id, .. } => Some(product_id),
                    _ => None,
                })
                .collect()
        };

        assert_eq!(ids(&forward), products.to_vec());
        assert_eq!(ids(&backward), products.to_vec());
    }

    #[test]
    fn deserializes_with_missing_collections() {
        let json = format!(
            r#"{{"total": 4500, "courses": [{{"session_id": "{}", "price": 4500}}]}}"#,
            SessionId::new()
        );
        let request: CreateOrderRequest = serde_json::from_str(&json).unwrap();
        assert!(request.items.is_empty());
        assert_eq!(request.courses.len(), 1);
        assert!(request.payment_ref.is_none());
    }
}
