use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CourseId, EnrollmentId, Money, OrderId, ProductId, RefundId, SessionId, TripBookingId, TripId,
    UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CourseSession, Enrollment, EnrollmentStatus, InventoryItem, Order, OrderLine, OrderStatus,
    Refund, RefundStatus, Result, StoreError, Trip, TripBooking, TripBookingStatus,
    store::{Store, UnitOfWork},
};

/// PostgreSQL-backed store implementation.
///
/// Capacity decisions rely on row locks: every `lock_*` call issues
/// `SELECT ... FOR UPDATE`, so two units reserving against the same
/// inventory, session or trip row run one after the other, and the second
/// one counts the first one's committed rows.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Unit = PostgresUnit;

    async fn begin(&self) -> Result<PostgresUnit> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnit { tx })
    }
}

/// Atomic unit backed by a database transaction.
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

/// Translates constraint violations into their typed store errors.
fn map_write_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        let constraint = db_err.constraint().unwrap_or_default().to_string();
        if db_err.is_unique_violation() {
            tracing::debug!(%constraint, "unique constraint rejected write");
            return StoreError::UniqueViolation { constraint };
        }
        if db_err.is_check_violation() {
            tracing::debug!(%constraint, "check constraint rejected write");
            return StoreError::CheckViolation { constraint };
        }
    }
    StoreError::Database(err)
}

fn status<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = StoreError>,
{
    let text: String = row.try_get(column)?;
    text.parse()
}

fn quantity_to_db(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("quantity {quantity} out of range")))
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: status(&row, "status")?,
        payment_ref: row.try_get("payment_ref")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderLine {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::InvalidData(format!("negative quantity {quantity}")))?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_session(row: PgRow) -> Result<CourseSession> {
    Ok(CourseSession {
        id: SessionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        course_id: CourseId::from_uuid(row.try_get::<Uuid, _>("course_id")?),
        starts_at: row.try_get("starts_at")?,
        capacity: row.try_get("capacity")?,
    })
}

fn row_to_enrollment(row: PgRow) -> Result<Enrollment> {
    Ok(Enrollment {
        id: EnrollmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        session_id: SessionId::from_uuid(row.try_get::<Uuid, _>("session_id")?),
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")?
            .map(OrderId::from_uuid),
        status: status(&row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_trip(row: PgRow) -> Result<Trip> {
    Ok(Trip {
        id: TripId::from_uuid(row.try_get::<Uuid, _>("id")?),
        title: row.try_get("title")?,
        seats_total: row.try_get("seats_total")?,
        starts_on: row.try_get("starts_on")?,
        ends_on: row.try_get("ends_on")?,
        active: row.try_get("active")?,
    })
}

fn row_to_trip_booking(row: PgRow) -> Result<TripBooking> {
    Ok(TripBooking {
        id: TripBookingId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        trip_id: TripId::from_uuid(row.try_get::<Uuid, _>("trip_id")?),
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")?
            .map(OrderId::from_uuid),
        status: status(&row, "status")?,
        paid_amount: Money::from_cents(row.try_get("paid_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_refund(row: PgRow) -> Result<Refund> {
    Ok(Refund {
        id: RefundId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        enrollment_id: EnrollmentId::from_uuid(row.try_get::<Uuid, _>("enrollment_id")?),
        course_id: CourseId::from_uuid(row.try_get::<Uuid, _>("course_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        reason: row.try_get("reason")?,
        status: status(&row, "status")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

const ENROLLMENT_COLUMNS: &str = "id, user_id, session_id, order_id, status, created_at";
const TRIP_BOOKING_COLUMNS: &str =
    "id, user_id, trip_id, order_id, status, paid_cents, created_at";
const REFUND_COLUMNS: &str = "id, user_id, enrollment_id, course_id, amount_cents, reason, status, created_at, processed_at";

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, payment_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.payment_ref)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, payment_ref, created_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (order_id, product_id, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(line.order_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(quantity_to_db(line.quantity)?)
        .bind(line.unit_price.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order_line).collect()
    }

    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(
            "SELECT product_id, qty_on_hand FROM inventory WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(InventoryItem {
                product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                qty_on_hand: row.try_get("qty_on_hand")?,
            })),
            None => Ok(None),
        }
    }

    async fn set_inventory_qty(&mut self, product_id: ProductId, qty_on_hand: i64) -> Result<()> {
        sqlx::query("UPDATE inventory SET qty_on_hand = $2 WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .bind(qty_on_hand)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn get_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>> {
        let row = sqlx::query(
            "SELECT id, course_id, starts_at, capacity FROM course_sessions WHERE id = $1",
        )
        .bind(session_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_session).transpose()
    }

    async fn lock_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>> {
        let row = sqlx::query(
            "SELECT id, course_id, starts_at, capacity FROM course_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_session).transpose()
    }

    async fn count_active_enrollments(&mut self, session_id: SessionId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments WHERE session_id = $1 AND status = $2",
        )
        .bind(session_id.as_uuid())
        .bind(EnrollmentStatus::Enrolled.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn find_active_enrollment(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 AND session_id = $2 AND status = $3"
        ))
        .bind(user_id.as_uuid())
        .bind(session_id.as_uuid())
        .bind(EnrollmentStatus::Enrolled.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_enrollment).transpose()
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (id, user_id, session_id, order_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(enrollment.id.as_uuid())
        .bind(enrollment.user_id.as_uuid())
        .bind(enrollment.session_id.as_uuid())
        .bind(enrollment.order_id.map(|id| id.as_uuid()))
        .bind(enrollment.status.as_str())
        .bind(enrollment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn lock_enrollment(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1 FOR UPDATE"
        ))
        .bind(enrollment_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_enrollment).transpose()
    }

    async fn update_enrollment_status(
        &mut self,
        enrollment_id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE enrollments SET status = $2 WHERE id = $1")
            .bind(enrollment_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn enrollments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_enrollment).collect()
    }

    async fn lock_trip(&mut self, trip_id: TripId) -> Result<Option<Trip>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, seats_total, starts_on, ends_on, active
            FROM trips
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(trip_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_trip).transpose()
    }

    async fn count_confirmed_bookings(&mut self, trip_id: TripId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trip_bookings WHERE trip_id = $1 AND status = $2",
        )
        .bind(trip_id.as_uuid())
        .bind(TripBookingStatus::Confirmed.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn find_confirmed_booking(
        &mut self,
        user_id: UserId,
        trip_id: TripId,
    ) -> Result<Option<TripBooking>> {
        let row = sqlx::query(&format!(
            "SELECT {TRIP_BOOKING_COLUMNS} FROM trip_bookings WHERE user_id = $1 AND trip_id = $2 AND status = $3"
        ))
        .bind(user_id.as_uuid())
        .bind(trip_id.as_uuid())
        .bind(TripBookingStatus::Confirmed.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_trip_booking).transpose()
    }

    async fn insert_trip_booking(&mut self, booking: &TripBooking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trip_bookings (id, user_id, trip_id, order_id, status, paid_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.user_id.as_uuid())
        .bind(booking.trip_id.as_uuid())
        .bind(booking.order_id.map(|id| id.as_uuid()))
        .bind(booking.status.as_str())
        .bind(booking.paid_amount.cents())
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn lock_trip_booking(
        &mut self,
        booking_id: TripBookingId,
    ) -> Result<Option<TripBooking>> {
        let row = sqlx::query(&format!(
            "SELECT {TRIP_BOOKING_COLUMNS} FROM trip_bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_trip_booking).transpose()
    }

    async fn update_trip_booking_status(
        &mut self,
        booking_id: TripBookingId,
        status: TripBookingStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE trip_bookings SET status = $2 WHERE id = $1")
            .bind(booking_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn trip_bookings_for_order(&mut self, order_id: OrderId) -> Result<Vec<TripBooking>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_BOOKING_COLUMNS} FROM trip_bookings WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_trip_booking).collect()
    }

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO refunds ({REFUND_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(refund.id.as_uuid())
        .bind(refund.user_id.as_uuid())
        .bind(refund.enrollment_id.as_uuid())
        .bind(refund.course_id.as_uuid())
        .bind(refund.amount.cents())
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(refund.created_at)
        .bind(refund.processed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn lock_refund(&mut self, refund_id: RefundId) -> Result<Option<Refund>> {
        let row = sqlx::query(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE id = $1 FOR UPDATE"
        ))
        .bind(refund_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_refund).transpose()
    }

    async fn find_pending_refund(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Refund>> {
        let row = sqlx::query(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE enrollment_id = $1 AND status = $2 LIMIT 1"
        ))
        .bind(enrollment_id.as_uuid())
        .bind(RefundStatus::Pending.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_refund).transpose()
    }

    async fn update_refund_status(
        &mut self,
        refund_id: RefundId,
        status: RefundStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE refunds SET status = $2, processed_at = $3 WHERE id = $1")
            .bind(refund_id.as_uuid())
            .bind(status.as_str())
            .bind(processed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
