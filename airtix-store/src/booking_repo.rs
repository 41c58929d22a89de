use std::collections::HashSet;

use airtix_core::booking::{BookedLeg, BookingReceipt, BookingRow, NewBooking};
use airtix_core::pnr::Pnr;
use airtix_core::repository::BookingRepository;
use airtix_core::seating::pick_seat;
use airtix_core::{CoreError, CoreResult, UserId};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::{conflict_as, storage_error};

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingListingRow {
    ticket_pnr: String,
    flight_id: i32,
    flight_leg_id: i32,
    seat_id: i32,
    travel_date: NaiveDate,
    amount: i32,
    age: i32,
    passenger_name: String,
    contact_number: String,
}

impl From<BookingListingRow> for BookingRow {
    fn from(row: BookingListingRow) -> Self {
        BookingRow {
            ticket_pnr: row.ticket_pnr,
            flight_id: row.flight_id,
            flight_leg_id: row.flight_leg_id,
            seat_id: row.seat_id,
            travel_date: row.travel_date,
            amount: row.amount,
            age: row.age,
            passenger_name: row.passenger_name,
            contact_number: row.contact_number,
        }
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<BookingReceipt> {
        let pnr = booking.pnr.as_str();
        let now = booking.booked_at;

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let issued: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM booking_details WHERE ticket_pnr = $1)",
        )
        .bind(pnr)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;
        if issued {
            return Err(CoreError::Conflict(format!("PNR {} already issued", pnr)));
        }

        // Passenger identity
        let person_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO persons (name, contact_no, last_updated_date)
            VALUES ($1, $2, $3)
            RETURNING person_id
            "#,
        )
        .bind(&booking.passenger.name)
        .bind(&booking.passenger.contact_number)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        let passenger_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO passengers (person_id, age, last_updated_date, active_ind)
            VALUES ($1, $2, $3, TRUE)
            RETURNING passenger_id
            "#,
        )
        .bind(person_id)
        .bind(booking.passenger.age)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        // One leg instance and booking detail per leg
        let mut legs = Vec::with_capacity(booking.segments.len());
        for segment in &booking.segments {
            let occupied: Vec<i32> = sqlx::query_scalar(
                r#"
                SELECT seat_id FROM leg_instances
                WHERE flight_id = $1 AND flight_leg_id = $2 AND travel_date = $3 AND active_ind
                "#,
            )
            .bind(segment.flight_id)
            .bind(segment.flight_leg_id)
            .bind(segment.travel_date)
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_error)?;

            let occupied: HashSet<i32> = occupied.into_iter().collect();
            let seat = pick_seat(&occupied, booking.seats_per_leg).ok_or_else(|| {
                CoreError::Conflict(format!(
                    "No free seat on leg {} of flight {} on {}",
                    segment.flight_leg_id, segment.flight_id, segment.travel_date
                ))
            })?;

            let leg_instance_id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO leg_instances
                    (flight_id, flight_leg_id, seat_id, travel_date, last_updated_date, active_ind)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                RETURNING leg_instance_id
                "#,
            )
            .bind(segment.flight_id)
            .bind(segment.flight_leg_id)
            .bind(seat)
            .bind(segment.travel_date)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                conflict_as(e, || {
                    format!(
                        "Seat {} on leg {} was taken concurrently",
                        seat, segment.flight_leg_id
                    )
                })
            })?;

            sqlx::query(
                r#"
                INSERT INTO booking_details (
                    leg_instance_id, ticket_pnr, booking_time, last_updated_date,
                    act_ind, user_id, passenger_id, amount
                )
                VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
                "#,
            )
            .bind(leg_instance_id)
            .bind(pnr)
            .bind(now)
            .bind(now)
            .bind(booking.user_id)
            .bind(passenger_id)
            .bind(segment.amount)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

            legs.push(BookedLeg {
                leg_instance_id,
                flight_id: segment.flight_id,
                flight_leg_id: segment.flight_leg_id,
                travel_date: segment.travel_date,
                seat_no: seat,
            });
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(BookingReceipt {
            pnr: booking.pnr.clone(),
            passenger_id,
            legs,
        })
    }

    async fn booking_rows_for_user(&self, user_id: UserId) -> CoreResult<Vec<BookingRow>> {
        let rows = sqlx::query_as::<_, BookingListingRow>(
            r#"
            SELECT
                bd.ticket_pnr, li.flight_id, li.flight_leg_id, li.seat_id, li.travel_date,
                bd.amount, pas.age, per.name AS passenger_name, per.contact_no AS contact_number
            FROM booking_details bd
            JOIN leg_instances li ON li.leg_instance_id = bd.leg_instance_id
            JOIN passengers pas ON pas.passenger_id = bd.passenger_id
            JOIN persons per ON per.person_id = pas.person_id
            WHERE bd.user_id = $1 AND li.active_ind
            ORDER BY bd.booking_time, bd.ticket_pnr, bd.booking_detail_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(BookingRow::from).collect())
    }

    async fn cancel_pnr(&self, pnr: &Pnr) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE leg_instances AS li
            SET active_ind = FALSE, last_updated_date = NOW()
            FROM booking_details AS bd
            WHERE bd.leg_instance_id = li.leg_instance_id AND bd.ticket_pnr = $1 AND li.active_ind
            "#,
        )
        .bind(pnr.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 && self.pnr_owner(pnr).await?.is_none() {
            return Err(CoreError::NotFound(format!("Booking {}", pnr)));
        }
        Ok(result.rows_affected())
    }

    async fn pnr_owner(&self, pnr: &Pnr) -> CoreResult<Option<UserId>> {
        sqlx::query_scalar("SELECT user_id FROM booking_details WHERE ticket_pnr = $1 LIMIT 1")
            .bind(pnr.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)
    }
}
