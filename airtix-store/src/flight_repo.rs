use std::collections::HashMap;

use airtix_core::flight::{Flight, FlightLeg, NewFlight};
use airtix_core::repository::FlightRepository;
use airtix_core::{CoreResult, FlightId};
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::PgPool;

use crate::error::{conflict_as, storage_error};

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches legs (in leg order) to a batch of flight rows.
    async fn with_legs(&self, rows: Vec<FlightRow>) -> CoreResult<Vec<Flight>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.flight_id).collect();
        let leg_rows = sqlx::query_as::<_, LegRow>(
            r#"
            SELECT flight_leg_id, flight_id, leg_no, origin, destination,
                   departure_time, arrival_time
            FROM flight_legs
            WHERE flight_id = ANY($1)
            ORDER BY flight_id, leg_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut legs: HashMap<i32, Vec<FlightLeg>> = HashMap::new();
        for leg in leg_rows {
            legs.entry(leg.flight_id).or_default().push(FlightLeg {
                flight_leg_id: leg.flight_leg_id,
                leg_no: leg.leg_no,
                origin: leg.origin,
                destination: leg.destination,
                departure_time: leg.departure_time,
                arrival_time: leg.arrival_time,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Flight {
                legs: legs.remove(&row.flight_id).unwrap_or_default(),
                flight_id: row.flight_id,
                flight_number: row.flight_number,
                origin: row.origin,
                destination: row.destination,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    flight_id: i32,
    flight_number: String,
    origin: String,
    destination: String,
}

#[derive(sqlx::FromRow)]
struct LegRow {
    flight_leg_id: i32,
    flight_id: i32,
    leg_no: i32,
    origin: String,
    destination: String,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn insert_flight(&self, flight: &NewFlight) -> CoreResult<FlightId> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let flight_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO flights (flight_number, origin, destination)
            VALUES ($1, $2, $3)
            RETURNING flight_id
            "#,
        )
        .bind(&flight.flight_number)
        .bind(flight.origin())
        .bind(flight.destination())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, || format!("Flight {} already exists", flight.flight_number)))?;

        for (index, leg) in flight.legs.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO flight_legs
                    (flight_id, leg_no, origin, destination, departure_time, arrival_time)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(flight_id)
            .bind(index as i32 + 1)
            .bind(&leg.origin)
            .bind(&leg.destination)
            .bind(leg.departure_time)
            .bind(leg.arrival_time)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(flight_id)
    }

    async fn get_flight(&self, flight_id: FlightId) -> CoreResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT flight_id, flight_number, origin, destination
            FROM flights
            WHERE flight_id = $1
            "#,
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(self.with_legs(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT flight_id, flight_number, origin, destination
            FROM flights
            ORDER BY flight_number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        self.with_legs(rows).await
    }

    async fn search_flights(&self, origin: &str, destination: &str) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT flight_id, flight_number, origin, destination
            FROM flights
            WHERE origin = $1 AND destination = $2
            ORDER BY flight_number
            "#,
        )
        .bind(origin)
        .bind(destination)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        self.with_legs(rows).await
    }
}
