use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::booking::{group_booking_rows, BookingData, BookingReceipt, FlightBooking, NewBooking};
use crate::pnr::Pnr;
use crate::repository::{BookingRepository, FlightRepository};
use crate::seating::DEFAULT_SEATS_PER_LEG;
use crate::{CoreError, CoreResult, UserId};

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_seats_per_leg")]
    pub seats_per_leg: i32,
    /// Attempts per booking when a PNR or seat collides.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_seats_per_leg() -> i32 {
    DEFAULT_SEATS_PER_LEG
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            seats_per_leg: default_seats_per_leg(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Creates, lists and cancels bookings.
pub struct BookingManager {
    bookings: Arc<dyn BookingRepository>,
    flights: Arc<dyn FlightRepository>,
    rules: BookingRules,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        flights: Arc<dyn FlightRepository>,
        rules: BookingRules,
    ) -> Self {
        Self { bookings, flights, rules }
    }

    /// Books the departure flight and, optionally, the return flight under one PNR.
    /// The passenger is taken from the departure flight.
    pub async fn make_booking(
        &self,
        departure: &FlightBooking,
        return_flight: Option<&FlightBooking>,
        user_id: UserId,
    ) -> CoreResult<BookingReceipt> {
        if departure.flight_leg_ids.is_empty() {
            return Err(CoreError::Validation("Departure flight has no legs".to_string()));
        }
        let passenger = departure.passenger()?;

        if let Some(ret) = return_flight {
            if ret.travel_date < departure.travel_date {
                return Err(CoreError::Validation(
                    "Return date precedes departure date".to_string(),
                ));
            }
        }

        let today = Utc::now().date_naive();
        for flight in std::iter::once(departure).chain(return_flight) {
            flight.check_itinerary(today)?;
            self.check_legs_exist(flight).await?;
        }

        let segments: Vec<_> = departure
            .segments()
            .chain(return_flight.into_iter().flat_map(|ret| ret.segments()))
            .collect();

        let attempts = self.rules.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let booking = NewBooking {
                pnr: Pnr::generate(),
                user_id,
                passenger: passenger.clone(),
                segments: segments.clone(),
                seats_per_leg: self.rules.seats_per_leg,
                booked_at: Utc::now(),
            };

            match self.bookings.create_booking(&booking).await {
                Ok(receipt) => {
                    info!(
                        "Booking {} created for user {} ({} legs)",
                        receipt.pnr,
                        user_id,
                        receipt.legs.len()
                    );
                    return Ok(receipt);
                }
                Err(CoreError::Conflict(reason)) if attempt < attempts => {
                    warn!("Booking attempt {} for user {} collided: {}", attempt, user_id, reason);
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Booking for user {} failed: {}", user_id, e);
                    return Err(e);
                }
            }
        }
    }

    async fn check_legs_exist(&self, booking: &FlightBooking) -> CoreResult<()> {
        let flight = self
            .flights
            .get_flight(booking.flight_id)
            .await?
            .ok_or_else(|| CoreError::Validation(format!("Unknown flight {}", booking.flight_id)))?;

        for leg in &booking.flight_leg_ids {
            if !flight.has_leg(*leg) {
                return Err(CoreError::Validation(format!(
                    "Leg {} does not belong to flight {}",
                    leg, flight.flight_number
                )));
            }
        }
        Ok(())
    }

    /// Active bookings of the user, one entry per booked flight.
    pub async fn get_booking_details_for_user(
        &self,
        user_id: UserId,
    ) -> CoreResult<Vec<BookingData>> {
        let rows = self.bookings.booking_rows_for_user(user_id).await?;
        Ok(group_booking_rows(rows))
    }

    /// Returns the number of legs cancelled; zero when the PNR was already cancelled.
    pub async fn cancel_ticket(&self, pnr: &Pnr) -> CoreResult<u64> {
        let cancelled = self.bookings.cancel_pnr(pnr).await?;
        info!("Cancelled {} legs of booking {}", cancelled, pnr);
        Ok(cancelled)
    }

    pub async fn booking_owner(&self, pnr: &Pnr) -> CoreResult<Option<UserId>> {
        self.bookings.pnr_owner(pnr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingRow;
    use crate::flight::{NewFlight, NewFlightLeg};
    use crate::memory::InMemoryStore;
    use crate::{FlightId, FlightLegId};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use std::collections::HashSet;

    struct Fixture {
        store: Arc<InMemoryStore>,
        manager: BookingManager,
        outbound: (FlightId, Vec<FlightLegId>),
        inbound: (FlightId, Vec<FlightLegId>),
    }

    fn leg(origin: &str, destination: &str) -> NewFlightLeg {
        NewFlightLeg {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        }
    }

    async fn add_flight(
        store: &InMemoryStore,
        number: &str,
        legs: Vec<NewFlightLeg>,
    ) -> (FlightId, Vec<FlightLegId>) {
        let flight = NewFlight { flight_number: number.to_string(), legs };
        let id = store.insert_flight(&flight).await.unwrap();
        let flight = store.get_flight(id).await.unwrap().unwrap();
        (id, flight.legs.iter().map(|l| l.flight_leg_id).collect())
    }

    async fn fixture(rules: BookingRules) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let outbound =
            add_flight(&store, "AI101", vec![leg("DEL", "BOM"), leg("BOM", "GOI")]).await;
        let inbound = add_flight(&store, "AI202", vec![leg("GOI", "DEL")]).await;
        let manager = BookingManager::new(store.clone(), store.clone(), rules);
        Fixture { store, manager, outbound, inbound }
    }

    fn travel_date(days_ahead: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days_ahead)
    }

    fn departure(flight: &(FlightId, Vec<FlightLegId>)) -> FlightBooking {
        FlightBooking {
            flight_id: flight.0,
            flight_leg_ids: flight.1.clone(),
            travel_date: travel_date(30),
            cost: 12_500,
            passenger_name: "Alice".to_string(),
            contact_number: "555-0100".to_string(),
            age: Some(34),
        }
    }

    fn return_leg(flight: &(FlightId, Vec<FlightLegId>)) -> FlightBooking {
        FlightBooking {
            flight_id: flight.0,
            flight_leg_ids: flight.1.clone(),
            travel_date: travel_date(37),
            cost: 9_900,
            passenger_name: String::new(),
            contact_number: String::new(),
            age: None,
        }
    }

    #[tokio::test]
    async fn test_round_trip_booking() {
        let fx = fixture(BookingRules::default()).await;
        let receipt = fx
            .manager
            .make_booking(&departure(&fx.outbound), Some(&return_leg(&fx.inbound)), 7)
            .await
            .unwrap();

        assert_eq!(receipt.legs.len(), 3);
        let instances: HashSet<_> = receipt.legs.iter().map(|l| l.leg_instance_id).collect();
        assert_eq!(instances.len(), 3);
        assert!(receipt.legs.iter().all(|l| (1..=30).contains(&l.seat_no)));
        assert_eq!(fx.store.booking_detail_count(&receipt.pnr), 3);

        let bookings = fx.manager.get_booking_details_for_user(7).await.unwrap();
        assert_eq!(bookings.len(), 2);
        assert_eq!(bookings[0].flight_id, fx.outbound.0);
        assert_eq!(bookings[0].flight_leg_ids, fx.outbound.1);
        assert_eq!(bookings[0].seat_numbers.len(), 2);
        assert_eq!(bookings[1].flight_id, fx.inbound.0);
        assert_eq!(bookings[1].flight_leg_ids.len(), 1);
        assert!(bookings.iter().all(|b| b.pnr == receipt.pnr.as_str()));
        assert!(bookings.iter().all(|b| b.passenger_name == "Alice"));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let fx = fixture(BookingRules::default()).await;
        let receipt = fx
            .manager
            .make_booking(&departure(&fx.outbound), Some(&return_leg(&fx.inbound)), 7)
            .await
            .unwrap();

        assert_eq!(fx.manager.cancel_ticket(&receipt.pnr).await.unwrap(), 3);
        assert!(fx.manager.get_booking_details_for_user(7).await.unwrap().is_empty());
        assert_eq!(fx.manager.cancel_ticket(&receipt.pnr).await.unwrap(), 0);

        let unknown = Pnr::parse("ZZZZZZZZZZ").unwrap();
        assert!(matches!(fx.manager.cancel_ticket(&unknown).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_only_touches_its_pnr() {
        let fx = fixture(BookingRules::default()).await;
        let first = fx.manager.make_booking(&departure(&fx.outbound), None, 7).await.unwrap();
        let second = fx.manager.make_booking(&departure(&fx.inbound), None, 7).await.unwrap();

        fx.manager.cancel_ticket(&first.pnr).await.unwrap();
        let remaining = fx.manager.get_booking_details_for_user(7).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pnr, second.pnr.as_str());
        assert_eq!(fx.manager.booking_owner(&first.pnr).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_seats_never_collide() {
        let fx = fixture(BookingRules { seats_per_leg: 4, max_attempts: 3 }).await;
        let booking = departure(&fx.inbound);

        let mut seats = HashSet::new();
        for user in 0..4 {
            let receipt = fx.manager.make_booking(&booking, None, user).await.unwrap();
            assert!(seats.insert(receipt.legs[0].seat_no));
        }

        let full = fx.manager.make_booking(&booking, None, 99).await;
        assert!(matches!(full, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_failed_booking_leaves_nothing_behind() {
        let fx = fixture(BookingRules { seats_per_leg: 1, max_attempts: 1 }).await;
        let return_flight = return_leg(&fx.inbound);

        // Take the only seat on the return leg for the return date.
        let mut filler = departure(&fx.inbound);
        filler.travel_date = return_flight.travel_date;
        fx.manager.make_booking(&filler, None, 1).await.unwrap();

        // Outbound legs are free, the return leg is full: nothing may be written.
        let result = fx
            .manager
            .make_booking(&departure(&fx.outbound), Some(&return_flight), 2)
            .await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert!(fx.manager.get_booking_details_for_user(2).await.unwrap().is_empty());
        assert_eq!(fx.store.passenger_count(), 1);
        assert_eq!(fx.manager.get_booking_details_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_foreign_legs() {
        let fx = fixture(BookingRules::default()).await;
        let mut booking = departure(&fx.outbound);
        booking.flight_leg_ids.push(fx.inbound.1[0]);

        let result = fx.manager.make_booking(&booking, None, 7).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let mut booking = departure(&fx.outbound);
        booking.flight_id = 9999;
        assert!(matches!(
            fx.manager.make_booking(&booking, None, 7).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_requires_departure_legs_and_passenger() {
        let fx = fixture(BookingRules::default()).await;
        let mut booking = departure(&fx.outbound);
        booking.flight_leg_ids.clear();
        assert!(matches!(
            fx.manager.make_booking(&booking, None, 7).await,
            Err(CoreError::Validation(_))
        ));

        let mut booking = departure(&fx.outbound);
        booking.age = None;
        assert!(matches!(
            fx.manager.make_booking(&booking, None, 7).await,
            Err(CoreError::Validation(_))
        ));
    }

    /// Reports the first attempt as a seat collision, then defers to the store.
    struct CollidingOnce {
        store: Arc<InMemoryStore>,
        attempts: std::sync::Mutex<Vec<Pnr>>,
    }

    #[async_trait]
    impl BookingRepository for CollidingOnce {
        async fn create_booking(&self, booking: &NewBooking) -> CoreResult<BookingReceipt> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(booking.pnr.clone());
                attempts.len()
            };
            if attempt == 1 {
                return Err(CoreError::Conflict("seat taken concurrently".to_string()));
            }
            self.store.create_booking(booking).await
        }

        async fn booking_rows_for_user(&self, user_id: UserId) -> CoreResult<Vec<BookingRow>> {
            self.store.booking_rows_for_user(user_id).await
        }

        async fn cancel_pnr(&self, pnr: &Pnr) -> CoreResult<u64> {
            self.store.cancel_pnr(pnr).await
        }

        async fn pnr_owner(&self, pnr: &Pnr) -> CoreResult<Option<UserId>> {
            self.store.pnr_owner(pnr).await
        }
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_fresh_pnr() {
        let fx = fixture(BookingRules::default()).await;
        let bookings = Arc::new(CollidingOnce {
            store: fx.store.clone(),
            attempts: std::sync::Mutex::new(Vec::new()),
        });
        let manager =
            BookingManager::new(bookings.clone(), fx.store.clone(), BookingRules::default());

        let receipt = manager.make_booking(&departure(&fx.outbound), None, 7).await.unwrap();

        let attempts = bookings.attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0], attempts[1]);
        assert_eq!(receipt.pnr, attempts[1]);
        assert_eq!(fx.store.booking_detail_count(&attempts[0]), 0);
        assert_eq!(fx.store.booking_detail_count(&receipt.pnr), 2);
    }

    #[tokio::test]
    async fn test_collision_without_retries_left_fails() {
        let fx = fixture(BookingRules::default()).await;
        let bookings = Arc::new(CollidingOnce {
            store: fx.store.clone(),
            attempts: std::sync::Mutex::new(Vec::new()),
        });
        let rules = BookingRules { seats_per_leg: 30, max_attempts: 1 };
        let manager = BookingManager::new(bookings.clone(), fx.store.clone(), rules);

        let result = manager.make_booking(&departure(&fx.outbound), None, 7).await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(bookings.attempts.lock().unwrap().len(), 1);
    }
}
