use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::booking::{BookedLeg, BookingReceipt, BookingRow, NewBooking};
use crate::flight::{Flight, FlightLeg, NewFlight};
use crate::pnr::Pnr;
use crate::repository::{AdminRepository, BookingRepository, FlightRepository, UserRepository};
use crate::seating::pick_seat;
use crate::user::{
    Gender, NewAccount, PersonDetail, ProfileChanges, SecurityChallenge, StoredCredential,
    UserProfile,
};
use crate::{
    CoreError, CoreResult, FlightId, FlightLegId, LegInstanceId, PassengerId, PersonId, UserId,
};

/// Process-local store implementing every repository trait.
///
/// Ids are assigned sequentially from 1 and rows are never removed, mirroring
/// the relational schema. All operations run under one lock, so a booking is
/// either applied completely or not at all.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    persons: Vec<PersonRow>,
    users: Vec<UserRow>,
    admins: Vec<AdminRow>,
    flights: Vec<Flight>,
    leg_count: i32,
    passengers: Vec<PassengerRow>,
    leg_instances: Vec<LegInstanceRow>,
    booking_details: Vec<BookingDetailRow>,
}

struct PersonRow {
    name: String,
    contact_no: String,
    address: String,
    gender: Option<Gender>,
}

struct UserRow {
    user_id: UserId,
    username: String,
    password_hash: String,
    person_id: PersonId,
    security_question: String,
    security_answer: String,
    active: bool,
}

struct AdminRow {
    username: String,
    password_hash: String,
    active: bool,
}

struct PassengerRow {
    person_id: PersonId,
    age: i32,
}

struct LegInstanceRow {
    flight_id: FlightId,
    flight_leg_id: FlightLegId,
    seat_id: i32,
    travel_date: NaiveDate,
    active: bool,
}

struct BookingDetailRow {
    booking_detail_id: i32,
    leg_instance_id: LegInstanceId,
    ticket_pnr: String,
    booking_time: DateTime<Utc>,
    user_id: UserId,
    passenger_id: PassengerId,
    amount: i32,
}

fn next_id(len: usize) -> i32 {
    len as i32 + 1
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> CoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::Storage("In-memory store lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn booking_detail_count(&self, pnr: &Pnr) -> usize {
        let state = self.state.lock().unwrap();
        state
            .booking_details
            .iter()
            .filter(|d| d.ticket_pnr == pnr.as_str())
            .count()
    }

    #[cfg(test)]
    pub(crate) fn passenger_count(&self) -> usize {
        self.state.lock().unwrap().passengers.len()
    }
}

impl MemoryState {
    fn person(&self, person_id: PersonId) -> CoreResult<&PersonRow> {
        self.persons
            .get((person_id - 1) as usize)
            .ok_or_else(|| CoreError::Storage(format!("Dangling person reference {}", person_id)))
    }

    fn active_user_index(&self, user_id: UserId) -> Option<usize> {
        self.users.iter().position(|u| u.user_id == user_id && u.active)
    }

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && Some(u.user_id) != except)
    }

    fn occupied_seats(
        &self,
        flight_id: FlightId,
        flight_leg_id: FlightLegId,
        travel_date: NaiveDate,
    ) -> HashSet<i32> {
        self.leg_instances
            .iter()
            .filter(|li| {
                li.active
                    && li.flight_id == flight_id
                    && li.flight_leg_id == flight_leg_id
                    && li.travel_date == travel_date
            })
            .map(|li| li.seat_id)
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, account: &NewAccount) -> CoreResult<UserId> {
        let mut state = self.state()?;
        if state.username_taken(&account.username, None) {
            return Err(CoreError::Conflict(format!("Username '{}' is taken", account.username)));
        }

        let person_id = next_id(state.persons.len());
        state.persons.push(PersonRow {
            name: account.person.name.clone(),
            contact_no: account.person.contact_number.clone(),
            address: account.person.address.clone(),
            gender: Some(account.person.gender),
        });

        let user_id = next_id(state.users.len());
        state.users.push(UserRow {
            user_id,
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            person_id,
            security_question: account.security_question.clone(),
            security_answer: account.security_answer.clone(),
            active: true,
        });

        Ok(user_id)
    }

    async fn find_credential(&self, username: &str) -> CoreResult<Option<StoredCredential>> {
        let state = self.state()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.active && u.username == username)
            .map(|u| StoredCredential {
                user_id: u.user_id,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<UserProfile>> {
        let state = self.state()?;
        let Some(index) = state.active_user_index(user_id) else {
            return Ok(None);
        };
        let user = &state.users[index];
        let person = state.person(user.person_id)?;
        let gender = person
            .gender
            .ok_or_else(|| CoreError::Storage(format!("Person {} has no gender", user.person_id)))?;

        Ok(Some(UserProfile {
            user_id,
            username: user.username.clone(),
            person_id: user.person_id,
            person: PersonDetail {
                name: person.name.clone(),
                contact_number: person.contact_no.clone(),
                address: person.address.clone(),
                gender,
            },
        }))
    }

    async fn update_user(&self, changes: &ProfileChanges) -> CoreResult<()> {
        let mut state = self.state()?;
        let index = state
            .active_user_index(changes.user_id)
            .ok_or_else(|| CoreError::NotFound(format!("User {}", changes.user_id)))?;
        if state.username_taken(&changes.username, Some(changes.user_id)) {
            return Err(CoreError::Conflict(format!("Username '{}' is taken", changes.username)));
        }

        let user = &mut state.users[index];
        user.username = changes.username.clone();
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        let person_index = (user.person_id - 1) as usize;

        let person = state
            .persons
            .get_mut(person_index)
            .ok_or_else(|| {
                CoreError::Storage(format!("Dangling person reference {}", person_index + 1))
            })?;
        person.name = changes.person_name.clone();
        person.contact_no = changes.contact_number.clone();
        person.address = changes.address.clone();
        Ok(())
    }

    async fn security_challenge(&self, username: &str) -> CoreResult<Option<SecurityChallenge>> {
        let state = self.state()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| SecurityChallenge {
                question: u.security_question.clone(),
                answer: u.security_answer.clone(),
            }))
    }

    async fn set_password_hash(&self, username: &str, password_hash: &str) -> CoreResult<()> {
        let mut state = self.state()?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(format!("User '{}'", username)))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<BookingReceipt> {
        let mut state = self.state()?;
        if state.booking_details.iter().any(|d| d.ticket_pnr == booking.pnr.as_str()) {
            return Err(CoreError::Conflict(format!("PNR {} already issued", booking.pnr)));
        }

        // Draw every seat before writing anything.
        let mut seats = Vec::with_capacity(booking.segments.len());
        for (i, segment) in booking.segments.iter().enumerate() {
            let mut occupied =
                state.occupied_seats(segment.flight_id, segment.flight_leg_id, segment.travel_date);
            for (earlier, seat) in booking.segments[..i].iter().zip(&seats) {
                if earlier.flight_id == segment.flight_id
                    && earlier.flight_leg_id == segment.flight_leg_id
                    && earlier.travel_date == segment.travel_date
                {
                    occupied.insert(*seat);
                }
            }
            let seat = pick_seat(&occupied, booking.seats_per_leg).ok_or_else(|| {
                CoreError::Conflict(format!(
                    "No free seat on leg {} of flight {} on {}",
                    segment.flight_leg_id, segment.flight_id, segment.travel_date
                ))
            })?;
            seats.push(seat);
        }

        let person_id = next_id(state.persons.len());
        state.persons.push(PersonRow {
            name: booking.passenger.name.clone(),
            contact_no: booking.passenger.contact_number.clone(),
            address: String::new(),
            gender: None,
        });

        let passenger_id = next_id(state.passengers.len());
        state.passengers.push(PassengerRow {
            person_id,
            age: booking.passenger.age,
        });

        let mut legs = Vec::with_capacity(seats.len());
        for (segment, seat) in booking.segments.iter().zip(seats) {
            let leg_instance_id = next_id(state.leg_instances.len());
            state.leg_instances.push(LegInstanceRow {
                flight_id: segment.flight_id,
                flight_leg_id: segment.flight_leg_id,
                seat_id: seat,
                travel_date: segment.travel_date,
                active: true,
            });

            let booking_detail_id = next_id(state.booking_details.len());
            state.booking_details.push(BookingDetailRow {
                booking_detail_id,
                leg_instance_id,
                ticket_pnr: booking.pnr.as_str().to_string(),
                booking_time: booking.booked_at,
                user_id: booking.user_id,
                passenger_id,
                amount: segment.amount,
            });

            legs.push(BookedLeg {
                leg_instance_id,
                flight_id: segment.flight_id,
                flight_leg_id: segment.flight_leg_id,
                travel_date: segment.travel_date,
                seat_no: seat,
            });
        }

        Ok(BookingReceipt {
            pnr: booking.pnr.clone(),
            passenger_id,
            legs,
        })
    }

    async fn booking_rows_for_user(&self, user_id: UserId) -> CoreResult<Vec<BookingRow>> {
        let state = self.state()?;
        let mut details: Vec<&BookingDetailRow> = state
            .booking_details
            .iter()
            .filter(|d| d.user_id == user_id)
            .collect();
        details.sort_by(|a, b| {
            (a.booking_time, &a.ticket_pnr, a.booking_detail_id)
                .cmp(&(b.booking_time, &b.ticket_pnr, b.booking_detail_id))
        });

        let mut rows = Vec::new();
        for detail in details {
            let leg = &state.leg_instances[(detail.leg_instance_id - 1) as usize];
            if !leg.active {
                continue;
            }
            let passenger = &state.passengers[(detail.passenger_id - 1) as usize];
            let person = state.person(passenger.person_id)?;
            rows.push(BookingRow {
                ticket_pnr: detail.ticket_pnr.clone(),
                flight_id: leg.flight_id,
                flight_leg_id: leg.flight_leg_id,
                seat_id: leg.seat_id,
                travel_date: leg.travel_date,
                amount: detail.amount,
                age: passenger.age,
                passenger_name: person.name.clone(),
                contact_number: person.contact_no.clone(),
            });
        }
        Ok(rows)
    }

    async fn cancel_pnr(&self, pnr: &Pnr) -> CoreResult<u64> {
        let mut state = self.state()?;
        let instances: Vec<LegInstanceId> = state
            .booking_details
            .iter()
            .filter(|d| d.ticket_pnr == pnr.as_str())
            .map(|d| d.leg_instance_id)
            .collect();
        if instances.is_empty() {
            return Err(CoreError::NotFound(format!("Booking {}", pnr)));
        }

        let mut cancelled = 0;
        for id in instances {
            let leg = &mut state.leg_instances[(id - 1) as usize];
            if leg.active {
                leg.active = false;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn pnr_owner(&self, pnr: &Pnr) -> CoreResult<Option<UserId>> {
        let state = self.state()?;
        Ok(state
            .booking_details
            .iter()
            .find(|d| d.ticket_pnr == pnr.as_str())
            .map(|d| d.user_id))
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn insert_flight(&self, flight: &NewFlight) -> CoreResult<FlightId> {
        let mut state = self.state()?;
        if state.flights.iter().any(|f| f.flight_number == flight.flight_number) {
            return Err(CoreError::Conflict(format!(
                "Flight {} already exists",
                flight.flight_number
            )));
        }

        let flight_id = next_id(state.flights.len());
        let mut legs = Vec::with_capacity(flight.legs.len());
        for (i, leg) in flight.legs.iter().enumerate() {
            state.leg_count += 1;
            legs.push(FlightLeg {
                flight_leg_id: state.leg_count,
                leg_no: i as i32 + 1,
                origin: leg.origin.clone(),
                destination: leg.destination.clone(),
                departure_time: leg.departure_time,
                arrival_time: leg.arrival_time,
            });
        }

        state.flights.push(Flight {
            flight_id,
            flight_number: flight.flight_number.clone(),
            origin: flight.origin().to_string(),
            destination: flight.destination().to_string(),
            legs,
        });
        Ok(flight_id)
    }

    async fn get_flight(&self, flight_id: FlightId) -> CoreResult<Option<Flight>> {
        let state = self.state()?;
        Ok(state.flights.iter().find(|f| f.flight_id == flight_id).cloned())
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let state = self.state()?;
        let mut flights = state.flights.clone();
        flights.sort_by(|a, b| a.flight_number.cmp(&b.flight_number));
        Ok(flights)
    }

    async fn search_flights(&self, origin: &str, destination: &str) -> CoreResult<Vec<Flight>> {
        let state = self.state()?;
        let mut flights: Vec<Flight> = state
            .flights
            .iter()
            .filter(|f| {
                f.origin.eq_ignore_ascii_case(origin)
                    && f.destination.eq_ignore_ascii_case(destination)
            })
            .cloned()
            .collect();
        flights.sort_by(|a, b| a.flight_number.cmp(&b.flight_number));
        Ok(flights)
    }
}

#[async_trait]
impl AdminRepository for InMemoryStore {
    async fn find_admin_hash(&self, username: &str) -> CoreResult<Option<String>> {
        let state = self.state()?;
        Ok(state
            .admins
            .iter()
            .find(|a| a.active && a.username == username)
            .map(|a| a.password_hash.clone()))
    }

    async fn upsert_admin(&self, username: &str, password_hash: &str) -> CoreResult<()> {
        let mut state = self.state()?;
        match state.admins.iter_mut().find(|a| a.username == username) {
            Some(admin) => {
                admin.password_hash = password_hash.to_string();
                admin.active = true;
            }
            None => state.admins.push(AdminRow {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                active: true,
            }),
        }
        Ok(())
    }
}
