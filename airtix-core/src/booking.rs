use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pnr::Pnr;
use crate::user::{require, within, CONTACT_MAX, NAME_MAX};
use crate::{CoreError, CoreResult, FlightId, FlightLegId, LegInstanceId, PassengerId, UserId};

/// One flight of a booking as submitted by the customer.
///
/// The passenger fields are only read from the departure flight; on the return
/// flight they may be omitted and are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightBooking {
    pub flight_id: FlightId,
    pub flight_leg_ids: Vec<FlightLegId>,
    pub travel_date: NaiveDate,
    /// Flight cost in minor currency units.
    pub cost: i32,
    #[serde(default)]
    pub passenger_name: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub age: Option<i32>,
}

impl FlightBooking {
    pub fn passenger(&self) -> CoreResult<PassengerInfo> {
        require("passenger_name", &self.passenger_name)?;
        require("contact_number", &self.contact_number)?;
        within("passenger_name", self.passenger_name.trim(), NAME_MAX)?;
        within("contact_number", self.contact_number.trim(), CONTACT_MAX)?;
        let age = self
            .age
            .ok_or_else(|| CoreError::Validation("age is required".to_string()))?;
        if !(0..=130).contains(&age) {
            return Err(CoreError::Validation(format!("Implausible passenger age {}", age)));
        }
        Ok(PassengerInfo {
            name: self.passenger_name.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            age,
        })
    }

    /// Checks the leg list and date without touching storage.
    pub fn check_itinerary(&self, today: NaiveDate) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for leg in &self.flight_leg_ids {
            if !seen.insert(*leg) {
                return Err(CoreError::Validation(format!(
                    "Leg {} listed twice for flight {}",
                    leg, self.flight_id
                )));
            }
        }
        if self.travel_date < today {
            return Err(CoreError::Validation(format!(
                "Travel date {} is in the past",
                self.travel_date
            )));
        }
        if self.cost < 0 {
            return Err(CoreError::Validation("cost must not be negative".to_string()));
        }
        Ok(())
    }

    pub fn segments(&self) -> impl Iterator<Item = BookingSegment> + '_ {
        self.flight_leg_ids.iter().map(move |leg| BookingSegment {
            flight_id: self.flight_id,
            flight_leg_id: *leg,
            travel_date: self.travel_date,
            amount: self.cost,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub departure: FlightBooking,
    #[serde(default, rename = "return")]
    pub return_flight: Option<FlightBooking>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassengerInfo {
    pub name: String,
    pub contact_number: String,
    pub age: i32,
}

/// One leg to be reserved: becomes a leg instance plus a booking detail row.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSegment {
    pub flight_id: FlightId,
    pub flight_leg_id: FlightLegId,
    pub travel_date: NaiveDate,
    pub amount: i32,
}

/// Everything a repository needs to write one booking atomically.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub pnr: Pnr,
    pub user_id: UserId,
    pub passenger: PassengerInfo,
    pub segments: Vec<BookingSegment>,
    pub seats_per_leg: i32,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub pnr: Pnr,
    pub passenger_id: PassengerId,
    pub legs: Vec<BookedLeg>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookedLeg {
    pub leg_instance_id: LegInstanceId,
    pub flight_id: FlightId,
    pub flight_leg_id: FlightLegId,
    pub travel_date: NaiveDate,
    pub seat_no: i32,
}

/// Flat row of the booking listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRow {
    pub ticket_pnr: String,
    pub flight_id: FlightId,
    pub flight_leg_id: FlightLegId,
    pub seat_id: i32,
    pub travel_date: NaiveDate,
    pub amount: i32,
    pub age: i32,
    pub passenger_name: String,
    pub contact_number: String,
}

/// One flight of a booking with its legs and seats, as shown to the customer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingData {
    pub pnr: String,
    pub flight_id: FlightId,
    pub travel_date: NaiveDate,
    pub amount: i32,
    pub passenger_name: String,
    pub contact_number: String,
    pub age: i32,
    pub flight_leg_ids: Vec<FlightLegId>,
    pub seat_numbers: Vec<i32>,
}

/// Folds consecutive rows of the same (pnr, flight, date) into one entry.
/// Rows must arrive ordered by booking and insertion order.
pub fn group_booking_rows(rows: Vec<BookingRow>) -> Vec<BookingData> {
    let mut grouped: Vec<BookingData> = Vec::new();

    for row in rows {
        if let Some(last) = grouped.last_mut() {
            if last.pnr == row.ticket_pnr
                && last.flight_id == row.flight_id
                && last.travel_date == row.travel_date
            {
                last.flight_leg_ids.push(row.flight_leg_id);
                last.seat_numbers.push(row.seat_id);
                continue;
            }
        }

        grouped.push(BookingData {
            pnr: row.ticket_pnr,
            flight_id: row.flight_id,
            travel_date: row.travel_date,
            amount: row.amount,
            passenger_name: row.passenger_name,
            contact_number: row.contact_number,
            age: row.age,
            flight_leg_ids: vec![row.flight_leg_id],
            seat_numbers: vec![row.seat_id],
        });
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pnr: &str, flight_id: i32, leg: i32, seat: i32) -> BookingRow {
        BookingRow {
            ticket_pnr: pnr.to_string(),
            flight_id,
            flight_leg_id: leg,
            seat_id: seat,
            travel_date: NaiveDate::from_ymd_opt(2027, 3, 14).unwrap(),
            amount: 12_500,
            age: 34,
            passenger_name: "Alice".to_string(),
            contact_number: "555-0100".to_string(),
        }
    }

    #[test]
    fn test_round_trip_grouping() {
        let rows = vec![
            row("AAAAAAAAAA", 1, 101, 4),
            row("AAAAAAAAAA", 1, 102, 17),
            row("AAAAAAAAAA", 2, 201, 9),
        ];
        let grouped = group_booking_rows(rows);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].flight_leg_ids, vec![101, 102]);
        assert_eq!(grouped[0].seat_numbers, vec![4, 17]);
        assert_eq!(grouped[1].flight_leg_ids, vec![201]);
        assert!(grouped.iter().all(|b| b.pnr == "AAAAAAAAAA"));
    }

    #[test]
    fn test_same_flight_different_bookings_stay_apart() {
        let rows = vec![row("AAAAAAAAAA", 1, 101, 4), row("BBBBBBBBBB", 1, 101, 5)];
        let grouped = group_booking_rows(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[1].pnr, "BBBBBBBBBB");
    }

    #[test]
    fn test_return_passenger_fields_optional() {
        let json = r#"
            {
                "departure": {
                    "flight_id": 1, "flight_leg_ids": [101, 102], "travel_date": "2027-03-14",
                    "cost": 12500, "passenger_name": "Alice", "contact_number": "555-0100",
                    "age": 34
                },
                "return": {
                    "flight_id": 2, "flight_leg_ids": [201], "travel_date": "2027-03-21",
                    "cost": 9900
                }
            }
        "#;
        let request: BookingRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(request.departure.passenger().is_ok());
        let ret = request.return_flight.unwrap();
        assert!(ret.passenger().is_err());
        assert_eq!(ret.segments().count(), 1);
    }

    #[test]
    fn test_itinerary_checks() {
        let today = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let mut flight = FlightBooking {
            flight_id: 1,
            flight_leg_ids: vec![101, 101],
            travel_date: NaiveDate::from_ymd_opt(2027, 3, 14).unwrap(),
            cost: 100,
            passenger_name: String::new(),
            contact_number: String::new(),
            age: None,
        };
        assert!(flight.check_itinerary(today).is_err());

        flight.flight_leg_ids = vec![101, 102];
        assert!(flight.check_itinerary(today).is_ok());

        flight.travel_date = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert!(flight.check_itinerary(today).is_err());
    }

    #[test]
    fn test_passenger_fields_fit_their_columns() {
        let mut flight = FlightBooking {
            flight_id: 1,
            flight_leg_ids: vec![101],
            travel_date: NaiveDate::from_ymd_opt(2027, 3, 14).unwrap(),
            cost: 100,
            passenger_name: "Alice".to_string(),
            contact_number: "+91 98765 43210".to_string(),
            age: Some(34),
        };
        assert!(flight.passenger().is_ok());

        flight.contact_number = "+91 98765 43210 ext. 221".to_string();
        assert!(matches!(flight.passenger(), Err(CoreError::Validation(_))));

        flight.contact_number = "555-0100".to_string();
        flight.passenger_name = "N".repeat(101);
        assert!(matches!(flight.passenger(), Err(CoreError::Validation(_))));
    }
}
