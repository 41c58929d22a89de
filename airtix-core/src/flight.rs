use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::user::{require, within};
use crate::{CoreError, CoreResult, FlightId, FlightLegId};

#[derive(Debug, Clone, Deserialize)]
pub struct FlightSearchQuery {
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Flight {
    pub flight_id: FlightId,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub legs: Vec<FlightLeg>,
}

impl Flight {
    pub fn has_leg(&self, flight_leg_id: FlightLegId) -> bool {
        self.legs.iter().any(|leg| leg.flight_leg_id == flight_leg_id)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlightLeg {
    pub flight_leg_id: FlightLegId,
    pub leg_no: i32,
    pub origin: String,
    pub destination: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

/// Admin payload for a new flight: an ordered list of connecting legs.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub legs: Vec<NewFlightLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFlightLeg {
    pub origin: String,
    pub destination: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

impl NewFlight {
    /// Validates the flight and returns it with upper-cased airport codes.
    pub fn normalized(&self) -> CoreResult<NewFlight> {
        require("flight_number", &self.flight_number)?;
        within("flight_number", self.flight_number.trim(), FLIGHT_NUMBER_MAX)?;
        if self.legs.is_empty() {
            return Err(CoreError::Validation("A flight needs at least one leg".to_string()));
        }

        let mut legs = Vec::with_capacity(self.legs.len());
        for leg in &self.legs {
            let origin = airport_code(&leg.origin)?;
            let destination = airport_code(&leg.destination)?;
            if origin == destination {
                return Err(CoreError::Validation(format!(
                    "Leg {} -> {} goes nowhere",
                    origin, destination
                )));
            }
            legs.push(NewFlightLeg {
                origin,
                destination,
                departure_time: leg.departure_time,
                arrival_time: leg.arrival_time,
            });
        }

        for pair in legs.windows(2) {
            if pair[0].destination != pair[1].origin {
                return Err(CoreError::Validation(format!(
                    "Leg ending at {} does not connect to leg starting at {}",
                    pair[0].destination, pair[1].origin
                )));
            }
        }

        Ok(NewFlight {
            flight_number: self.flight_number.trim().to_ascii_uppercase(),
            legs,
        })
    }

    pub fn origin(&self) -> &str {
        self.legs.first().map(|leg| leg.origin.as_str()).unwrap_or_default()
    }

    pub fn destination(&self) -> &str {
        self.legs.last().map(|leg| leg.destination.as_str()).unwrap_or_default()
    }
}

const FLIGHT_NUMBER_MAX: usize = 10;

/// Normalises a three-letter IATA airport code.
pub fn airport_code(raw: &str) -> CoreResult<String> {
    let code = raw.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::Validation(format!("Invalid airport code '{}'", raw)));
    }
    Ok(code.to_ascii_uppercase())
}
