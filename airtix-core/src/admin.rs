use std::sync::Arc;

use tracing::{info, warn};

use crate::flight::{airport_code, Flight, NewFlight};
use crate::repository::{AdminRepository, FlightRepository};
use crate::security::{hash_password_async, verify_password_async, PasswordCipher};
use crate::user::{require, within, USERNAME_MAX};
use crate::{CoreResult, FlightId};

/// Admin credentials and flight management, plus the public flight search.
pub struct AdminManager {
    admins: Arc<dyn AdminRepository>,
    flights: Arc<dyn FlightRepository>,
    cipher: Arc<dyn PasswordCipher>,
}

impl AdminManager {
    pub fn new(
        admins: Arc<dyn AdminRepository>,
        flights: Arc<dyn FlightRepository>,
        cipher: Arc<dyn PasswordCipher>,
    ) -> Self {
        Self { admins, flights, cipher }
    }

    pub async fn validate_admin_cred(&self, username: &str, password: &str) -> CoreResult<bool> {
        let password = self.cipher.decrypt(password)?;
        let valid = match self.admins.find_admin_hash(username.trim()).await? {
            Some(hash) => verify_password_async(password, hash).await?,
            None => false,
        };
        if !valid {
            warn!("Rejected admin login for '{}'", username);
        }
        Ok(valid)
    }

    /// Creates the bootstrap admin, or resets its password to the configured one.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> CoreResult<()> {
        require("admin username", username)?;
        require("admin password", password)?;
        within("admin username", username.trim(), USERNAME_MAX)?;
        let hash = hash_password_async(password.to_string()).await?;
        self.admins.upsert_admin(username.trim(), &hash).await?;
        info!("Admin account '{}' is ready", username);
        Ok(())
    }

    pub async fn add_flight(&self, flight: &NewFlight) -> CoreResult<FlightId> {
        let flight = flight.normalized()?;
        let flight_id = self.flights.insert_flight(&flight).await?;
        info!(
            "Added flight {} ({} -> {}, {} legs) as {}",
            flight.flight_number,
            flight.origin(),
            flight.destination(),
            flight.legs.len(),
            flight_id
        );
        Ok(flight_id)
    }

    pub async fn get_flight(&self, flight_id: FlightId) -> CoreResult<Option<Flight>> {
        self.flights.get_flight(flight_id).await
    }

    pub async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        self.flights.list_flights().await
    }

    pub async fn search_flights(&self, origin: &str, destination: &str) -> CoreResult<Vec<Flight>> {
        let origin = airport_code(origin)?;
        let destination = airport_code(destination)?;
        self.flights.search_flights(&origin, &destination).await
    }
}
