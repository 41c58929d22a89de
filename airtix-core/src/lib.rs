pub mod accounts;
pub mod admin;
pub mod booking;
pub mod flight;
pub mod memory;
pub mod pnr;
pub mod repository;
pub mod reservations;
pub mod seating;
pub mod security;
pub mod user;

pub use accounts::AccountManager;
pub use admin::AdminManager;
pub use memory::InMemoryStore;
pub use reservations::{BookingManager, BookingRules};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage failure: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

pub type UserId = i32;
pub type PersonId = i32;
pub type PassengerId = i32;
pub type FlightId = i32;
pub type FlightLegId = i32;
pub type LegInstanceId = i32;
