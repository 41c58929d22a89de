use async_trait::async_trait;

use crate::booking::{BookingReceipt, BookingRow, NewBooking};
use crate::flight::{Flight, NewFlight};
use crate::pnr::Pnr;
use crate::user::{NewAccount, ProfileChanges, SecurityChallenge, StoredCredential, UserProfile};
use crate::{CoreResult, FlightId, UserId};

/// Repository trait for user accounts and their person records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the person and the user in one transaction.
    async fn insert_user(&self, account: &NewAccount) -> CoreResult<UserId>;

    /// Credential of the active user with this username.
    async fn find_credential(&self, username: &str) -> CoreResult<Option<StoredCredential>>;

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<UserProfile>>;

    /// Updates user and person rows together; `NotFound` for unknown or inactive users.
    async fn update_user(&self, changes: &ProfileChanges) -> CoreResult<()>;

    async fn security_challenge(&self, username: &str) -> CoreResult<Option<SecurityChallenge>>;

    /// `NotFound` when no user carries this username.
    async fn set_password_hash(&self, username: &str, password_hash: &str) -> CoreResult<()>;
}

/// Repository trait for bookings (passengers, leg instances, booking details)
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Writes the whole booking or nothing. Seats are drawn inside the write;
    /// a reused PNR or an unavailable seat is reported as `Conflict`.
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<BookingReceipt>;

    /// Active legs of the user's bookings, ordered by booking time, PNR and insertion.
    async fn booking_rows_for_user(&self, user_id: UserId) -> CoreResult<Vec<BookingRow>>;

    /// Deactivates the PNR's active leg instances and returns how many changed.
    /// `NotFound` when the PNR was never issued.
    async fn cancel_pnr(&self, pnr: &Pnr) -> CoreResult<u64>;

    async fn pnr_owner(&self, pnr: &Pnr) -> CoreResult<Option<UserId>>;
}

/// Repository trait for flights and their legs
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn insert_flight(&self, flight: &NewFlight) -> CoreResult<FlightId>;

    async fn get_flight(&self, flight_id: FlightId) -> CoreResult<Option<Flight>>;

    async fn list_flights(&self) -> CoreResult<Vec<Flight>>;

    async fn search_flights(&self, origin: &str, destination: &str) -> CoreResult<Vec<Flight>>;
}

/// Repository trait for admin accounts
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Password hash of the active admin with this username.
    async fn find_admin_hash(&self, username: &str) -> CoreResult<Option<String>>;

    /// Creates the admin or replaces its password, reactivating it.
    async fn upsert_admin(&self, username: &str, password_hash: &str) -> CoreResult<()>;
}
