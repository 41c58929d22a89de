use std::sync::Arc;

use airtix_core::repository::{AdminRepository, BookingRepository, FlightRepository, UserRepository};
use airtix_core::security::{PasswordCipher, PlainTextCipher};
use airtix_core::{AccountManager, AdminManager, BookingManager, BookingRules, InMemoryStore};
use airtix_store::{
    DbClient, PostgresAdminRepository, PostgresBookingRepository, PostgresFlightRepository,
    PostgresUserRepository,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountManager>,
    pub bookings: Arc<BookingManager>,
    pub admin: Arc<AdminManager>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        bookings: Arc<dyn BookingRepository>,
        flights: Arc<dyn FlightRepository>,
        admins: Arc<dyn AdminRepository>,
        rules: BookingRules,
        auth: AuthConfig,
    ) -> Self {
        let cipher: Arc<dyn PasswordCipher> = Arc::new(PlainTextCipher);
        Self {
            accounts: Arc::new(AccountManager::new(users, cipher.clone())),
            bookings: Arc::new(BookingManager::new(bookings, flights.clone(), rules)),
            admin: Arc::new(AdminManager::new(admins, flights, cipher)),
            auth,
        }
    }

    /// All repositories backed by one process-local store.
    pub fn in_memory(rules: BookingRules, auth: AuthConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store.clone(), store.clone(), store, rules, auth)
    }

    pub fn with_database(db: &DbClient, rules: BookingRules, auth: AuthConfig) -> Self {
        Self::new(
            Arc::new(PostgresUserRepository::new(db.pool.clone())),
            Arc::new(PostgresBookingRepository::new(db.pool.clone())),
            Arc::new(PostgresFlightRepository::new(db.pool.clone())),
            Arc::new(PostgresAdminRepository::new(db.pool.clone())),
            rules,
            auth,
        )
    }
}
