use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::{CoreError, CoreResult};

/// Turns a password as transmitted by the client into plain text.
pub trait PasswordCipher: Send + Sync {
    fn decrypt(&self, transmitted: &str) -> CoreResult<String>;
}

/// Cipher for deployments where the transport (TLS) already protects passwords.
pub struct PlainTextCipher;

impl PasswordCipher for PlainTextCipher {
    fn decrypt(&self, transmitted: &str) -> CoreResult<String> {
        Ok(transmitted.to_string())
    }
}

/// Argon2id hash in PHC string format.
pub fn hash_password(plain: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Storage(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Runs CPU-heavy password work on the blocking pool, away from async workers.
async fn off_worker<T, F>(work: F) -> CoreResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CoreError::Storage(format!("Password task failed: {}", e)))
}

pub async fn hash_password_async(plain: String) -> CoreResult<String> {
    off_worker(move || hash_password(&plain)).await?
}

pub async fn verify_password_async(plain: String, stored_hash: String) -> CoreResult<bool> {
    off_worker(move || verify_password(&plain, &stored_hash)).await
}
