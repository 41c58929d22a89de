use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

pub const PNR_LENGTH: usize = 10;

const PNR_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Passenger Name Record: the reference shared by every leg of one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pnr(String);

impl Pnr {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..PNR_LENGTH)
            .map(|_| PNR_CHARSET[rng.gen_range(0..PNR_CHARSET.len())] as char)
            .collect();
        Pnr(code)
    }

    /// Accepts user input in any case.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != PNR_LENGTH || !code.bytes().all(|b| PNR_CHARSET.contains(&b)) {
            return Err(CoreError::Validation(format!("Invalid PNR '{}'", raw)));
        }
        Ok(Pnr(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pnr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
