//! Argon2 token hasher.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::domain::errors::TokenError;
use crate::ports::TokenHasher;

/// Argon2id with a fresh salt per hash; verification is constant-time.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Custom cost parameters. Low costs are only sensible in tests.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, TokenError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| TokenError::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, TokenError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| TokenError::Hash(e.to_string()))
    }

    fn verify(&self, secret: &str, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(candidate) else {
            return false;
        };
        // parameters come from the hash string itself
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}
