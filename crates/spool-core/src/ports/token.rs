//! TokenHasher port - one-way hash of the pointer used as the worker's
//! shared secret.

use crate::domain::errors::TokenError;

pub trait TokenHasher: Send + Sync {
    /// Salted hash of `secret`, safe to put in a query string.
    fn hash(&self, secret: &str) -> Result<String, TokenError>;

    /// Constant-time check of `candidate` against `secret`. Malformed hashes
    /// verify as false.
    fn verify(&self, secret: &str, candidate: &str) -> bool;
}
