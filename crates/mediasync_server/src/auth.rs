//! Shared-secret authorization for the gateway.
//!
//! Callers present a secret in the `x-api-key` header. Two tiers exist:
//!
//! - the write secret (`API_KEY`) authorizes every operation
//! - the optional read secret (`READ_KEY`) authorizes reads only
//!
//! When no read secret is configured, reads require the write secret.
//! When no write secret is configured, nothing is authorized.

use crate::config::{GatewayConfig, Secret};
use crate::error::{GatewayError, GatewayResult};

/// Compares two byte strings without short-circuiting on the first
/// differing byte.
///
/// Inputs of different length are rejected up front; only equal-length
/// inputs are compared in constant time.
pub fn secure_compare(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Proof that a request passed read authorization.
#[derive(Debug, Clone, Copy)]
pub struct ReadGrant(());

/// Proof that a request passed write authorization.
#[derive(Debug, Clone, Copy)]
pub struct WriteGrant(());

/// The configured secrets.
#[derive(Debug, Clone)]
pub struct Credentials {
    write: Option<Secret>,
    read: Option<Secret>,
}

impl Credentials {
    /// Creates credentials from explicit secrets.
    pub fn new(write: Option<Secret>, read: Option<Secret>) -> Self {
        Self { write, read }
    }

    /// Takes the secrets out of a gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.api_key.clone(), config.read_key.clone())
    }

    /// Checks a presented secret against the write tier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] on any mismatch, on an absent
    /// header, or when no write secret is configured.
    pub fn authorize_write(&self, provided: Option<&str>) -> GatewayResult<WriteGrant> {
        if matches_secret(provided, self.write.as_ref()) {
            Ok(WriteGrant(()))
        } else {
            Err(GatewayError::Unauthorized)
        }
    }

    /// Checks a presented secret against the read tier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if the secret matches neither
    /// the write secret nor the read secret.
    pub fn authorize_read(&self, provided: Option<&str>) -> GatewayResult<ReadGrant> {
        let write_ok = matches_secret(provided, self.write.as_ref());
        let read_ok = self.read.is_some() && matches_secret(provided, self.read.as_ref());
        if write_ok || read_ok {
            Ok(ReadGrant(()))
        } else {
            Err(GatewayError::Unauthorized)
        }
    }
}

fn matches_secret(provided: Option<&str>, expected: Option<&Secret>) -> bool {
    match (provided, expected) {
        (Some(provided), Some(expected)) => secure_compare(provided.as_bytes(), expected.expose()),
        _ => false,
    }
}
