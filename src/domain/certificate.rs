//! Certificate metadata record and usability rules.
//!
//! A `Certificate` never holds container bytes or key material: the container
//! lives in the content store behind an opaque content address, and only a
//! salted hash of the registration secret is kept.

use crate::domain::types::{CertificateClass, PrincipalId};
use crate::infra::error::{SignError, SignResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned certificate identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(pub u64);

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cert-{}", self.0)
    }
}

/// Metadata record for an uploaded certificate container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub owner: PrincipalId,
    pub class: CertificateClass,
    /// Content address (sha256 hex) of the stored container bytes.
    pub container_ref: String,
    /// Salt for the registration-secret hash, hex encoded.
    pub secret_salt: String,
    /// SHA-256 of salt-bytes || secret, hex encoded. The secret itself is
    /// never persisted in recoverable form.
    pub secret_hash: String,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub use_count: u64,
}

impl Certificate {
    /// Check that this certificate may be used for a new signature at `now`.
    ///
    /// Revoked and expired certificates are rejected regardless of the
    /// stored `active` flag; `skew` is the clock tolerance applied to the
    /// validity window comparison.
    pub fn check_usable_at(&self, now: DateTime<Utc>, skew: Duration) -> SignResult<()> {
        if !self.active || self.revoked_at.is_some() {
            return Err(SignError::CertificateRevoked);
        }
        if now > self.not_after + skew {
            return Err(SignError::CertificateExpired {
                not_after: self.not_after.to_rfc3339(),
            });
        }
        if now + skew < self.not_before {
            return Err(SignError::CertificateNotYetValid {
                not_before: self.not_before.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// Re-verify a secret supplied later against the salted registration hash.
    #[must_use]
    pub fn matches_registration_secret(&self, secret: &str) -> bool {
        let Ok(salt) = hex::decode(&self.secret_salt) else {
            return false;
        };
        hash_secret(&salt, secret) == self.secret_hash
    }
}

/// Salted SHA-256 of an unlock secret, hex encoded.
#[must_use]
pub fn hash_secret(salt: &[u8], secret: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
