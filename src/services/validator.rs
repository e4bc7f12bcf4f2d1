//! Certificate container validation service.
//!
//! Pure routines over a PKCS#12 byte stream and an unlock secret: unlock the
//! container, judge the validity window, walk the embedded chain, and extract
//! the display snapshot. Invoked twice per certificate lifetime: a coarse
//! check at registration and the authoritative check at signing time.

use crate::domain::record::CertificateSnapshot;
use crate::domain::types::UnlockSecret;
use crate::infra::error::{SignError, SignResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509NameRef, X509Ref, X509VerifyResult, X509};

/// Maximum chain depth accepted when walking issuer links.
const MAX_CHAIN_DEPTH: usize = 16;

/// Result of a successful container validation.
///
/// Holds the unlocked private key; the value is scoped to a single signing
/// attempt and must not be cached or persisted.
pub struct ValidatedContainer {
    pub private_key: PKey<Private>,
    pub leaf: X509,
    /// Chain certificates embedded in the container, excluding the leaf.
    pub chain: Vec<X509>,
    pub snapshot: CertificateSnapshot,
}

pub struct ContainerValidator;

impl ContainerValidator {
    /// Unlock and validate a PKCS#12 container.
    ///
    /// Distinct failures:
    /// - `CorruptContainer`: bytes are not a parseable PKCS#12 structure, or
    ///   the container lacks a private key or leaf certificate
    /// - `WrongSecret`: the secret fails the container's MAC check
    /// - `CertificateExpired` / `CertificateNotYetValid`: `now` falls outside
    ///   the leaf validity window (with `skew` tolerance)
    /// - `IncompleteChain`: a non-root certificate's issuer is missing from
    ///   the container
    pub fn validate(
        container: &[u8],
        secret: &UnlockSecret,
        now: DateTime<Utc>,
        skew: Duration,
    ) -> SignResult<ValidatedContainer> {
        let pkcs12 = Pkcs12::from_der(container)
            .map_err(|e| SignError::CorruptContainer(first_reason(&e)))?;

        let parsed = pkcs12
            .parse2(secret.expose())
            .map_err(classify_unlock_error)?;

        let private_key = parsed
            .pkey
            .ok_or_else(|| SignError::CorruptContainer("container holds no private key".into()))?;
        let leaf = parsed.cert.ok_or_else(|| {
            SignError::CorruptContainer("container holds no leaf certificate".into())
        })?;
        let extras: Vec<X509> = parsed
            .ca
            .map(|stack| stack.into_iter().collect())
            .unwrap_or_default();

        let not_before = asn1_time_to_utc(leaf.not_before())?;
        let not_after = asn1_time_to_utc(leaf.not_after())?;
        if now > not_after + skew {
            return Err(SignError::CertificateExpired {
                not_after: not_after.to_rfc3339(),
            });
        }
        if now + skew < not_before {
            return Err(SignError::CertificateNotYetValid {
                not_before: not_before.to_rfc3339(),
            });
        }

        Self::check_chain_complete(&leaf, &extras)?;

        let snapshot = CertificateSnapshot {
            subject: format_name(leaf.subject_name()),
            issuer: format_name(leaf.issuer_name()),
            serial: extract_serial(&leaf)?,
            not_before,
            not_after,
        };

        log::debug!(
            "Validated container: subject='{}', issuer='{}', chain certs={}",
            snapshot.subject,
            snapshot.issuer,
            extras.len()
        );

        Ok(ValidatedContainer {
            private_key,
            leaf,
            chain: extras,
            snapshot,
        })
    }

    /// Every non-self-signed certificate on the leaf's path must have its
    /// issuer present in the container. A chain stopping at an intermediate
    /// is the classic "exported without full chain" mistake and gets its own
    /// error so the user can re-export.
    fn check_chain_complete(leaf: &X509Ref, extras: &[X509]) -> SignResult<()> {
        let mut current: &X509Ref = leaf;
        for _ in 0..MAX_CHAIN_DEPTH {
            if current.issued(current) == X509VerifyResult::OK {
                // Reached a self-signed root; the embedded chain is complete.
                return Ok(());
            }
            match extras
                .iter()
                .find(|candidate| candidate.issued(current) == X509VerifyResult::OK)
            {
                Some(issuer) => current = issuer,
                None => {
                    return Err(SignError::IncompleteChain {
                        subject: format_name(current.subject_name()),
                    })
                }
            }
        }
        Err(SignError::CorruptContainer(format!(
            "certificate chain exceeds maximum depth of {MAX_CHAIN_DEPTH}"
        )))
    }
}

/// Wrong secret and corrupt structure both surface as a `parse2` failure;
/// the MAC verification reason distinguishes the former.
fn classify_unlock_error(error: openssl::error::ErrorStack) -> SignError {
    let mac_failure = error.errors().iter().any(|e| {
        e.reason()
            .is_some_and(|r| r.to_ascii_lowercase().contains("mac"))
    });
    if mac_failure {
        SignError::WrongSecret
    } else {
        SignError::CorruptContainer(first_reason(&error))
    }
}

fn first_reason(error: &openssl::error::ErrorStack) -> String {
    error
        .errors()
        .first()
        .and_then(|e| e.reason())
        .map_or_else(|| error.to_string(), ToString::to_string)
}

/// Convert an ASN.1 time to UTC by diffing against the Unix epoch.
pub fn asn1_time_to_utc(time: &Asn1TimeRef) -> SignResult<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0)
        .map_err(|e| SignError::InternalSigningFailure(format!("epoch construction: {e}")))?;
    let diff = epoch
        .diff(time)
        .map_err(|e| SignError::CorruptContainer(format!("unparseable certificate time: {e}")))?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
        SignError::CorruptContainer(format!("certificate time out of range: {seconds}"))
    })
}

/// Render an X.509 name as `CN=..., O=..., C=...`.
#[must_use]
pub fn format_name(name: &X509NameRef) -> String {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let key = entry
            .object()
            .nid()
            .short_name()
            .unwrap_or("UNKNOWN")
            .to_string();
        let value = String::from_utf8_lossy(entry.data().as_slice()).into_owned();
        parts.push(format!("{key}={value}"));
    }
    parts.join(", ")
}

fn extract_serial(cert: &X509Ref) -> SignResult<String> {
    let bn = cert
        .serial_number()
        .to_bn()
        .map_err(|e| SignError::CorruptContainer(format!("unreadable serial number: {e}")))?;
    let hex_str = bn
        .to_hex_str()
        .map_err(|e| SignError::CorruptContainer(format!("unreadable serial number: {e}")))?;
    Ok(hex_str.to_ascii_lowercase())
}
