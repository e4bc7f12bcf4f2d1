//! Wire format for the signing and verification HTTP API.

use crate::domain::record::VerificationOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /documents/{kind}/{id}/sign`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignDocumentRequest {
    /// Unlock secret for the signer's certificate container. Held only for
    /// the duration of the request.
    pub unlock_secret: String,
    /// Optional human-readable signing reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Optional signing location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Successful signing response: the verification handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignDocumentResponse {
    pub signature_hash: String,
    pub signed_at: DateTime<Utc>,
    pub verification_url: String,
}

/// Certificate facts exposed to verifiers. Never key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateFacts {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Body of a successful `GET /verify/{hash}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub found: bool,
    pub document_type: String,
    pub signed_at: DateTime<Utc>,
    pub signer_display_name: String,
    pub certificate: CertificateFacts,
    /// Whether the certificate's validity window covered the signing
    /// instant. Later expiry does not retroactively invalidate.
    pub valid_at_signing: bool,
}

impl VerificationResponse {
    #[must_use]
    pub fn from_outcome(outcome: &VerificationOutcome) -> Self {
        Self {
            found: true,
            document_type: outcome.document_type.clone(),
            signed_at: outcome.signed_at,
            signer_display_name: outcome.signer_display_name.clone(),
            certificate: CertificateFacts {
                subject: outcome.certificate.subject.clone(),
                issuer: outcome.certificate.issuer.clone(),
                serial: outcome.certificate.serial.clone(),
                not_before: outcome.certificate.not_before,
                not_after: outcome.certificate.not_after,
            },
            valid_at_signing: outcome.valid_at_signing,
        }
    }
}

/// Body of `GET /verify/{hash}` when the hash is unknown. Deliberately says
/// nothing about whether any underlying document exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationNotFound {
    pub found: bool,
}

impl VerificationNotFound {
    #[must_use]
    pub fn new() -> Self {
        Self { found: false }
    }
}

impl Default for VerificationNotFound {
    fn default() -> Self {
        Self::new()
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable, actionable message.
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.into(),
            message: message.into(),
        }
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

/// Known error codes returned by the API.
pub mod error_codes {
    /// Unlock secret does not match the container.
    pub const WRONG_SECRET: &str = "WRONG_SECRET";
    /// Certificate validity window has elapsed.
    pub const CERTIFICATE_EXPIRED: &str = "CERTIFICATE_EXPIRED";
    /// Certificate validity window has not started.
    pub const CERTIFICATE_NOT_YET_VALID: &str = "CERTIFICATE_NOT_YET_VALID";
    /// Certificate was revoked by its owner.
    pub const CERTIFICATE_REVOKED: &str = "CERTIFICATE_REVOKED";
    /// Container is missing intermediate certificates.
    pub const INCOMPLETE_CHAIN: &str = "INCOMPLETE_CHAIN";
    /// Container bytes are not a valid PKCS#12 structure.
    pub const CORRUPT_CONTAINER: &str = "CORRUPT_CONTAINER";
    /// No usable certificate configured for the signer.
    pub const CERTIFICATE_NOT_FOUND: &str = "CERTIFICATE_NOT_FOUND";
    /// The document has no rendered bytes to sign.
    pub const DOCUMENT_NOT_FOUND: &str = "DOCUMENT_NOT_FOUND";
    /// A signature record already exists for the document.
    pub const ALREADY_SIGNED: &str = "ALREADY_SIGNED";
    /// Signing pool or backing service unavailable.
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
    /// Malformed request.
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    /// Unclassified internal failure.
    pub const INTERNAL: &str = "INTERNAL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_request_deserializes() {
        let json = r#"{"unlock_secret":"s3cret","reason":"Prescription issuance"}"#;
        let request: SignDocumentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.unlock_secret, "s3cret");
        assert_eq!(request.reason.as_deref(), Some("Prescription issuance"));
        assert!(request.location.is_none());
    }

    #[test]
    fn test_not_found_body_shape() {
        let body = serde_json::to_string(&VerificationNotFound::new()).unwrap();
        assert_eq!(body, r#"{"found":false}"#);
    }
}
