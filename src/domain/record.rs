//! Signature records and the sanitized verification view.

use crate::domain::certificate::CertificateId;
use crate::domain::types::{DocumentRef, PrincipalId, SignatureHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-sensitive certificate facts captured at signing time.
///
/// Stored alongside the record so verification never needs to reopen the
/// certificate container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSnapshot {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Append-only record of one completed signature.
///
/// Immutable once written; a superseding document gets a new identity and a
/// new record, never a mutation of this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: u64,
    pub document: DocumentRef,
    pub certificate_id: CertificateId,
    pub signer: PrincipalId,
    pub signer_display_name: String,
    /// Free-text reason supplied at signing, e.g. "Prescription issuance".
    pub reason: Option<String>,
    /// Free-text signing location.
    pub location: Option<String>,
    /// Signature algorithm identifier, e.g. `sha256WithRSAEncryption`.
    pub algorithm: String,
    /// SHA-256 of the final signed byte stream (the verification handle).
    pub signature_hash: SignatureHash,
    pub signed_at: DateTime<Utc>,
    /// Whether the certificate's validity window covered `signed_at`. A
    /// certificate that expires later does not retroactively flip this.
    pub valid_at_signing: bool,
    pub certificate: CertificateSnapshot,
}

/// Public verification view derived from a `SignatureRecord`.
///
/// Contains signature facts only: no document content, no subject-matter
/// identifiers, no key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Document kind label, e.g. `PRESCRIPTION`. Not the document itself.
    pub document_type: String,
    pub signed_at: DateTime<Utc>,
    pub signer_display_name: String,
    pub certificate: CertificateSnapshot,
    pub valid_at_signing: bool,
}

impl VerificationOutcome {
    #[must_use]
    pub fn from_record(record: &SignatureRecord) -> Self {
        Self {
            document_type: record.document.kind.as_label().to_string(),
            signed_at: record.signed_at,
            signer_display_name: record.signer_display_name.clone(),
            certificate: record.certificate.clone(),
            valid_at_signing: record.valid_at_signing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DocumentKind;
    use chrono::TimeZone;

    fn sample_record() -> SignatureRecord {
        let signed_at = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        SignatureRecord {
            id: 1,
            document: DocumentRef::new(DocumentKind::Prescription, 4477),
            certificate_id: CertificateId(7),
            signer: PrincipalId::new("crm-9").unwrap(),
            signer_display_name: "Dr. Test".to_string(),
            reason: Some("Prescription issuance".to_string()),
            location: None,
            algorithm: "sha256WithRSAEncryption".to_string(),
            signature_hash: SignatureHash::of_bytes(b"signed bytes"),
            signed_at,
            valid_at_signing: true,
            certificate: CertificateSnapshot {
                subject: "CN=Dr. Test".to_string(),
                issuer: "CN=Health CA".to_string(),
                serial: "0a1b".to_string(),
                not_before: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_outcome_excludes_document_identity() {
        let record = sample_record();
        let outcome = VerificationOutcome::from_record(&record);
        assert_eq!(outcome.document_type, "PRESCRIPTION");

        // The serialized outcome must not carry the document id.
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("4477"));
        assert!(json.contains("PRESCRIPTION"));
    }

    #[test]
    fn test_record_roundtrips_through_json() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: SignatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.signature_hash, record.signature_hash);
        assert_eq!(back.document, record.document);
    }
}
