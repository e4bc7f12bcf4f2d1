//! Verification service: public, read-only query over the signature
//! registry.
//!
//! Returns sanitized signature facts only. An unknown hash is a normal
//! outcome for a public endpoint, so the result is an `Option`, not an
//! error, and the response never reveals whether the underlying document
//! exists.

use crate::domain::record::VerificationOutcome;
use crate::domain::types::SignatureHash;
use crate::services::registry::SignatureRegistry;
use std::sync::Arc;

pub struct VerificationService {
    registry: Arc<SignatureRegistry>,
}

impl VerificationService {
    #[must_use]
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self { registry }
    }

    /// Answer "is this a known, valid signature?" for a hash handle.
    ///
    /// The `valid_at_signing` flag reflects whether the certificate's
    /// validity window covered the signing instant; a certificate expiring
    /// later does not retroactively invalidate a past signature.
    pub fn verify(&self, hash: &SignatureHash) -> Option<VerificationOutcome> {
        self.registry
            .find_by_hash(hash)
            .map(|record| VerificationOutcome::from_record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::certificate::CertificateId;
    use crate::domain::record::CertificateSnapshot;
    use crate::domain::types::{DocumentKind, DocumentRef, PrincipalId};
    use crate::services::registry::NewSignature;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_verify_known_and_unknown_hash() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(SignatureRegistry::open(dir.path().join("sig.jsonl")).unwrap());
        let record = registry
            .record(NewSignature {
                document: DocumentRef::new(DocumentKind::Prescription, 3),
                certificate_id: CertificateId(1),
                signer: PrincipalId::new("crm-1").unwrap(),
                signer_display_name: "Dr. Test".to_string(),
                reason: None,
                location: None,
                algorithm: "ecdsa-with-SHA256".to_string(),
                signature_hash: crate::domain::types::SignatureHash::of_bytes(b"signed"),
                signed_at: Utc::now(),
                valid_at_signing: true,
                certificate: CertificateSnapshot {
                    subject: "CN=Dr. Test".to_string(),
                    issuer: "CN=CA".to_string(),
                    serial: "01".to_string(),
                    not_before: Utc::now(),
                    not_after: Utc::now(),
                },
            })
            .unwrap();

        let service = VerificationService::new(registry);
        let outcome = service.verify(&record.signature_hash).unwrap();
        assert_eq!(outcome.document_type, "PRESCRIPTION");
        assert!(outcome.valid_at_signing);

        let unknown = crate::domain::types::SignatureHash::of_bytes(b"nope");
        assert!(service.verify(&unknown).is_none());
    }
}
