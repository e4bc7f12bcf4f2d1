//! `SignWorkflow` orchestrates one signing attempt end to end.
//!
//! There is deliberately no "already signed?" pre-check. The workflow signs
//! first and lets the registry's atomic insert resolve same-document races;
//! the loser's completed signature is discarded and reported as a conflict.

use crate::adapters::storage::content::{DocumentSource, DocumentStore};
use crate::domain::types::{
    CertificateClass, DocumentRef, PrincipalId, SignatureHash, SigningAttributes, UnlockSecret,
};
use crate::infra::error::{SignError, SignResult};
use crate::services::registry::NewSignature;
use crate::services::{CertificateStore, SignatureRegistry, SigningEngine};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Caller-facing result of a successful sign: the verification handle.
#[derive(Debug, Clone)]
pub struct SignedHandle {
    pub signature_hash: SignatureHash,
    pub signed_at: DateTime<Utc>,
}

pub struct SignWorkflow {
    certificates: Arc<CertificateStore>,
    engine: Arc<SigningEngine>,
    registry: Arc<SignatureRegistry>,
    documents: Arc<dyn DocumentStore>,
    renderer: Arc<dyn DocumentSource>,
}

impl SignWorkflow {
    #[must_use]
    pub fn new(
        certificates: Arc<CertificateStore>,
        engine: Arc<SigningEngine>,
        registry: Arc<SignatureRegistry>,
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            certificates,
            engine,
            registry,
            documents,
            renderer,
        }
    }

    /// Sign one document for an authenticated principal.
    pub async fn sign_document(
        &self,
        document: DocumentRef,
        signer: PrincipalId,
        attributes: SigningAttributes,
        secret: UnlockSecret,
    ) -> SignResult<SignedHandle> {
        log::info!("Sign requested for {document} by {signer}");

        // 1. Rendered bytes from the renderer collaborator.
        let document_bytes = self
            .renderer
            .rendered_bytes(&document)?
            .ok_or_else(|| SignError::DocumentNotFound(document.to_string()))?;

        // 2. Resolve the signer's active certificate. The engine re-runs the
        // authoritative container validation; this check catches revocation
        // and expiry recorded in the store.
        let certificate = self
            .certificates
            .get_active_for_signing(&signer, CertificateClass::A1)?;

        // 3. Container bytes are fetched once per request and dropped with
        // this call frame.
        let container_bytes = self.certificates.load_container(&certificate)?;

        // 4. Cryptographic signing. The display attributes travel with the
        // engine result so the record reflects exactly this signature.
        let signed = self
            .engine
            .sign(document_bytes, container_bytes, secret, attributes)
            .await?;

        // 5. Persist the signed stream before recording, so a storage
        // failure leaves no record and the caller may retry safely. The
        // entry is keyed by signature hash: a concurrent attempt on the same
        // document writes its own entry and can never replace one whose
        // signature the registry already recorded.
        self.documents
            .put_signed(&document, &signed.signature_hash, &signed.signed_bytes)?;

        // 6. Atomic record; a conflict here means another request won the
        // race and this signature is discarded, including its stored bytes.
        let record = self
            .registry
            .record(NewSignature {
                document,
                certificate_id: certificate.id,
                signer: signer.clone(),
                signer_display_name: signed.attributes.signer_display_name.clone(),
                reason: signed.attributes.reason.clone(),
                location: signed.attributes.location.clone(),
                algorithm: signed.algorithm.clone(),
                signature_hash: signed.signature_hash.clone(),
                signed_at: signed.signed_at,
                valid_at_signing: true,
                certificate: signed.snapshot.clone(),
            })
            .map_err(|e| {
                if matches!(e, SignError::AlreadySigned { .. }) {
                    log::warn!(
                        "Discarding completed signature for {document}: already recorded by a concurrent request"
                    );
                    // Two attempts in the same signing-time second can yield
                    // byte-identical envelopes; when the hashes coincide the
                    // entry belongs to the recorded signature and must stay.
                    let shared_with_winner = self
                        .registry
                        .find_by_document(&document)
                        .is_some_and(|r| r.signature_hash == signed.signature_hash);
                    if !shared_with_winner {
                        if let Err(remove_err) = self
                            .documents
                            .remove_signed(&document, &signed.signature_hash)
                        {
                            log::warn!(
                                "Could not remove orphaned envelope for {document}: {remove_err}"
                            );
                        }
                    }
                }
                e
            })?;

        // 7. Usage bookkeeping only after the record exists. A bookkeeping
        // failure must not retract an already durable signature.
        if let Err(e) = self.certificates.record_use(certificate.id) {
            log::warn!(
                "Usage bookkeeping failed for certificate {}: {e}",
                certificate.id
            );
        }

        Ok(SignedHandle {
            signature_hash: record.signature_hash,
            signed_at: record.signed_at,
        })
    }
}
