//! Signing engine: produces an attached CMS `SignedData` over a rendered
//! document byte stream.
//!
//! The engine is a pure transformation: it resolves nothing and records
//! nothing. The private key exists only inside the blocking task for the
//! duration of one attempt. Signing is CPU-bound, so it runs on the blocking
//! pool behind a semaphore; a burst of sign requests cannot starve the
//! reactor.

use crate::domain::types::{SignatureHash, SigningAttributes, UnlockSecret};
use crate::infra::error::{SignError, SignResult};
use crate::services::validator::{ContainerValidator, ValidatedContainer};
use chrono::{DateTime, Duration, Utc};
use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::pkey::Id;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Output of a successful signing operation.
pub struct SignedResult {
    /// Final self-contained byte stream: CMS `SignedData` with the document
    /// content and the full certificate chain embedded.
    pub signed_bytes: Vec<u8>,
    /// SHA-256 of `signed_bytes`; the registry key and verification handle.
    pub signature_hash: SignatureHash,
    pub signed_at: DateTime<Utc>,
    /// Signature algorithm identifier for the record.
    pub algorithm: String,
    /// Certificate facts extracted during the authoritative validation pass.
    pub snapshot: crate::domain::record::CertificateSnapshot,
    /// Display attributes (signer name, reason, location) carried through so
    /// the caller records exactly what this signature was produced with.
    pub attributes: SigningAttributes,
}

pub struct SigningEngine {
    permits: Arc<Semaphore>,
    clock_skew: Duration,
}

impl SigningEngine {
    /// Create an engine with at most `max_concurrent` signings in flight.
    #[must_use]
    pub fn new(max_concurrent: usize, clock_skew: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            clock_skew,
        }
    }

    /// Sign `document_bytes` with the certificate in `container_bytes`.
    ///
    /// Runs the authoritative container validation (validity windows move
    /// between registration and signing), unlocks the private key inside the
    /// blocking task only, and produces an attached CMS signature embedding
    /// the full chain so third-party validators need no network access.
    ///
    /// Two signings of the same input produce different bytes (CMS carries a
    /// signing-time attribute) but both validate.
    pub async fn sign(
        &self,
        document_bytes: Vec<u8>,
        container_bytes: Vec<u8>,
        secret: UnlockSecret,
        attributes: SigningAttributes,
    ) -> SignResult<SignedResult> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SignError::SigningBackendUnavailable("signing pool closed".into()))?;

        let clock_skew = self.clock_skew;
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            sign_blocking(&document_bytes, &container_bytes, &secret, attributes, clock_skew)
        })
        .await
        .map_err(|e| SignError::InternalSigningFailure(format!("signing task aborted: {e}")))?;

        match &result {
            Ok(signed) => log::info!(
                "Signature produced: {} bytes, hash {}",
                signed.signed_bytes.len(),
                signed.signature_hash
            ),
            Err(e) if e.is_user_correctable() => {
                log::debug!("Signing rejected: {e}");
            }
            Err(e) => log::error!("Signing failed: {e}"),
        }
        result
    }
}

/// State machine for one attempt:
/// Requested -> Validating -> Unlocking -> Signing -> Embedding -> done.
/// No internal retry; a `WrongSecret` goes back to the caller.
fn sign_blocking(
    document_bytes: &[u8],
    container_bytes: &[u8],
    secret: &UnlockSecret,
    attributes: SigningAttributes,
    clock_skew: Duration,
) -> SignResult<SignedResult> {
    let signed_at = Utc::now();

    // Validating + Unlocking. The returned private key lives on this stack
    // frame only and is freed when `validated` drops at the end of the call.
    let validated: ValidatedContainer =
        ContainerValidator::validate(container_bytes, secret, signed_at, clock_skew)?;

    let algorithm = algorithm_identifier(&validated);

    // Signing + Embedding: attached SignedData carrying the content and the
    // complete chain.
    let mut chain = Stack::<X509>::new()?;
    for cert in &validated.chain {
        chain.push(cert.clone())?;
    }

    let cms = CmsContentInfo::sign(
        Some(&validated.leaf),
        Some(&validated.private_key),
        Some(&chain),
        Some(document_bytes),
        CMSOptions::BINARY,
    )
    .map_err(|e| SignError::InternalSigningFailure(format!("CMS assembly failed: {e}")))?;

    let signed_bytes = cms
        .to_der()
        .map_err(|e| SignError::InternalSigningFailure(format!("CMS encoding failed: {e}")))?;

    let signature_hash = SignatureHash::of_bytes(&signed_bytes);

    Ok(SignedResult {
        signed_bytes,
        signature_hash,
        signed_at,
        algorithm,
        snapshot: validated.snapshot,
        attributes,
    })
}

fn algorithm_identifier(validated: &ValidatedContainer) -> String {
    match validated.private_key.id() {
        Id::RSA => "sha256WithRSAEncryption".to_string(),
        Id::EC => "ecdsa-with-SHA256".to_string(),
        other => format!("{other:?}"),
    }
}

/// Re-validate a signed byte stream against trust roots.
///
/// Used by the round-trip tests and by operators checking an artifact: the
/// embedded chain must verify against `roots` and the attached content must
/// match the signature.
pub fn verify_signed_bytes(signed_bytes: &[u8], roots: &[X509]) -> SignResult<Vec<u8>> {
    let mut cms = CmsContentInfo::from_der(signed_bytes)
        .map_err(|e| SignError::ValidationError(format!("not a CMS structure: {e}")))?;

    let mut store_builder = X509StoreBuilder::new()?;
    for root in roots {
        store_builder.add_cert(root.clone())?;
    }
    let store = store_builder.build();

    let mut content = Vec::new();
    cms.verify(
        None,
        Some(&store),
        None,
        Some(&mut content),
        CMSOptions::empty(),
    )
    .map_err(|e| SignError::ValidationError(format!("signature does not verify: {e}")))?;
    Ok(content)
}
