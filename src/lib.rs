//! Clinical document signing service library.
//!
//! Produces attached CMS (PKCS#7) signatures over rendered clinical
//! documents using practitioner-owned PKCS#12 certificate containers, keeps
//! an append-only registry of every signature, and answers public
//! verification queries by signature hash without disclosing document
//! content.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

use crate::adapters::storage::{FsContentStore, FsDocumentSource, FsDocumentStore};
use crate::infra::config::ServiceConfiguration;
use crate::infra::error::SignResult;
use std::sync::Arc;

pub use domain::certificate::{Certificate, CertificateId};
pub use domain::record::{SignatureRecord, VerificationOutcome};
pub use domain::types::{
    CertificateClass, DocumentKind, DocumentRef, PrincipalId, SignatureHash, SigningAttributes,
    UnlockSecret,
};
pub use infra::error::{SignError, SignResult as Result};
pub use pipelines::{SignWorkflow, SignedHandle};
pub use services::{
    CertificateStore, SignatureRegistry, SigningEngine, VerificationService,
};

/// Fully wired service components backed by the filesystem layout under
/// `data_dir`.
pub struct Components {
    pub certificates: Arc<CertificateStore>,
    pub registry: Arc<SignatureRegistry>,
    pub workflow: Arc<SignWorkflow>,
    pub verification: Arc<VerificationService>,
}

/// Assemble all components from a configuration.
///
/// Layout under `data_dir`:
/// - `containers/` content-addressed PKCS#12 blobs
/// - `rendered/` rendered document bytes awaiting signature
/// - `signed/` signed document envelopes
/// - `certificates.jsonl`, `signatures.jsonl` append-only journals
pub fn bootstrap(config: &ServiceConfiguration) -> SignResult<Components> {
    let data_dir = &config.data_dir;
    std::fs::create_dir_all(data_dir)?;

    let containers = Arc::new(FsContentStore::open(data_dir.join("containers"))?);
    let renderer = Arc::new(FsDocumentSource::open(data_dir.join("rendered"))?);
    let documents = Arc::new(FsDocumentStore::open(data_dir.join("signed"))?);

    let certificates = Arc::new(CertificateStore::open(
        data_dir.join("certificates.jsonl"),
        containers,
        config.clock_skew(),
    )?);
    let registry = Arc::new(SignatureRegistry::open(data_dir.join("signatures.jsonl"))?);
    let engine = Arc::new(SigningEngine::new(
        config.max_concurrent_signings,
        config.clock_skew(),
    ));

    let workflow = Arc::new(SignWorkflow::new(
        certificates.clone(),
        engine,
        registry.clone(),
        documents,
        renderer,
    ));
    let verification = Arc::new(VerificationService::new(registry.clone()));

    Ok(Components {
        certificates,
        registry,
        workflow,
        verification,
    })
}
