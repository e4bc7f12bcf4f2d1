//! Signature registry: durable, append-only record of "this hash was
//! produced by this certificate at this time for this document".
//!
//! The insert-if-absent on `(kind, document id)` under a single lock is the
//! authoritative idempotency guard against double-signing; callers must not
//! pre-check with a separate read. Records are immutable once written.

use crate::domain::certificate::CertificateId;
use crate::domain::record::{CertificateSnapshot, SignatureRecord};
use crate::domain::types::{DocumentKind, DocumentRef, PrincipalId, SignatureHash};
use crate::infra::error::{SignError, SignResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Facts for a record about to be written.
pub struct NewSignature {
    pub document: DocumentRef,
    pub certificate_id: CertificateId,
    pub signer: PrincipalId,
    pub signer_display_name: String,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub algorithm: String,
    pub signature_hash: SignatureHash,
    pub signed_at: DateTime<Utc>,
    pub valid_at_signing: bool,
    pub certificate: CertificateSnapshot,
}

struct RegistryState {
    by_document: HashMap<(DocumentKind, u64), usize>,
    by_hash: HashMap<SignatureHash, usize>,
    records: Vec<SignatureRecord>,
    next_id: u64,
    journal: File,
}

pub struct SignatureRegistry {
    state: Mutex<RegistryState>,
}

impl SignatureRegistry {
    /// Open the registry, replaying the journal at `journal_path` if present.
    pub fn open(journal_path: impl Into<PathBuf>) -> SignResult<Self> {
        let journal_path = journal_path.into();
        let mut records: Vec<SignatureRecord> = Vec::new();

        if journal_path.exists() {
            let reader = BufReader::new(File::open(&journal_path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: SignatureRecord = serde_json::from_str(&line).map_err(|e| {
                    SignError::StorageError(format!(
                        "signature journal corrupt at line {}: {e}",
                        line_no + 1
                    ))
                })?;
                records.push(record);
            }
            log::info!("Signature journal replayed: {} records", records.len());
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        let mut by_document = HashMap::new();
        let mut by_hash = HashMap::new();
        let mut next_id = 1u64;
        for (idx, record) in records.iter().enumerate() {
            by_document.insert((record.document.kind, record.document.id), idx);
            by_hash.insert(record.signature_hash.clone(), idx);
            next_id = next_id.max(record.id + 1);
        }

        Ok(Self {
            state: Mutex::new(RegistryState {
                by_document,
                by_hash,
                records,
                next_id,
                journal,
            }),
        })
    }

    /// Atomically record a signature.
    ///
    /// Fails with `AlreadySigned` when a record already exists for the
    /// document. The journal line is flushed before the lock is released, so
    /// a record either exists durably or not at all; on a write failure no
    /// in-memory state changes and the caller may retry safely.
    pub fn record(&self, new: NewSignature) -> SignResult<SignatureRecord> {
        let mut state = self.state.lock().unwrap();

        let key = (new.document.kind, new.document.id);
        if state.by_document.contains_key(&key) {
            return Err(SignError::AlreadySigned {
                document: new.document.to_string(),
            });
        }

        let record = SignatureRecord {
            id: state.next_id,
            document: new.document,
            certificate_id: new.certificate_id,
            signer: new.signer,
            signer_display_name: new.signer_display_name,
            reason: new.reason,
            location: new.location,
            algorithm: new.algorithm,
            signature_hash: new.signature_hash,
            signed_at: new.signed_at,
            valid_at_signing: new.valid_at_signing,
            certificate: new.certificate,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        state.journal.write_all(line.as_bytes())?;
        state.journal.flush()?;

        state.next_id += 1;
        let idx = state.records.len();
        state.by_document.insert(key, idx);
        state.by_hash.insert(record.signature_hash.clone(), idx);
        state.records.push(record.clone());

        log::info!(
            "Recorded signature {} for {} (hash {})",
            record.id,
            record.document,
            record.signature_hash
        );
        Ok(record)
    }

    /// Look up a record by its signature hash. `None` is a normal outcome.
    pub fn find_by_hash(&self, hash: &SignatureHash) -> Option<SignatureRecord> {
        let state = self.state.lock().unwrap();
        state
            .by_hash
            .get(hash)
            .map(|&idx| state.records[idx].clone())
    }

    /// Look up the current record for a document.
    pub fn find_by_document(&self, document: &DocumentRef) -> Option<SignatureRecord> {
        let state = self.state.lock().unwrap();
        state
            .by_document
            .get(&(document.kind, document.id))
            .map(|&idx| state.records[idx].clone())
    }

    /// Number of recorded signatures.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_signature(document: DocumentRef, hash_seed: &[u8]) -> NewSignature {
        NewSignature {
            document,
            certificate_id: CertificateId(1),
            signer: PrincipalId::new("crm-1").unwrap(),
            signer_display_name: "Dr. Test".to_string(),
            reason: Some("Prescription issuance".to_string()),
            location: None,
            algorithm: "sha256WithRSAEncryption".to_string(),
            signature_hash: SignatureHash::of_bytes(hash_seed),
            signed_at: Utc::now(),
            valid_at_signing: true,
            certificate: CertificateSnapshot {
                subject: "CN=Dr. Test".to_string(),
                issuer: "CN=CA".to_string(),
                serial: "01".to_string(),
                not_before: Utc::now(),
                not_after: Utc::now(),
            },
        }
    }

    #[test]
    fn test_second_record_for_same_document_conflicts() {
        let dir = TempDir::new().unwrap();
        let registry = SignatureRegistry::open(dir.path().join("sig.jsonl")).unwrap();
        let doc = DocumentRef::new(DocumentKind::Prescription, 1);

        registry.record(new_signature(doc, b"first")).unwrap();
        match registry.record(new_signature(doc, b"second")) {
            Err(SignError::AlreadySigned { document }) => {
                assert_eq!(document, "PRESCRIPTION#1");
            }
            other => panic!("expected AlreadySigned, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_hash_and_document() {
        let dir = TempDir::new().unwrap();
        let registry = SignatureRegistry::open(dir.path().join("sig.jsonl")).unwrap();
        let doc = DocumentRef::new(DocumentKind::Referral, 9);

        let record = registry.record(new_signature(doc, b"bytes")).unwrap();
        assert!(registry.find_by_hash(&record.signature_hash).is_some());
        assert!(registry.find_by_document(&doc).is_some());
        assert!(registry
            .find_by_hash(&SignatureHash::of_bytes(b"unknown"))
            .is_none());
    }

    #[test]
    fn test_journal_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sig.jsonl");
        let doc = DocumentRef::new(DocumentKind::Prescription, 42);

        let record = {
            let registry = SignatureRegistry::open(&path).unwrap();
            registry.record(new_signature(doc, b"persisted")).unwrap()
        };

        let reopened = SignatureRegistry::open(&path).unwrap();
        let found = reopened.find_by_document(&doc).unwrap();
        assert_eq!(found.signature_hash, record.signature_hash);
        assert_eq!(found.id, record.id);

        // Still conflicts after replay.
        assert!(matches!(
            reopened.record(new_signature(doc, b"again")),
            Err(SignError::AlreadySigned { .. })
        ));
    }
}
