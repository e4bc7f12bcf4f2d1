//! Certificate store: persistence and retrieval of certificate containers
//! and their metadata.
//!
//! Container bytes live in the injected content store; metadata and lifecycle
//! transitions are an append-only JSON-lines journal replayed at startup.
//! Cryptographic material is never mutated: a changed container is a new
//! certificate entity.

use crate::adapters::storage::content::ContentStore;
use crate::domain::certificate::{hash_secret, Certificate, CertificateId};
use crate::domain::types::{CertificateClass, PrincipalId, UnlockSecret};
use crate::infra::error::{SignError, SignResult};
use crate::services::validator::ContainerValidator;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Journal events. `Registered` carries the full record; later events are
/// deltas keyed by certificate id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum CertificateEvent {
    Registered { certificate: Certificate },
    Revoked { id: CertificateId, at: DateTime<Utc> },
    Used { id: CertificateId, at: DateTime<Utc> },
}

struct StoreState {
    certificates: HashMap<CertificateId, Certificate>,
    next_id: u64,
    journal: File,
}

impl StoreState {
    fn append(&mut self, event: &CertificateEvent) -> SignResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.journal.write_all(line.as_bytes())?;
        self.journal.flush()?;
        Ok(())
    }
}

/// Owns uploaded certificate containers and their metadata.
pub struct CertificateStore {
    state: Mutex<StoreState>,
    containers: Arc<dyn ContentStore>,
    clock_skew: Duration,
}

impl CertificateStore {
    /// Open the store, replaying the journal at `journal_path` if present.
    pub fn open(
        journal_path: impl Into<PathBuf>,
        containers: Arc<dyn ContentStore>,
        clock_skew: Duration,
    ) -> SignResult<Self> {
        let journal_path = journal_path.into();
        let mut certificates = HashMap::new();
        let mut next_id = 1u64;

        if journal_path.exists() {
            replay_journal(&journal_path, &mut certificates, &mut next_id)?;
            log::info!(
                "Certificate journal replayed: {} certificates, next id {}",
                certificates.len(),
                next_id
            );
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        Ok(Self {
            state: Mutex::new(StoreState {
                certificates,
                next_id,
                journal,
            }),
            containers,
            clock_skew,
        })
    }

    /// Register a new certificate container for a principal.
    ///
    /// Performs the coarse validation pass (unlock, validity window, chain
    /// completeness) so obviously broken uploads fail fast, persists the
    /// container opaquely, and keeps only a salted hash of the secret.
    pub fn register(
        &self,
        owner: PrincipalId,
        container_bytes: &[u8],
        class: CertificateClass,
        secret: &UnlockSecret,
    ) -> SignResult<Certificate> {
        let now = Utc::now();
        let validated =
            ContainerValidator::validate(container_bytes, secret, now, self.clock_skew)?;

        let container_ref = self.containers.put(container_bytes)?;

        let mut salt = [0u8; 16];
        rand::fill(&mut salt);

        let mut state = self.state.lock().unwrap();
        let certificate = Certificate {
            id: CertificateId(state.next_id),
            owner,
            class,
            container_ref,
            secret_salt: hex::encode(salt),
            secret_hash: hash_secret(&salt, secret.expose()),
            subject: validated.snapshot.subject.clone(),
            issuer: validated.snapshot.issuer.clone(),
            serial: validated.snapshot.serial.clone(),
            not_before: validated.snapshot.not_before,
            not_after: validated.snapshot.not_after,
            active: true,
            revoked_at: None,
            registered_at: now,
            last_used_at: None,
            use_count: 0,
        };

        state.append(&CertificateEvent::Registered {
            certificate: certificate.clone(),
        })?;
        state.next_id += 1;
        state
            .certificates
            .insert(certificate.id, certificate.clone());

        log::info!(
            "Registered certificate {} for {} (subject='{}', expires {})",
            certificate.id,
            certificate.owner,
            certificate.subject,
            certificate.not_after
        );
        Ok(certificate)
    }

    /// Most recently registered active, non-expired certificate of the
    /// requested class for this owner.
    pub fn get_active_for_signing(
        &self,
        owner: &PrincipalId,
        class: CertificateClass,
    ) -> SignResult<Certificate> {
        let now = Utc::now();
        let state = self.state.lock().unwrap();
        state
            .certificates
            .values()
            .filter(|c| {
                c.owner == *owner
                    && c.class == class
                    && c.check_usable_at(now, self.clock_skew).is_ok()
            })
            .max_by_key(|c| (c.registered_at, c.id.0))
            .cloned()
            .ok_or(SignError::CertificateNotFound)
    }

    /// Look up a certificate by id regardless of state.
    pub fn get(&self, id: CertificateId) -> Option<Certificate> {
        self.state.lock().unwrap().certificates.get(&id).cloned()
    }

    /// Revoke a certificate. Irreversible through this API; a new container
    /// must be registered to sign again.
    pub fn revoke(&self, id: CertificateId) -> SignResult<()> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if !state.certificates.contains_key(&id) {
            return Err(SignError::CertificateNotFound);
        }
        state.append(&CertificateEvent::Revoked { id, at: now })?;
        let cert = state.certificates.get_mut(&id).unwrap();
        cert.active = false;
        cert.revoked_at = Some(now);
        log::info!("Certificate {id} revoked");
        Ok(())
    }

    /// Usage bookkeeping, called only after a fully successful signature.
    pub fn record_use(&self, id: CertificateId) -> SignResult<()> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if !state.certificates.contains_key(&id) {
            return Err(SignError::CertificateNotFound);
        }
        state.append(&CertificateEvent::Used { id, at: now })?;
        let cert = state.certificates.get_mut(&id).unwrap();
        cert.last_used_at = Some(now);
        cert.use_count += 1;
        Ok(())
    }

    /// Fetch the raw container bytes for a certificate.
    pub fn load_container(&self, certificate: &Certificate) -> SignResult<Vec<u8>> {
        self.containers.get(&certificate.container_ref)
    }
}

fn replay_journal(
    path: &Path,
    certificates: &mut HashMap<CertificateId, Certificate>,
    next_id: &mut u64,
) -> SignResult<()> {
    let reader = BufReader::new(File::open(path)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: CertificateEvent = serde_json::from_str(&line).map_err(|e| {
            SignError::StorageError(format!(
                "certificate journal corrupt at line {}: {e}",
                line_no + 1
            ))
        })?;
        match event {
            CertificateEvent::Registered { certificate } => {
                *next_id = (*next_id).max(certificate.id.0 + 1);
                certificates.insert(certificate.id, certificate);
            }
            CertificateEvent::Revoked { id, at } => {
                if let Some(cert) = certificates.get_mut(&id) {
                    cert.active = false;
                    cert.revoked_at = Some(at);
                }
            }
            CertificateEvent::Used { id, at } => {
                if let Some(cert) = certificates.get_mut(&id) {
                    cert.last_used_at = Some(at);
                    cert.use_count += 1;
                }
            }
        }
    }
    Ok(())
}
