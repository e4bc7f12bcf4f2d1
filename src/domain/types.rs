//! Type-safe wrappers using the new-type pattern.
//!
//! Inputs that cross the service boundary get a validated wrapper so malformed
//! values are rejected at construction, and so sensitive values cannot leak
//! through logging.

use crate::infra::error::{SignError, SignResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Closed set of signable clinical document kinds.
///
/// The registry is keyed on `(DocumentKind, id)`; using an enum instead of a
/// free-form string removes the typo class that would silently create
/// orphaned records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Prescription,
    MedicalCertificate,
    Referral,
    ExamRequest,
}

impl DocumentKind {
    /// Wire/display label, e.g. `PRESCRIPTION`.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "PRESCRIPTION",
            DocumentKind::MedicalCertificate => "MEDICAL_CERTIFICATE",
            DocumentKind::Referral => "REFERRAL",
            DocumentKind::ExamRequest => "EXAM_REQUEST",
        }
    }

    /// All supported kinds, for diagnostics.
    #[must_use]
    pub fn all() -> &'static [DocumentKind] {
        &[
            DocumentKind::Prescription,
            DocumentKind::MedicalCertificate,
            DocumentKind::Referral,
            DocumentKind::ExamRequest,
        ]
    }
}

impl FromStr for DocumentKind {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRESCRIPTION" => Ok(DocumentKind::Prescription),
            "MEDICAL_CERTIFICATE" => Ok(DocumentKind::MedicalCertificate),
            "REFERRAL" => Ok(DocumentKind::Referral),
            "EXAM_REQUEST" => Ok(DocumentKind::ExamRequest),
            other => Err(SignError::ValidationError(format!(
                "unknown document kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Identity of one logical document: kind plus numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub id: u64,
}

impl DocumentRef {
    #[must_use]
    pub fn new(kind: DocumentKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.as_label(), self.id)
    }
}

/// Certificate container class.
///
/// `A1` is a password-protected software container (PKCS#12); `A3` denotes a
/// hardware token and is accepted as metadata only, never for software
/// signing in this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateClass {
    A1,
    A3,
}

impl CertificateClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateClass::A1 => "A1",
            CertificateClass::A3 => "A3",
        }
    }
}

impl FromStr for CertificateClass {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A1" => Ok(CertificateClass::A1),
            "A3" => Ok(CertificateClass::A3),
            other => Err(SignError::ValidationError(format!(
                "unknown certificate class '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CertificateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory-only unlock secret for a certificate container.
///
/// The backing storage is zeroed on drop, and both `Debug` and `Display`
/// render a redaction marker so the secret cannot end up in logs.
#[derive(Clone)]
pub struct UnlockSecret(Zeroizing<String>);

impl UnlockSecret {
    /// Create a new secret after basic validation.
    pub fn new(secret: impl Into<String>) -> SignResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SignError::ValidationError(
                "unlock secret cannot be empty".to_string(),
            ));
        }
        if secret.len() > 128 {
            return Err(SignError::ValidationError(format!(
                "unlock secret too long: {} bytes (maximum 128)",
                secret.len()
            )));
        }
        Ok(UnlockSecret(Zeroizing::new(secret)))
    }

    /// Expose the secret for the container-unlock call. Callers must not
    /// copy it into any value that outlives the signing attempt.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnlockSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnlockSecret([REDACTED])")
    }
}

impl fmt::Display for UnlockSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SECRET REDACTED]")
    }
}

/// Lowercase hex SHA-256 digest of a signed byte stream.
///
/// This is the public verification handle: compact, tamper-evident, and free
/// of any document content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureHash(String);

impl SignatureHash {
    /// Wrap an existing lowercase hex digest after validation.
    pub fn new(hash: impl AsRef<str>) -> SignResult<Self> {
        let hash = hash.as_ref();
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SignError::ValidationError(format!(
                "signature hash must be 64 hex characters, got {} characters",
                hash.len()
            )));
        }
        Ok(SignatureHash(hash.to_ascii_lowercase()))
    }

    /// Compute the digest of a byte stream.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        SignatureHash(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SignatureHash {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for SignatureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an authenticated principal (practitioner), supplied by the
/// session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl AsRef<str>) -> SignResult<Self> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(SignError::ValidationError(
                "principal id cannot be empty".to_string(),
            ));
        }
        if id.len() > 128 || id.chars().any(char::is_control) {
            return Err(SignError::ValidationError(format!(
                "invalid principal id '{id}'"
            )));
        }
        Ok(PrincipalId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable signing attributes. These become part of the signature's
/// display metadata, never part of the protected content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningAttributes {
    /// Signer display name as supplied by the session collaborator.
    pub signer_display_name: String,
    /// Free-text reason for signing (e.g. "Prescription issuance").
    pub reason: Option<String>,
    /// Free-text signing location.
    pub location: Option<String>,
}

impl SigningAttributes {
    #[must_use]
    pub fn new(signer_display_name: impl Into<String>) -> Self {
        Self {
            signer_display_name: signer_display_name.into(),
            reason: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
