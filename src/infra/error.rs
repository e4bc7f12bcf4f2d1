//! Error types for document signing and verification operations.
//!
//! Every failure a caller can observe is classified here; raw OpenSSL or
//! parser errors never cross the service boundary unclassified.

use thiserror::Error;

/// Result type for signing operations
pub type SignResult<T> = Result<T, SignError>;

/// Classified error taxonomy for the signing subsystem.
///
/// Variants fall into four groups:
/// - user-correctable: `WrongSecret`, `CertificateExpired`,
///   `CertificateNotYetValid`, `CertificateRevoked`, `IncompleteChain`,
///   `CorruptContainer`, `CertificateNotFound`, `ValidationError`
/// - conflict: `AlreadySigned` (a definitive state, not retryable)
/// - infrastructure: `SigningBackendUnavailable`, `StorageError`
/// - internal: `InternalSigningFailure`, `ConfigurationError`
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SignError {
    #[error("unlock secret does not match the certificate container")]
    WrongSecret,

    #[error("certificate expired at {not_after}")]
    CertificateExpired { not_after: String },

    #[error("certificate is not valid before {not_before}")]
    CertificateNotYetValid { not_before: String },

    #[error("certificate has been revoked")]
    CertificateRevoked,

    #[error("certificate chain is incomplete: no issuer found for '{subject}' (re-export the container with the full chain included)")]
    IncompleteChain { subject: String },

    #[error("certificate container is corrupt or not PKCS#12: {0}")]
    CorruptContainer(String),

    #[error("no usable certificate is configured for this signer")]
    CertificateNotFound,

    #[error("document {document} is already signed")]
    AlreadySigned { document: String },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("signing backend unavailable: {0}")]
    SigningBackendUnavailable(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("invalid input: {0}")]
    ValidationError(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("internal signing failure: {0}")]
    InternalSigningFailure(String),
}

impl SignError {
    /// Whether the caller can correct this failure (wrong secret, broken
    /// container export, expired certificate) as opposed to retrying or
    /// reporting it.
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            SignError::WrongSecret
                | SignError::CertificateExpired { .. }
                | SignError::CertificateNotYetValid { .. }
                | SignError::CertificateRevoked
                | SignError::IncompleteChain { .. }
                | SignError::CorruptContainer(_)
                | SignError::CertificateNotFound
                | SignError::DocumentNotFound(_)
                | SignError::ValidationError(_)
        )
    }

    /// Whether a caller-driven retry is safe: no signature record was
    /// created, so re-issuing the request cannot double-sign.
    #[must_use]
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            SignError::SigningBackendUnavailable(_) | SignError::StorageError(_)
        )
    }
}

impl From<openssl::error::ErrorStack> for SignError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SignError::InternalSigningFailure(error.to_string())
    }
}

impl From<std::io::Error> for SignError {
    fn from(error: std::io::Error) -> Self {
        SignError::StorageError(error.to_string())
    }
}

impl From<serde_json::Error> for SignError {
    fn from(error: serde_json::Error) -> Self {
        SignError::StorageError(error.to_string())
    }
}
