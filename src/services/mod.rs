//! Service layer: stateful components composed by the pipelines.

pub mod cert_store;
pub mod registry;
pub mod signing;
pub mod validator;
pub mod verification;

pub use cert_store::CertificateStore;
pub use registry::{NewSignature, SignatureRegistry};
pub use signing::{SignedResult, SigningEngine};
pub use validator::{ContainerValidator, ValidatedContainer};
pub use verification::VerificationService;
