//! Domain layer: pure types and invariants, no I/O.

pub mod certificate;
pub mod record;
pub mod types;
