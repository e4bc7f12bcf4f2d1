//! Workflow layer sequencing the service components.

pub mod sign;

pub use sign::{SignWorkflow, SignedHandle};
