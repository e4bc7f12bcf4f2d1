//! Infrastructure: configuration and error definitions.

pub mod config;
pub mod error;
