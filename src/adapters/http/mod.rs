//! HTTP API: wire protocol and warp server.

pub mod protocol;
pub mod server;

pub use server::{routes, AppState};
