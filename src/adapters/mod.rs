//! Adapters connecting the service core to the outside world.

pub mod http;
pub mod storage;
