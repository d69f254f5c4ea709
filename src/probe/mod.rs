//! Probe drivers: the external pinger subprocess and the HTTP round loop.

pub mod http;
pub mod ping;
