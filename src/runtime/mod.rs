//! Host runtime: configuration and the HTTP server invocations arrive on.

mod config;
mod server;

pub use config::{StreamerConfig, DEFAULT_RELAY_BASE_URL};
pub use server::HostServer;
