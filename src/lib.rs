#![deny(unreachable_pub)]

// Core modules
mod consts;
mod errors;
mod prelude;

// Feature modules
mod client;
mod messages;
mod server;

// Re-exports
pub use client::{ClientConfig, LinkPhase, LinkStats, RiskEventClient};
pub use consts::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_RECONNECT_INTERVAL, DEFAULT_WRITE_TIMEOUT,
};
pub use errors::Error;
pub use messages::{unix_timestamp, ConnectionStatus, Message, RiskLevel};
pub use server::TestServer;
