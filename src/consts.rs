use std::time::Duration;

/// Default monitoring server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default monitoring server port.
pub const DEFAULT_PORT: u16 = 5200;

/// Delay between reconnection attempts while the link is down.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between liveness heartbeats while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum time a single connection attempt may take.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum time a single message write may take.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
