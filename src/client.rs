//! Persistent TCP delivery client for risk events.
//!
//! Owns a long-lived outbound connection to the monitoring server and keeps
//! it alive on a best-effort basis: write failures mark the link down, a
//! background supervisor retries forever on a fixed interval, and a heartbeat
//! task signals liveness while connected. Ordinary connectivity loss is never
//! surfaced to the caller as an error.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::Mutex,
    task::JoinHandle,
    time,
};

use crate::consts::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_RECONNECT_INTERVAL, DEFAULT_WRITE_TIMEOUT,
};
use crate::messages::{unix_timestamp, ConnectionStatus, Message, RiskLevel};
use crate::prelude::*;

/// Configuration for the risk-event delivery client.
///
/// Fixed at construction; every field has a default matching the standard
/// monitoring deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Monitoring server host (default: `localhost`)
    pub host: String,
    /// Monitoring server port (default: 5200)
    pub port: u16,
    /// Delay between reconnection attempts while the link is down (default: 5s)
    pub reconnect_interval: Duration,
    /// Interval between liveness heartbeats while connected (default: 30s)
    pub heartbeat_interval: Duration,
    /// Maximum time a single connection attempt may take (default: 5s)
    pub connect_timeout: Duration,
    /// Maximum time a single message write may take (default: 2s)
    pub write_timeout: Duration,
    /// Minimum spacing between risk events at the same level; zero disables
    /// duplicate suppression (default: zero)
    pub min_event_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            min_event_interval: Duration::ZERO,
        }
    }
}

/// Phase of the link state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkPhase::Connecting,
            2 => LinkPhase::Connected,
            _ => LinkPhase::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LinkPhase::Disconnected => 0,
            LinkPhase::Connecting => 1,
            LinkPhase::Connected => 2,
        }
    }
}

/// Internal link state tracking.
#[derive(Debug)]
struct LinkState {
    phase: AtomicU8,
    /// Total successful reconnections since start
    reconnection_count: AtomicU64,
    /// Messages delivered to the transport
    messages_sent: AtomicU64,
    /// Writes that failed or timed out
    send_failures: AtomicU64,
    /// Heartbeats delivered
    heartbeats_sent: AtomicU64,
}

impl LinkState {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(LinkPhase::Disconnected.as_u8()),
            reconnection_count: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
        }
    }

    fn phase(&self) -> LinkPhase {
        LinkPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    fn set_phase(&self, phase: LinkPhase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reconnection(&self) {
        self.reconnection_count.fetch_add(1, Ordering::Relaxed);
    }

    fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of link health counters.
#[derive(Debug, Clone)]
pub struct LinkStats {
    pub phase: LinkPhase,
    pub reconnection_count: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
    pub heartbeats_sent: u64,
}

/// Delivery client for risk, heartbeat, and connection-status messages.
///
/// The socket is exclusively owned by the client; every write goes through a
/// single mutex, so concurrent senders cannot corrupt message framing. All
/// transport errors are logged and absorbed — `send_risk_event` reports them
/// as a `false` return, never as a panic or error bubbling into the
/// risk-computation process.
#[derive(Debug)]
pub struct RiskEventClient {
    config: ClientConfig,
    stop_flag: Arc<AtomicBool>,
    writer: Arc<Mutex<Option<TcpStream>>>,
    state: Arc<LinkState>,
    last_event: Mutex<Option<(RiskLevel, Instant)>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl RiskEventClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for a malformed host or a zero port; no
    /// retry can fix a bad address, so this is rejected up front.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let host = config.host.trim();
        if host.is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if host.parse::<std::net::IpAddr>().is_err() && host.contains([':', '/', ' ']) {
            return Err(Error::config(format!(
                "host is not a hostname or address: {host:?}"
            )));
        }
        if config.port == 0 {
            return Err(Error::config("port must be non-zero"));
        }

        Ok(RiskEventClient {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            writer: Arc::new(Mutex::new(None)),
            state: Arc::new(LinkState::new()),
            last_event: Mutex::new(None),
            supervisor: Mutex::new(None),
            heartbeat: Mutex::new(None),
        })
    }

    /// Start the client: attempt an initial connection and spawn the
    /// reconnect supervisor and heartbeat tasks.
    ///
    /// Idempotent while running. An initial connection failure is not an
    /// error; the supervisor keeps retrying every `reconnect_interval`
    /// indefinitely, since the risk-computation process must not stall on a
    /// monitoring-link outage.
    pub async fn start(&self) {
        {
            let mut slot = self.supervisor.lock().await;
            if slot.is_some() {
                warn!("Risk event client already started");
                return;
            }

            if let Err(err) = Self::try_connect(&self.config, &self.writer, &self.state).await {
                warn!(
                    "Initial connection failed, retrying every {:?}: {err}",
                    self.config.reconnect_interval
                );
            }

            let config = self.config.clone();
            let writer = Arc::clone(&self.writer);
            let state = Arc::clone(&self.state);
            let stop_flag = Arc::clone(&self.stop_flag);
            let supervisor_fut = async move {
                while !stop_flag.load(Ordering::Relaxed) {
                    time::sleep(config.reconnect_interval).await;
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    if state.phase() != LinkPhase::Disconnected {
                        continue;
                    }
                    info!("Reconnecting to {}:{}", config.host, config.port);
                    match Self::try_connect(&config, &writer, &state).await {
                        Ok(()) => state.record_reconnection(),
                        Err(err) => warn!("Reconnect attempt failed: {err}"),
                    }
                }
                debug!("reconnect supervisor stopped");
            };
            *slot = Some(tokio::spawn(supervisor_fut));
        }

        {
            let config = self.config.clone();
            let writer = Arc::clone(&self.writer);
            let state = Arc::clone(&self.state);
            let stop_flag = Arc::clone(&self.stop_flag);
            let heartbeat_fut = async move {
                while !stop_flag.load(Ordering::Relaxed) {
                    time::sleep(config.heartbeat_interval).await;
                    if stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    // Skip while the supervisor is still re-establishing the link.
                    if state.phase() != LinkPhase::Connected {
                        continue;
                    }
                    match Self::write_message(&config, &writer, &state, &Message::heartbeat())
                        .await
                    {
                        Ok(()) => {
                            state.record_heartbeat();
                            debug!("heartbeat sent");
                        }
                        Err(err) => warn!("Heartbeat failed: {err}"),
                    }
                }
                debug!("heartbeat task stopped");
            };
            let mut slot = self.heartbeat.lock().await;
            *slot = Some(tokio::spawn(heartbeat_fut));
        }

        info!(
            "Risk event client started ({}:{})",
            self.config.host, self.config.port
        );
    }

    /// Attempt one connection to the configured endpoint.
    ///
    /// On success the link transitions to `Connected` and a
    /// `connection/"connected"` message is emitted. On failure the link stays
    /// `Disconnected`; if the client is started, the supervisor retries on
    /// schedule.
    pub async fn connect(&self) -> Result<()> {
        Self::try_connect(&self.config, &self.writer, &self.state).await
    }

    /// Build and transmit one risk event stamped with the current wall-clock
    /// time.
    ///
    /// Returns whether the message reached the transport. Non-finite
    /// `distance`, `relative_speed`, or `risk_score` values are rejected at
    /// this boundary; a non-finite `ttc` means "no closing trajectory" and is
    /// omitted from the wire format. A transport failure marks the link down
    /// and returns `false` — it is never raised past the caller.
    pub async fn send_risk_event(
        &self,
        event: impl Into<String>,
        result: RiskLevel,
        distance: f64,
        relative_speed: f64,
        ttc: f64,
        risk_score: f64,
    ) -> bool {
        if !distance.is_finite() || !relative_speed.is_finite() || !risk_score.is_finite() {
            warn!(
                "Rejecting risk event with non-finite fields: distance={distance} \
                 relative_speed={relative_speed} risk_score={risk_score}"
            );
            return false;
        }

        if !self.config.min_event_interval.is_zero() {
            let mut last = self.last_event.lock().await;
            if let Some((level, at)) = *last {
                if level == result && at.elapsed() < self.config.min_event_interval {
                    debug!(
                        "Suppressing duplicate {} event inside min interval",
                        result.as_str()
                    );
                    return false;
                }
            }
            *last = Some((result, Instant::now()));
        }

        let message = Message::Event {
            event: event.into(),
            result,
            timestamp: unix_timestamp(),
            distance,
            relative_speed,
            ttc: ttc.is_finite().then_some(ttc),
            risk_score,
        };

        match Self::write_message(&self.config, &self.writer, &self.state, &message).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Could not deliver risk event: {err}");
                false
            }
        }
    }

    /// Stop the client: cancel both periodic tasks, emit a best-effort
    /// `connection/"disconnected"` message, and close the socket.
    ///
    /// Idempotent; calling `stop` when already stopped is a no-op.
    pub async fn stop(&self) {
        if self.stop_flag.swap(true, Ordering::Relaxed) {
            return;
        }

        // Farewell is best-effort; errors during this final send are ignored.
        let _ = Self::write_message(
            &self.config,
            &self.writer,
            &self.state,
            &Message::connection(ConnectionStatus::Disconnected),
        )
        .await;

        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.heartbeat.lock().await.take() {
            handle.abort();
        }

        {
            let mut guard = self.writer.lock().await;
            if let Some(mut stream) = guard.take() {
                let _ = stream.shutdown().await;
            }
        }
        self.state.set_phase(LinkPhase::Disconnected);
        info!("Risk event client stopped");
    }

    /// Alias for [`stop`](Self::stop).
    pub async fn disconnect(&self) {
        self.stop().await;
    }

    /// Check whether the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.state.phase() == LinkPhase::Connected
    }

    /// Get a snapshot of link health counters.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            phase: self.state.phase(),
            reconnection_count: self.state.reconnection_count.load(Ordering::Relaxed),
            messages_sent: self.state.messages_sent.load(Ordering::Relaxed),
            send_failures: self.state.send_failures.load(Ordering::Relaxed),
            heartbeats_sent: self.state.heartbeats_sent.load(Ordering::Relaxed),
        }
    }

    async fn try_connect(
        config: &ClientConfig,
        writer: &Arc<Mutex<Option<TcpStream>>>,
        state: &Arc<LinkState>,
    ) -> Result<()> {
        state.set_phase(LinkPhase::Connecting);

        let attempt = TcpStream::connect((config.host.as_str(), config.port));
        let stream = match time::timeout(config.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                state.set_phase(LinkPhase::Disconnected);
                return Err(Error::connect(err.to_string()));
            }
            Err(_) => {
                state.set_phase(LinkPhase::Disconnected);
                return Err(Error::connect(format!(
                    "connect to {}:{} timed out",
                    config.host, config.port
                )));
            }
        };
        // Risk events are small and latency-sensitive.
        stream.set_nodelay(true).ok();

        {
            let mut guard = writer.lock().await;
            *guard = Some(stream);
        }
        state.set_phase(LinkPhase::Connected);
        info!("Connected to {}:{}", config.host, config.port);

        Self::write_message(
            config,
            writer,
            state,
            &Message::connection(ConnectionStatus::Connected),
        )
        .await
    }

    /// Serialize one message and write it under the writer lock.
    ///
    /// Any failure (no connection, broken pipe, reset, timeout) drops the
    /// socket and marks the link `Disconnected` so the supervisor takes over.
    async fn write_message(
        config: &ClientConfig,
        writer: &Arc<Mutex<Option<TcpStream>>>,
        state: &Arc<LinkState>,
        message: &Message,
    ) -> Result<()> {
        let line = message.to_json_line()?;

        let mut guard = writer.lock().await;
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => {
                state.record_send_failure();
                return Err(Error::NotConnected);
            }
        };

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        };
        match time::timeout(config.write_timeout, write).await {
            Ok(Ok(())) => {
                state.record_sent();
                Ok(())
            }
            Ok(Err(err)) => {
                *guard = None;
                state.set_phase(LinkPhase::Disconnected);
                state.record_send_failure();
                warn!("Write failed, link marked down: {err}");
                Err(Error::send(err.to_string()))
            }
            Err(_) => {
                *guard = None;
                state.set_phase(LinkPhase::Disconnected);
                state.record_send_failure();
                warn!(
                    "Write timed out after {:?}, link marked down",
                    config.write_timeout
                );
                Err(Error::send("write timed out"))
            }
        }
    }
}

impl Drop for RiskEventClient {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5200);
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(config.min_event_interval.is_zero());
    }

    #[test]
    fn test_new_rejects_empty_host() {
        let config = ClientConfig {
            host: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RiskEventClient::new(config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_new_rejects_malformed_host() {
        let config = ClientConfig {
            host: "tcp://monitor:5200".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RiskEventClient::new(config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_port() {
        let config = ClientConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(
            RiskEventClient::new(config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_new_accepts_ipv6_literal() {
        let config = ClientConfig {
            host: "::1".to_string(),
            ..Default::default()
        };
        assert!(RiskEventClient::new(config).is_ok());
    }

    #[test]
    fn test_link_phase_round_trip() {
        for phase in [
            LinkPhase::Disconnected,
            LinkPhase::Connecting,
            LinkPhase::Connected,
        ] {
            assert_eq!(LinkPhase::from_u8(phase.as_u8()), phase);
        }
    }

    #[tokio::test]
    async fn test_send_rejects_non_finite_fields() {
        let client = RiskEventClient::new(ClientConfig::default()).unwrap();
        assert!(
            !client
                .send_risk_event("BR_CHANGED", RiskLevel::High, f64::NAN, 0.0, 10.0, 1.0)
                .await
        );
        assert!(
            !client
                .send_risk_event(
                    "BR_CHANGED",
                    RiskLevel::High,
                    10.0,
                    f64::INFINITY,
                    10.0,
                    1.0
                )
                .await
        );
        assert!(
            !client
                .send_risk_event("BR_CHANGED", RiskLevel::High, 10.0, 0.0, 10.0, f64::NAN)
                .await
        );
        // Rejected before reaching the transport, so not counted as failures there.
        assert_eq!(client.stats().messages_sent, 0);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        let client = RiskEventClient::new(ClientConfig::default()).unwrap();
        let sent = client
            .send_risk_event("BR_CHANGED", RiskLevel::Low, 500.0, 3.0, f64::INFINITY, 2.0)
            .await;
        assert!(!sent);
        assert_eq!(client.stats().send_failures, 1);
        assert_eq!(client.stats().phase, LinkPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let client = RiskEventClient::new(ClientConfig::default()).unwrap();
        client.stop().await;
        client.stop().await;
        assert_eq!(client.stats().phase, LinkPhase::Disconnected);
    }
}
