//! Reference TCP sink for risk-event traffic.
//!
//! Development and integration-test counterpart of the delivery client:
//! accepts connections, reads newline-delimited JSON, validates each line
//! against the message schema, and logs a one-line summary per message.
//! Not a production component.

use std::net::SocketAddr;

use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::messages::Message;
use crate::prelude::*;

/// Passive message sink for integration testing.
///
/// Handles any number of sequential or concurrent client connections; each
/// connection is served by its own task until the client disconnects, after
/// which the listener keeps accepting.
#[derive(Debug)]
pub struct TestServer {
    listener: TcpListener,
    tap: Option<UnboundedSender<Message>>,
}

impl TestServer {
    /// Bind the listener. Port 0 requests an ephemeral port; use
    /// [`local_addr`](Self::local_addr) to discover it.
    ///
    /// # Errors
    /// Returns [`Error::Bind`] if the address cannot be bound.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::Bind(e.to_string()))?;
        Ok(TestServer {
            listener,
            tap: None,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Bind(e.to_string()))
    }

    /// Register a tap receiving every successfully parsed message, across
    /// all connections. Used by integration tests to assert on traffic.
    pub fn tap(&mut self) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        self.tap = Some(tx);
        rx
    }

    /// Accept connections until the task is dropped or the listener fails.
    pub async fn run(self) {
        match self.local_addr() {
            Ok(addr) => info!("Test server listening on {addr}"),
            Err(err) => warn!("Test server listening (address unknown: {err})"),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!("Client connected: {peer}");
                    let tap = self.tap.clone();
                    tokio::spawn(handle_client(stream, peer, tap));
                }
                Err(err) => {
                    warn!("Accept failed: {err}");
                }
            }
        }
    }
}

/// Serve one client: read lines until EOF, logging each parsed message.
/// Unparseable lines are logged and skipped; they do not drop the connection.
async fn handle_client(stream: TcpStream, peer: SocketAddr, tap: Option<UnboundedSender<Message>>) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("Read error from {peer}: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match Message::parse_line(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!("Unparseable line from {peer}: {err}");
                continue;
            }
        };

        match &message {
            Message::Event {
                event,
                result,
                distance,
                risk_score,
                ..
            } => {
                info!(
                    "Risk event from {peer}: {event} -> {} (distance={distance:.1}m score={risk_score:.1})",
                    result.as_str()
                );
            }
            Message::Heartbeat { status, .. } => {
                info!("Heartbeat from {peer}: {status}");
            }
            Message::Connection { status, .. } => {
                info!("Connection status from {peer}: {status:?}");
            }
        }

        if let Some(tap) = &tap {
            // Receiver may be gone in log-only mode; keep serving regardless.
            let _ = tap.send(message);
        }
    }

    info!("Client disconnected: {peer}");
}
