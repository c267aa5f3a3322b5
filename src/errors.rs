use thiserror::Error;

/// Main crate error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invalid configuration (bad host/port). Fatal at construction time,
    /// since no retry can fix a malformed address.
    #[error("Config error: {0}")]
    Config(String),

    /// Failed to establish a TCP connection
    #[error("Connect error: {0}")]
    Connect(String),

    /// Attempted to write while the link is down
    #[error("Not connected")]
    NotConnected,

    /// Failed to write a message on an established connection
    #[error("Send error: {0}")]
    Send(String),

    /// JSON parse or serialization error
    #[error("Json parse error: {0}")]
    JsonParse(String),

    /// Failed to bind the test server listener
    #[error("Bind error: {0}")]
    Bind(String),
}

// Convenience constructors for common error patterns
impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a connection error
    pub fn connect(msg: impl Into<String>) -> Self {
        Error::Connect(msg.into())
    }

    /// Create a send error
    pub fn send(msg: impl Into<String>) -> Self {
        Error::Send(msg.into())
    }
}
