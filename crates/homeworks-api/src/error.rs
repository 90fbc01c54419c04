use thiserror::Error;

/// Top-level error type for the `homeworks-api` crate.
///
/// Covers every failure mode of the protocol engine: opening the transport,
/// the login handshake, writes against a dead link, and I/O after open.
/// Parse misses are never errors -- unrecognised lines are simply dropped.
/// `homeworks-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// Transport-level open failure (bad device path, refused connection).
    #[error("Cannot connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// Serial port driver error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on an already-open link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write was attempted with no live transport.
    #[error("Not connected -- command was not sent")]
    NotConnected,

    // ── Authentication ──────────────────────────────────────────────
    /// The processor rejected the configured credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The processor never completed the login exchange.
    #[error("Login handshake timed out after {timeout_secs}s")]
    HandshakeTimeout { timeout_secs: u64 },

    // ── Validation ──────────────────────────────────────────────────
    /// Connection configuration rejected at construction time.
    #[error("Invalid {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A device address that does not match `AA:BB:CC:DD:EE`.
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// A brightness level outside 0-100.
    #[error("Invalid level {0}: expected 0-100")]
    InvalidLevel(u8),
}

impl Error {
    /// Returns `true` if the error came from the peer rejecting credentials.
    ///
    /// Retrying with the same credentials is pointless, so reconnect loops
    /// use this to stop immediately.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient link error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::HandshakeTimeout { .. } | Self::NotConnected => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
