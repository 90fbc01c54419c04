// ── Core error types ──
//
// User-facing errors from homeworks-core. Consumers never see raw I/O or
// serial driver errors; the `From<homeworks_api::Error>` impl folds them
// into variants that say what went wrong from the user's point of view.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to processor at {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Processor disconnected")]
    Disconnected,

    #[error("Processor did not complete login within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {address}")]
    DeviceNotFound { address: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether a reconnect attempt could plausibly succeed after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Disconnected | Self::Timeout { .. }
        )
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<homeworks_api::Error> for CoreError {
    fn from(err: homeworks_api::Error) -> Self {
        match err {
            homeworks_api::Error::Connect { target, reason } => {
                CoreError::ConnectionFailed { target, reason }
            }
            homeworks_api::Error::Serial(e) => CoreError::ConnectionFailed {
                target: "serial port".into(),
                reason: e.to_string(),
            },
            homeworks_api::Error::Io(e) => CoreError::ConnectionFailed {
                target: "processor".into(),
                reason: e.to_string(),
            },
            homeworks_api::Error::NotConnected => CoreError::Disconnected,
            homeworks_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homeworks_api::Error::HandshakeTimeout { timeout_secs } => {
                CoreError::Timeout { timeout_secs }
            }
            homeworks_api::Error::InvalidConfig { field, reason } => CoreError::Config {
                message: format!("{field}: {reason}"),
            },
            e @ (homeworks_api::Error::InvalidAddress(_) | homeworks_api::Error::InvalidLevel(_)) => {
                CoreError::Validation {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_maps_and_is_final() {
        let err: CoreError = homeworks_api::Error::Authentication {
            message: "login incorrect".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn link_errors_are_retryable() {
        let refused: CoreError = homeworks_api::Error::Connect {
            target: "10.0.0.5:23".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert!(refused.is_retryable());
        assert!(refused.to_string().contains("10.0.0.5:23"));

        let closed: CoreError = homeworks_api::Error::NotConnected.into();
        assert!(matches!(closed, CoreError::Disconnected));
    }

    #[test]
    fn bad_input_is_validation() {
        let err: CoreError = homeworks_api::Error::InvalidLevel(150).into();
        assert!(matches!(err, CoreError::Validation { ref message } if message.contains("150")));
        assert!(!err.is_retryable());
    }
}
