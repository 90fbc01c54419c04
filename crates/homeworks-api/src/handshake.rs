// ── Login handshake ──
//
// State machine layered over the line stream. Every line passes through
// `classify`, which either consumes it as part of the login exchange or
// forwards it as ordinary traffic. Nothing is forwarded until the processor
// has accepted the credentials.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{ConnectionConfig, HandshakeMode};
use crate::error::Error;

const PROMPT_MARKER: &str = "LOGIN:";
const SUCCESS_MARKER: &str = "login successful";
const FAILURE_MARKER: &str = "login incorrect";

/// Where the connection is in the login exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum HandshakeState {
    /// The processor does not require a login; all traffic is forwarded.
    NotRequired,
    /// Prompt mode: waiting for the `LOGIN:` prompt.
    WaitingForPrompt,
    /// Credentials sent, waiting for the verdict.
    Pending,
    /// Login accepted; all traffic is forwarded.
    Authenticated,
    /// Login rejected. Terminal.
    Failed,
}

impl HandshakeState {
    /// Whether ordinary traffic may flow in this state.
    pub fn is_open(self) -> bool {
        matches!(self, Self::NotRequired | Self::Authenticated)
    }
}

/// What to do with one incoming line.
#[derive(Debug)]
pub enum Classification {
    /// Handshake noise; drop it.
    Consumed,
    /// The login prompt arrived; send these credentials (carriage return included).
    Login(String),
    /// Ordinary traffic for the response parser.
    Forward(String),
    /// Login accepted. Raised exactly once per connection.
    Ready,
    /// Login rejected. Raised exactly once per connection.
    AuthFailed(Error),
}

/// Per-connection login state machine.
#[derive(Debug)]
pub struct LoginHandshake {
    state: HandshakeState,
    mode: HandshakeMode,
    login_line: String,
}

impl LoginHandshake {
    pub fn new(config: &ConnectionConfig) -> Self {
        // Immediate mode leaves WaitingForPrompt in `on_connected`.
        let state = if config.login_required {
            HandshakeState::WaitingForPrompt
        } else {
            HandshakeState::NotRequired
        };
        Self {
            state,
            mode: config.handshake,
            login_line: config.login_line(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Called once when the transport opens, before any line is read.
    ///
    /// Returns the credentials to send in immediate mode; `None` otherwise.
    pub fn on_connected(&mut self) -> Option<String> {
        if self.mode == HandshakeMode::Immediate && self.state == HandshakeState::WaitingForPrompt {
            debug!("sending credentials without waiting for a prompt");
            self.state = HandshakeState::Pending;
            return Some(self.login_line.clone());
        }
        None
    }

    /// Classify one framed line, applying at most one state transition.
    pub fn classify(&mut self, line: &str) -> Classification {
        match self.state {
            HandshakeState::NotRequired | HandshakeState::Authenticated => {
                Classification::Forward(line.to_string())
            }
            HandshakeState::WaitingForPrompt => {
                if self.mode == HandshakeMode::Prompt && line.contains(PROMPT_MARKER) {
                    debug!("login prompt received");
                    self.state = HandshakeState::Pending;
                    Classification::Login(self.login_line.clone())
                } else {
                    Classification::Consumed
                }
            }
            HandshakeState::Pending => {
                let lower = line.to_ascii_lowercase();
                if lower.contains(SUCCESS_MARKER) {
                    info!("login successful");
                    self.state = HandshakeState::Authenticated;
                    Classification::Ready
                } else if lower.contains(FAILURE_MARKER) {
                    error!("login failed - check username and password");
                    self.state = HandshakeState::Failed;
                    Classification::AuthFailed(Error::Authentication {
                        message: format!("processor replied '{line}'"),
                    })
                } else {
                    Classification::Consumed
                }
            }
            HandshakeState::Failed => Classification::Consumed,
        }
    }
}
