//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use homeworks_config::ConfigError;
use homeworks_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to processor at {target}")]
    #[diagnostic(
        code(homeworks::connection_failed),
        help(
            "{reason}\n\
             Check the cable or network path, and that no other program holds the port."
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Lost connection to the processor")]
    #[diagnostic(
        code(homeworks::disconnected),
        help("Enable [reconnect] in the config file to ride out short outages.")
    )]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Processor rejected the login")]
    #[diagnostic(
        code(homeworks::auth_failed),
        help(
            "{message}\n\
             Check the username, then store the password with: homeworks config set-password"
        )
    )]
    AuthFailed { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("No reply from device '{address}'")]
    #[diagnostic(
        code(homeworks::not_found),
        help("Run: homeworks discover to list the devices that answer")
    )]
    NotFound { address: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Processor did not finish login within {seconds}s")]
    #[diagnostic(
        code(homeworks::timeout),
        help(
            "Some processors only accept credentials after printing LOGIN:.\n\
             Try: --handshake prompt (or --handshake immediate if it never prompts)"
        )
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(homeworks::validation),
        help("Fix it in {path} or override it with a command-line flag.")
    )]
    Validation {
        field: String,
        reason: String,
        path: String,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(homeworks::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(homeworks::config))]
    Config(Box<figment::Error>),

    #[error("Configuration error: {message}")]
    #[diagnostic(code(homeworks::config))]
    ConfigFile { message: String },

    #[error("Keyring error: {reason}")]
    #[diagnostic(
        code(homeworks::keyring),
        help("Set HOMEWORKS_PASSWORD or `password` in the config file instead.")
    )]
    Keyring { reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation {
                field,
                reason,
                path: homeworks_config::config_path()
                    .map_or_else(|_| "the config file".into(), |p| p.display().to_string()),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Keyring(e) => CliError::Keyring {
                reason: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::NoConfigDir | ConfigError::Serialization(_)) => {
                CliError::ConfigFile {
                    message: other.to_string(),
                }
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Disconnected => CliError::Disconnected,
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { address } => CliError::NotFound { address },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
                path: "the command line".into(),
            },
            CoreError::Config { message } => CliError::ConfigFile { message },
        }
    }
}
