//! Clap derive structures for the `homeworks` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module may
//! only depend on `clap` and `clap_complete`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homeworks -- talk to a Lutron Homeworks lighting processor
#[derive(Debug, Parser)]
#[command(
    name = "homeworks",
    version,
    about = "Monitor and control Lutron Homeworks lighting from the command line",
    long_about = "Connects to a Homeworks processor over RS-232 or TCP, logs in,\n\
        discovers dimmers, streams level changes, and sends fade commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

/// Link settings here override the config file for this invocation.
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file path
    #[arg(long, env = "HOMEWORKS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Link type
    #[arg(long, short = 't', env = "HOMEWORKS_CONNECTION_TYPE", global = true)]
    pub connection_type: Option<LinkType>,

    /// Processor host name or IP (TCP)
    #[arg(long, short = 'H', env = "HOMEWORKS_HOST", global = true)]
    pub host: Option<String>,

    /// Processor port (TCP)
    #[arg(long, env = "HOMEWORKS_PORT", global = true)]
    pub port: Option<u16>,

    /// Serial device path, e.g. /dev/ttyUSB0
    #[arg(long, env = "HOMEWORKS_SERIAL_PATH", global = true)]
    pub serial_path: Option<String>,

    /// Serial baud rate
    #[arg(long, env = "HOMEWORKS_BAUD_RATE", global = true)]
    pub baud_rate: Option<u32>,

    /// Log in before sending commands
    #[arg(long, global = true)]
    pub login: bool,

    /// Login username
    #[arg(long, short = 'u', env = "HOMEWORKS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Login exchange the processor expects
    #[arg(long, env = "HOMEWORKS_HANDSHAKE", global = true)]
    pub handshake: Option<HandshakeStyle>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEWORKS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkType {
    /// RS-232 serial port
    Serial,
    /// Telnet-style TCP
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HandshakeStyle {
    /// Wait for the LOGIN: prompt before sending credentials
    Prompt,
    /// Send credentials as soon as the link opens
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color if stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream device level changes until interrupted
    #[command(alias = "watch")]
    Monitor(MonitorArgs),

    /// Scan the address space and list every device that answers
    #[command(alias = "scan")]
    Discover(DiscoverArgs),

    /// Fade a device to a level
    Set(SetArgs),

    /// Ask one device for its current level
    Query(QueryArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Skip the discovery scan after login
    #[arg(long)]
    pub no_discovery: bool,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Seconds to keep collecting replies after the last query is written
    #[arg(long, default_value = "2")]
    pub settle: u64,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device address, e.g. 01:04:01:01:05
    pub address: String,

    /// Target level, 0-100
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: u8,

    /// Fade time in seconds (default: the device's configured fade)
    #[arg(long, short = 'f')]
    pub fade: Option<f64>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Device address, e.g. 01:04:01:01:05
    pub address: String,

    /// Seconds to wait for the processor's reply
    #[arg(long, default_value = "5")]
    pub timeout: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store the login password for --username (or the configured
    /// username) in the system keyring
    SetPassword,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
