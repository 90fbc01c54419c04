//! CLI configuration: the shared file plus command-line overrides.

use std::path::PathBuf;

use homeworks_config::Config;
use homeworks_core::{ControllerConfig, HandshakeMode, TransportKind};

use crate::cli::{GlobalOpts, HandshakeStyle, LinkType};
use crate::error::CliError;

/// `--config` if given, else the default location.
pub fn resolve_path(global: &GlobalOpts) -> Result<PathBuf, CliError> {
    match global.config {
        Some(ref path) => Ok(path.clone()),
        None => Ok(homeworks_config::config_path()?),
    }
}

/// Load the config file and layer the link flags on top.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolve_path(global)?;
    let mut config = homeworks_config::load_config_from(&path)?;
    apply_overrides(&mut config, global);
    Ok(config)
}

fn apply_overrides(config: &mut Config, global: &GlobalOpts) {
    if let Some(kind) = global.connection_type {
        config.connection_type = match kind {
            LinkType::Serial => TransportKind::Serial,
            LinkType::Tcp => TransportKind::Tcp,
        };
    }
    if let Some(ref host) = global.host {
        config.host = Some(host.clone());
        // A bare --host implies TCP unless the type was given explicitly.
        if global.connection_type.is_none() {
            config.connection_type = TransportKind::Tcp;
        }
    }
    if let Some(port) = global.port {
        config.port = port;
    }
    if let Some(ref path) = global.serial_path {
        config.serial_path = Some(path.clone());
    }
    if let Some(baud) = global.baud_rate {
        config.baud_rate = baud;
    }
    if global.login {
        config.login_required = true;
    }
    if let Some(ref username) = global.username {
        config.username.clone_from(username);
    }
    if let Some(style) = global.handshake {
        config.handshake = match style {
            HandshakeStyle::Prompt => HandshakeMode::Prompt,
            HandshakeStyle::Immediate => HandshakeMode::Immediate,
        };
    }
}

/// Everything a controller needs, credentials included.
pub fn controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let config = load(global)?;
    let password = homeworks_config::resolve_password(&config);
    Ok(config.to_controller_config(password)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["homeworks"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["config", "path"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn host_flag_switches_to_tcp() {
        let mut config = Config::default();
        apply_overrides(&mut config, &global(&["--host", "10.0.0.2", "--port", "2323"]));
        assert_eq!(config.connection_type, TransportKind::Tcp);
        assert_eq!(config.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(config.port, 2323);
    }

    #[test]
    fn explicit_type_wins_over_host() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            &global(&["-t", "serial", "--host", "10.0.0.2", "--serial-path", "/dev/ttyS1"]),
        );
        assert_eq!(config.connection_type, TransportKind::Serial);
        assert_eq!(config.serial_path.as_deref(), Some("/dev/ttyS1"));
    }

    #[test]
    fn login_flags_apply() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            &global(&["--login", "-u", "admin", "--handshake", "prompt"]),
        );
        assert!(config.login_required);
        assert_eq!(config.username, "admin");
        assert_eq!(config.handshake, HandshakeMode::Prompt);
    }
}
