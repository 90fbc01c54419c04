//! Config subcommand handlers. None of these touch the processor.

use std::fmt::Write as _;

use homeworks_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn redacted(cfg: &Config) -> Config {
    Config {
        password: cfg.password.as_ref().map(|_| "****".to_string()),
        ..cfg.clone()
    }
}

/// Starter file: the defaults plus commented examples of the optional keys.
fn starter_config() -> Result<String, CliError> {
    let mut out = toml::to_string_pretty(&Config::default())
        .map_err(|e| CliError::Render(e.to_string()))?;
    let _ = write!(
        out,
        "\n\
         # host = \"192.168.1.50\"          # with connection_type = \"tcp\"\n\
         # serial_path = \"/dev/ttyUSB0\"   # with connection_type = \"serial\"\n\
         #\n\
         # [[devices]]\n\
         # address = \"01:04:01:01:05\"\n\
         # name = \"Kitchen\"\n\
         # fade_time = 2.0\n"
    );
    Ok(out)
}

fn prompt_err(e: &std::io::Error) -> CliError {
    CliError::Validation {
        field: "password".into(),
        reason: format!("prompt failed: {e}"),
        path: "the terminal".into(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let masked = redacted(&cfg);
            let rendered = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&masked).map_err(|e| CliError::Render(e.to_string()))?
                }
                format => output::render_single(format, &masked, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = config::resolve_path(global)?;
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::resolve_path(global)?;
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, starter_config()?)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let password = rpassword::prompt_password(format!(
                "Password for '{}': ",
                cfg.username
            ))
            .map_err(|e| prompt_err(&e))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                    path: "the terminal".into(),
                });
            }
            homeworks_config::store_password(&cfg.username, &password)?;
            if !global.quiet {
                eprintln!("Password for '{}' stored in the system keyring", cfg.username);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn redacted_output_masks_password() {
        let cfg = Config {
            password: Some("integration".into()),
            ..Config::default()
        };
        let out = toml::to_string_pretty(&redacted(&cfg)).unwrap();
        assert!(out.contains("password = \"****\""));
        assert!(!out.contains("integration\""));
    }

    #[test]
    fn starter_config_parses_back_to_defaults() {
        let parsed: Config = toml::from_str(&starter_config().unwrap()).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
