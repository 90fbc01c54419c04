//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod discover;
pub mod monitor;
pub mod query;
pub mod set;
pub mod util;

use homeworks_core::{Controller, ControllerConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Run a processor-bound command on a fresh controller.
///
/// Only `monitor` honors the configured background discovery; `discover`
/// drives its own scan and one-shot commands skip it entirely.
pub async fn dispatch(
    cmd: &Command,
    mut config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => {
            config.discovery &= !args.no_discovery;
            monitor::handle(&Controller::new(config), global).await
        }
        Command::Discover(args) => {
            config.discovery = false;
            discover::handle(&Controller::new(config), args, global).await
        }
        Command::Set(args) => {
            config.discovery = false;
            set::handle(&Controller::new(config), args, global).await
        }
        Command::Query(args) => {
            config.discovery = false;
            query::handle(&Controller::new(config), args, global).await
        }
        Command::Config(_) | Command::Completions(_) => {
            unreachable!("handled before a controller is built")
        }
    }
}
