//! `homeworks set`: fade one device to a level.

use tracing::info;

use homeworks_core::Controller;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    controller: &Controller,
    args: &SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fade = util::fade(args.fade)?;

    controller.connect().await?;
    let sent = controller.set_level(&args.address, args.level, fade).await;
    controller.disconnect().await;
    sent?;

    let fade = fade.unwrap_or_else(|| controller.store().fade_time_for(&args.address));
    info!(address = %args.address, level = args.level, fade_secs = fade.as_secs_f64(), "level sent");
    output::print_output(
        &format!(
            "{} -> {} over {}s",
            args.address,
            output::level(args.level, output::should_color(global.color)).trim_start(),
            fade.as_secs_f64()
        ),
        global.quiet,
    );
    Ok(())
}
