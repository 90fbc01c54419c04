//! `homeworks query`: read one device's current level.

use std::time::Duration;

use homeworks_core::Controller;

use crate::cli::{GlobalOpts, QueryArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    controller: &Controller,
    args: &QueryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.connect().await?;
    let reply = controller
        .query_and_wait(&args.address, Duration::from_secs(args.timeout))
        .await;
    controller.disconnect().await;

    let device = reply?;
    let color = output::should_color(global.color);
    let rendered = output::render_single(
        global.output,
        &*device,
        |d| util::detail(d, color),
        util::plain,
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
