//! `homeworks discover`: scan every address and list what answered.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use homeworks_core::Controller;

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message("querying");
    bar
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

pub async fn handle(
    controller: &Controller,
    args: &DiscoverArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.connect().await?;

    let bar = progress_bar(global.quiet);
    let mut progress = controller.scan_progress();
    let ticker = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let p = *progress.borrow_and_update();
                bar.set_length(as_u64(p.total));
                bar.set_position(as_u64(p.sent));
            }
        })
    };

    let interrupted = tokio::select! {
        report = controller.discover() => {
            let report = report?;
            info!(queries = report.queries_sent, "scan written");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("scan interrupted; listing devices seen so far");
            true
        }
    };
    ticker.abort();

    if !interrupted && args.settle > 0 {
        bar.set_message("waiting for replies");
        bar.enable_steady_tick(Duration::from_millis(120));
        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(args.settle)) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    bar.finish_and_clear();
    controller.disconnect().await;

    let color = output::should_color(global.color);
    let devices = util::devices(controller);
    let rendered = output::render_list(
        global.output,
        &devices,
        |d| util::DeviceRow::new(d, color),
        util::plain,
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
