//! `homeworks monitor`: print level changes as they arrive.

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use homeworks_core::{ConnectionState, Controller, ControllerEvent, Device};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

fn line(device: &Device, color: bool) -> String {
    format!(
        "{}  {:<24} [{}] {}",
        device.last_seen.with_timezone(&chrono::Local).format("%H:%M:%S"),
        device.name,
        device.address,
        output::level(device.brightness, color)
    )
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let mut events = controller.events();
    let mut state = controller.connection_state();
    let color = output::should_color(global.color);
    // Streams are line-delimited; pretty JSON would span lines.
    let format = match global.output {
        OutputFormat::Json => OutputFormat::JsonCompact,
        other => other,
    };

    controller.connect().await?;
    info!("monitoring; press Ctrl-C to stop");

    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(ControllerEvent::DeviceAdded(device) | ControllerEvent::DeviceUpdated(device)) => {
                    let rendered = output::render_single(
                        format,
                        &*device,
                        |d| line(d, color),
                        util::plain,
                    )?;
                    output::print_output(&rendered, global.quiet);
                }
                Ok(ControllerEvent::DiscoveryFinished(report)) => {
                    info!(
                        queries = report.queries_sent,
                        devices = controller.devices().len(),
                        "discovery finished"
                    );
                }
                Ok(ControllerEvent::Disconnected) => warn!("processor link dropped"),
                Ok(ControllerEvent::Error { message }) => warn!(%message, "processor error"),
                Ok(ControllerEvent::Ready) => debug!("ready"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind; updates dropped"),
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = state.wait_for(|s| matches!(s, ConnectionState::Disconnected | ConnectionState::Failed)) => {
                break Err(CliError::Disconnected);
            }
        }
    };

    controller.disconnect().await;
    result
}
