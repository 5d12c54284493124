use std::{sync::mpsc, time::Duration};

use anyhow::Context;
use clap::Parser;
use psu::FanController;
use psufan::{
    AnyResult, FanLoop, POLL_INTERVAL,
    cli::{CurveArgs, DeviceArgs, LogArgs},
    logging,
};

/// Drives the power supply fan from its temperature until interrupted.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Seconds between temperature checks.
    #[arg(long, env = "PSUFAN_INTERVAL", default_value_t = POLL_INTERVAL.as_secs())]
    interval: u64,
    #[command(flatten)]
    curve: CurveArgs,
    #[command(flatten)]
    device: DeviceArgs,
    #[command(flatten)]
    log: LogArgs,
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    logging::init(cli.log.journald)?;

    let curve = cli.curve.curve().context("invalid fan curve")?;
    tracing::info!(
        "fan curve: {}..{} °C mapped to {}..{} %, off at {} °C",
        curve.min_temp(),
        curve.max_temp(),
        curve.min_speed(),
        curve.max_speed(),
        curve.passive_temp()
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        tracing::info!("user interruption");
        shutdown_tx.send(()).ok();
    })
    .context("installing the interrupt handler")?;

    let supply = cli.device.open()?;

    let mut fan_loop = FanLoop::new(supply, FanController::new(curve))
        .with_interval(Duration::from_secs(cli.interval));

    let result = fan_loop.run(&shutdown_rx);

    drop(fan_loop);
    tracing::info!("device disconnected");

    result.context("fan control stopped")
}
