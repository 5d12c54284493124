use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use psu::Command;
use psufan::{
    AnyResult,
    cli::{DeviceArgs, LogArgs},
    interrupt_flag, logging,
};

/// Turns the power supply lighting off.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,
    #[command(flatten)]
    log: LogArgs,
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    logging::init(cli.log.journald)?;

    let interrupted = interrupt_flag()?;
    let mut supply = cli.device.open()?;

    if interrupted.load(Ordering::SeqCst) {
        return Ok(());
    }

    psu::execute(&mut supply, Command::RgbOff).context("sending RGB off command")?;

    println!("RGB lighting off command sent.");
    Ok(())
}
