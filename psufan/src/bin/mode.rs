use std::{sync::atomic::Ordering, thread, time::Duration};

use anyhow::Context;
use clap::Parser;
use psu::Command;
use psufan::{
    AnyResult,
    cli::{DeviceArgs, LogArgs, ModeArg, parse_percent},
    interrupt_flag, logging,
};

/// Gives the device time to act on the report before the handle is released.
const SETTLE_TIME: Duration = Duration::from_millis(100);

/// Sets the operating mode of the power supply fan.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Fan operating mode.
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Fan speed in percent (0-100), required in manual mode.
    #[arg(long, value_parser = parse_percent, required_if_eq("mode", "manual"))]
    speed: Option<f64>,
    #[command(flatten)]
    device: DeviceArgs,
    #[command(flatten)]
    log: LogArgs,
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    logging::init(cli.log.journald)?;

    let setting = cli.mode.setting(cli.speed)?;
    tracing::info!(
        "selected mode: {}, param1: {:#04x}, param2: {}",
        setting.mode(),
        setting.param1(),
        setting.param2()
    );

    let interrupted = interrupt_flag()?;
    let mut supply = cli.device.open()?;

    if interrupted.load(Ordering::SeqCst) {
        return Ok(());
    }

    psu::execute(&mut supply, Command::SetFanMode(setting)).context("sending fan mode command")?;
    thread::sleep(SETTLE_TIME);

    println!("Fan mode set: {setting}");
    Ok(())
}
