use anyhow::Context;
use clap::Parser;
use psufan::{
    AnyResult,
    cli::{DeviceArgs, LogArgs},
    interrupt_flag, logging, read_telemetry,
};

/// Reads every sensor of the power supply once.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,
    #[command(flatten)]
    log: LogArgs,
}

fn reading(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "unavailable".to_owned(), |value| format!("{value} {unit}"))
}

fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    logging::init(cli.log.journald)?;

    let interrupted = interrupt_flag()?;
    let mut supply = cli.device.open()?;

    let Some(telemetry) = read_telemetry(&mut supply, &interrupted).context("reading telemetry")?
    else {
        return Ok(());
    };

    println!("Power supply temperature: {}", reading(telemetry.temperature, "°C"));
    println!("Fan speed: {}", reading(telemetry.fan_rpm, "RPM"));
    println!("VIN: {}", reading(telemetry.input_voltage, "V"));

    for rail in &telemetry.rails {
        println!("{} Output Voltage: {}", rail.rail, reading(rail.voltage, "V"));
        println!("{} Output Current: {}", rail.rail, reading(rail.current, "A"));
    }

    println!("Power consumption: {} W", telemetry.total_power());

    Ok(())
}
