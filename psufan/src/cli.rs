use anyhow::Context as _;
use clap::{Args, ValueEnum};
use psu::{CurveError, FanCurve, FanSetting};

use crate::{
    AnyResult,
    device::{DeviceId, PowerSupply},
};

/// Which power supply to talk to.
#[derive(Clone, Copy, Debug, Args)]
pub struct DeviceArgs {
    /// USB vendor id, in hex [default: the power supply's own]
    #[arg(long, env = "PSUFAN_VID", value_parser = parse_hex_u16)]
    pub vid: Option<u16>,
    /// USB product id, in hex [default: the power supply's own]
    #[arg(long, env = "PSUFAN_PID", value_parser = parse_hex_u16)]
    pub pid: Option<u16>,
    /// Id of the output report, 0 for devices with unnumbered reports.
    #[arg(long, env = "PSUFAN_REPORT_ID", default_value_t = 0)]
    pub report_id: u8,
}

impl DeviceArgs {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        let default = DeviceId::default();

        DeviceId {
            vid: self.vid.unwrap_or(default.vid),
            pid: self.pid.unwrap_or(default.pid),
        }
    }

    ///
    /// # Errors
    pub fn open(&self) -> AnyResult<PowerSupply> {
        let id = self.device_id();
        let supply = PowerSupply::open(id, self.report_id).context("opening power supply")?;
        tracing::info!("device {id} connected");
        Ok(supply)
    }
}

#[derive(Clone, Copy, Debug, Args)]
pub struct LogArgs {
    /// Log to the systemd journal instead of stderr.
    #[arg(long)]
    pub journald: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Silent,
    Performance,
    Passive,
    Manual,
}

impl ModeArg {
    /// # Errors
    ///
    /// Manual mode requires a speed.
    pub fn setting(self, speed: Option<f64>) -> AnyResult<FanSetting> {
        let setting = match self {
            ModeArg::Silent => FanSetting::Silent,
            ModeArg::Performance => FanSetting::Performance,
            ModeArg::Passive => FanSetting::Passive,
            ModeArg::Manual => {
                let speed = speed.context("manual mode requires a speed, pass --speed")?;
                FanSetting::Manual(speed)
            }
        };

        Ok(setting)
    }
}

/// Overrides of the default fan curve.
#[derive(Clone, Copy, Debug, Args)]
pub struct CurveArgs {
    /// Temperature (°C) at which the fan turns on [default: 37]
    #[arg(long, env = "PSUFAN_MIN_TEMP")]
    pub min_temp: Option<f64>,
    /// Temperature (°C) at which the fan reaches its maximum speed [default: 59]
    #[arg(long, env = "PSUFAN_MAX_TEMP")]
    pub max_temp: Option<f64>,
    /// Lowest fan speed in percent [default: 20]
    #[arg(long, env = "PSUFAN_MIN_SPEED", value_parser = parse_percent)]
    pub min_speed: Option<f64>,
    /// Highest fan speed in percent [default: 50]
    #[arg(long, env = "PSUFAN_MAX_SPEED", value_parser = parse_percent)]
    pub max_speed: Option<f64>,
    /// Drop (°C) below the turn-on temperature that stops the fan again [default: 3]
    #[arg(long, env = "PSUFAN_PASSIVE_DELTA")]
    pub passive_delta: Option<f64>,
    /// Readings below this temperature (°C) are ignored [default: 20]
    #[arg(long, env = "PSUFAN_SANITY_FLOOR")]
    pub sanity_floor: Option<f64>,
}

impl CurveArgs {
    /// # Errors
    ///
    /// Returns a [`CurveError`] when the resulting curve is inconsistent.
    pub fn curve(&self) -> Result<FanCurve, CurveError> {
        let default = FanCurve::default();

        FanCurve::new(
            self.min_temp.unwrap_or(default.min_temp()),
            self.max_temp.unwrap_or(default.max_temp()),
            self.min_speed.unwrap_or(default.min_speed()),
            self.max_speed.unwrap_or(default.max_speed()),
            self.passive_delta.unwrap_or(default.passive_delta()),
            self.sanity_floor.unwrap_or(default.sanity_floor()),
        )
    }
}

/// Parses a USB id written in hex, with or without a `0x` prefix.
///
/// # Errors
pub fn parse_hex_u16(value: &str) -> Result<u16, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id `{value}`: {e}"))
}

/// Parses a fan speed percentage.
///
/// # Errors
pub fn parse_percent(value: &str) -> Result<f64, String> {
    let percent: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;

    if (0.0..=100.0).contains(&percent) {
        Ok(percent)
    } else {
        Err("enter a speed value between 0 and 100".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use psu::{FanCurve, FanSetting};

    use super::{CurveArgs, DeviceArgs, ModeArg, parse_hex_u16, parse_percent};
    use crate::device::DeviceId;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        device: DeviceArgs,
        #[command(flatten)]
        curve: CurveArgs,
    }

    #[test]
    fn test_parse_hex_u16() {
        assert_eq!(parse_hex_u16("0x264a"), Ok(0x264a));
        assert_eq!(parse_hex_u16("0X2329"), Ok(0x2329));
        assert_eq!(parse_hex_u16("264A"), Ok(0x264a));
        assert!(parse_hex_u16("0x1_0000").is_err());
        assert!(parse_hex_u16("psu").is_err());
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("0"), Ok(0.0));
        assert_eq!(parse_percent("42.5"), Ok(42.5));
        assert_eq!(parse_percent("100"), Ok(100.0));
        assert!(parse_percent("100.1").is_err());
        assert!(parse_percent("-1").is_err());
        assert!(parse_percent("fast").is_err());
        assert!(parse_percent("NaN").is_err());
    }

    #[test]
    fn test_mode_setting() {
        assert_eq!(ModeArg::Silent.setting(None).unwrap(), FanSetting::Silent);
        assert_eq!(
            ModeArg::Passive.setting(Some(30.0)).unwrap(),
            FanSetting::Passive
        );
        assert_eq!(
            ModeArg::Manual.setting(Some(30.0)).unwrap(),
            FanSetting::Manual(30.0)
        );
        assert!(ModeArg::Manual.setting(None).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["psufan"]).unwrap();

        assert_eq!(
            cli.device.device_id(),
            DeviceId {
                vid: psu::USB_VID,
                pid: psu::USB_PID
            }
        );
        assert_eq!(cli.device.report_id, 0);
        assert_eq!(cli.curve.curve(), Ok(FanCurve::default()));
    }

    #[test]
    fn test_overrides() {
        let cli = TestCli::try_parse_from([
            "psufan",
            "--vid",
            "0x1234",
            "--pid",
            "abcd",
            "--min-temp",
            "40",
            "--max-speed",
            "80",
        ])
        .unwrap();

        assert_eq!(
            cli.device.device_id(),
            DeviceId {
                vid: 0x1234,
                pid: 0xabcd
            }
        );

        let curve = cli.curve.curve().unwrap();
        assert_eq!(curve.min_temp(), 40.0);
        assert_eq!(curve.max_speed(), 80.0);
        assert_eq!(curve.max_temp(), 59.0);
    }

    #[test]
    fn test_partial_device_override() {
        let cli = TestCli::try_parse_from(["psufan", "--pid", "0x1b2c"]).unwrap();

        assert_eq!(
            cli.device.device_id(),
            DeviceId {
                vid: psu::USB_VID,
                pid: 0x1b2c
            }
        );
    }

    #[test]
    fn test_inconsistent_curve() {
        let cli = TestCli::try_parse_from(["psufan", "--min-temp", "70"]).unwrap();
        assert!(cli.curve.curve().is_err());
    }
}
