use alloc::vec::Vec;
use core::{fmt, time::Duration};

use thiserror::Error as ThisError;

use crate::{
    codec::{decode, percent_to_param},
    frame::{CommandError, HidTransport, read_response, send},
};

pub const READ_PARAMETER: u8 = 0x31;
pub const SET_FAN_MODE: [u8; 2] = [0x30, 0x41];
pub const RGB_OFF: [u8; 6] = [0x30, 0x42, 0x19, 0x00, 0x00, 0x00];

/// Sensor addresses understood by the read-parameter command.
///
/// Units of the voltage and current channels are inferred, not documented
/// by the vendor.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(test, derive(strum::EnumIter))]
pub enum Parameter {
    #[strum(to_string = "input voltage")]
    InputVoltage = 0x33,
    #[strum(to_string = "12V output voltage")]
    Output12V,
    #[strum(to_string = "5V output voltage")]
    Output5V,
    #[strum(to_string = "3.3V output voltage")]
    Output3V3,
    #[strum(to_string = "12V output current")]
    Current12V,
    #[strum(to_string = "5V output current")]
    Current5V,
    #[strum(to_string = "3.3V output current")]
    Current3V3,
    #[strum(to_string = "temperature")]
    Temperature,
    #[strum(to_string = "fan speed")]
    FanRpm,
}

impl From<Parameter> for u8 {
    fn from(value: Parameter) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for Parameter {
    type Error = ParameterConvError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x33 => Ok(Parameter::InputVoltage),
            0x34 => Ok(Parameter::Output12V),
            0x35 => Ok(Parameter::Output5V),
            0x36 => Ok(Parameter::Output3V3),
            0x37 => Ok(Parameter::Current12V),
            0x38 => Ok(Parameter::Current5V),
            0x39 => Ok(Parameter::Current3V3),
            0x3A => Ok(Parameter::Temperature),
            0x3B => Ok(Parameter::FanRpm),
            _ => Err(ParameterConvError),
        }
    }
}

#[derive(Clone, Copy, Debug, ThisError)]
#[cfg_attr(test, derive(PartialEq))]
#[error("integer to parameter conversion failed")]
pub struct ParameterConvError;

/// Fan modes built into the device, as sent in the first parameter of the
/// set-fan-mode command.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(test, derive(strum::EnumIter))]
pub enum FanMode {
    Silent = 0x01,
    Performance,
    Passive,
    Manual,
}

impl From<FanMode> for u8 {
    fn from(value: FanMode) -> Self {
        value as Self
    }
}

/// A complete fan configuration, the mode plus the speed for manual mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FanSetting {
    Silent,
    Performance,
    /// Fan stopped.
    Passive,
    /// Fixed speed, in percent.
    Manual(f64),
}

impl FanSetting {
    #[must_use]
    pub fn mode(self) -> FanMode {
        match self {
            FanSetting::Silent => FanMode::Silent,
            FanSetting::Performance => FanMode::Performance,
            FanSetting::Passive => FanMode::Passive,
            FanSetting::Manual(_) => FanMode::Manual,
        }
    }

    #[must_use]
    pub fn param1(self) -> u8 {
        self.mode().into()
    }

    #[must_use]
    pub fn param2(self) -> u8 {
        match self {
            FanSetting::Manual(percent) => percent_to_param(percent),
            _ => 0,
        }
    }
}

impl fmt::Display for FanSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanSetting::Manual(percent) => write!(f, "manual at {percent:.2}%"),
            setting => write!(f, "{}", setting.mode()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    ReadParameter(Parameter),
    SetFanMode(FanSetting),
    RgbOff,
}

impl Command {
    /// Bytes following the report id.
    #[must_use]
    pub fn payload(self) -> Vec<u8> {
        match self {
            Command::ReadParameter(parameter) => alloc::vec![READ_PARAMETER, parameter.into()],
            Command::SetFanMode(setting) => {
                let [command, sub_command] = SET_FAN_MODE;
                alloc::vec![command, sub_command, setting.param1(), setting.param2()]
            }
            Command::RgbOff => RGB_OFF.to_vec(),
        }
    }
}

///
/// # Errors
pub fn execute<T>(transport: &mut T, command: Command) -> Result<(), CommandError<T::Error>>
where
    T: HidTransport + ?Sized,
{
    send(transport, &command.payload())
}

/// Reads one sensor. `Ok(None)` means the device did not answer with
/// enough bytes to hold a value.
///
/// # Errors
///
/// Only fails when the command cannot be sent or the transport fails while
/// collecting the response. A short response is not an error.
pub fn read_parameter<T>(
    transport: &mut T,
    parameter: Parameter,
    window: Duration,
) -> Result<Option<f64>, CommandError<T::Error>>
where
    T: HidTransport + ?Sized,
{
    execute(transport, Command::ReadParameter(parameter))?;
    let response = read_response(transport, window).map_err(CommandError::Transport)?;
    Ok(decode_response(&response))
}

/// Extracts the value carried at offsets 3 and 4 of a response.
#[must_use]
pub fn decode_response(response: &[u8]) -> Option<f64> {
    match response {
        [_, _, _, low, high, ..] => Some(decode(*low, *high)),
        _ => None,
    }
}
