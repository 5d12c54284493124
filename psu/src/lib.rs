#![no_std]

extern crate alloc;

pub mod codec;
pub mod command;
pub mod controller;
pub mod frame;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod telemetry;

pub use codec::{LinearFloat, decode, percent_to_param};
pub use command::{Command, FanMode, FanSetting, Parameter, execute, read_parameter};
pub use controller::{CurveError, Decision, FanController, FanCurve, FanState, SkipReason};
pub use frame::{
    CommandError, Frame, FrameEncodingError, HidTransport, REPORT_LEN, RESPONSE_WINDOW,
};
pub use telemetry::{Rail, RailReading, Telemetry};

/// Vendor id of the power supplies speaking this protocol.
pub const USB_VID: u16 = 0x264a;
/// Product id of the power supplies speaking this protocol.
pub const USB_PID: u16 = 0x2329;
