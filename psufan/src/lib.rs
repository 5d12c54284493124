pub mod cli;
mod device;
mod fan_loop;
pub mod logging;

use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Context as _;
pub use anyhow::Result as AnyResult;
pub use device::{DeviceError, DeviceId, PowerSupply};
pub use fan_loop::{FanLoop, POLL_INTERVAL};
use psu::{CommandError, FrameEncodingError, HidTransport, Parameter, RESPONSE_WINDOW, Telemetry};

/// Makes Ctrl-C set the returned flag instead of killing the process, so
/// an open [`PowerSupply`] is still released on the way out.
///
/// # Errors
///
/// Fails if a handler is already installed.
pub fn interrupt_flag() -> AnyResult<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);

    ctrlc::set_handler(move || {
        tracing::info!("user interruption");
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing the interrupt handler")?;

    Ok(interrupted)
}

/// Reads a sensor, turning every device side failure into an undefined
/// reading.
///
/// # Errors
///
/// Only a [`FrameEncodingError`] is returned, as it means the command
/// itself is broken.
pub fn read_or_undefined<T>(
    transport: &mut T,
    parameter: Parameter,
    window: Duration,
) -> Result<Option<f64>, FrameEncodingError>
where
    T: HidTransport + ?Sized,
    T::Error: Display,
{
    match psu::read_parameter(transport, parameter, window) {
        Ok(Some(value)) => Ok(Some(value)),
        Ok(None) => {
            tracing::warn!(
                "no valid response for {parameter} (0x{:02X})",
                u8::from(parameter)
            );
            Ok(None)
        }
        Err(CommandError::Frame(e)) => Err(e),
        Err(e) => {
            tracing::warn!("reading {parameter} failed: {e}");
            Ok(None)
        }
    }
}

#[derive(Debug)]
enum ReadStop {
    Interrupted,
    Frame(FrameEncodingError),
}

/// Reads every sensor once, checking `interrupted` before each read.
///
/// Returns `None` when interrupted part way.
///
/// # Errors
///
/// Same as [`read_or_undefined`].
pub fn read_telemetry<T>(
    transport: &mut T,
    interrupted: &AtomicBool,
) -> Result<Option<Telemetry>, FrameEncodingError>
where
    T: HidTransport + ?Sized,
    T::Error: Display,
{
    let result = Telemetry::collect(|parameter| {
        if interrupted.load(Ordering::SeqCst) {
            return Err(ReadStop::Interrupted);
        }

        read_or_undefined(transport, parameter, RESPONSE_WINDOW).map_err(ReadStop::Frame)
    });

    match result {
        Ok(telemetry) => Ok(Some(telemetry)),
        Err(ReadStop::Interrupted) => Ok(None),
        Err(ReadStop::Frame(e)) => Err(e),
    }
}
