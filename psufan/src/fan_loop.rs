use std::{
    fmt::Display,
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

use psu::{
    Command, CommandError, Decision, FanController, FrameEncodingError, HidTransport, Parameter,
    RESPONSE_WINDOW, SkipReason,
};
use tracing::instrument;

use crate::read_or_undefined;

/// Time between two temperature checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Polls the power supply temperature and keeps the fan on the curve.
///
/// Owns the transport for its whole lifetime; dropping the loop releases
/// the device.
#[derive(Debug)]
pub struct FanLoop<T> {
    transport: T,
    controller: FanController,
    interval: Duration,
}

impl<T> FanLoop<T>
where
    T: HidTransport,
    T::Error: Display,
{
    #[must_use]
    pub fn new(transport: T, controller: FanController) -> Self {
        Self {
            transport,
            controller,
            interval: POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn controller(&self) -> &FanController {
        &self.controller
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs a single polling cycle.
    ///
    /// Device trouble only costs the current cycle and is logged.
    ///
    /// # Errors
    ///
    /// A [`FrameEncodingError`] is a bug and stops the loop.
    #[instrument(skip_all, err(Debug))]
    pub fn cycle(&mut self) -> Result<Decision, FrameEncodingError> {
        let temperature =
            read_or_undefined(&mut self.transport, Parameter::Temperature, RESPONSE_WINDOW)?;
        let fan_rpm = read_or_undefined(&mut self.transport, Parameter::FanRpm, RESPONSE_WINDOW)?;

        let decision = self.controller.update(temperature);

        let setting = match decision {
            Decision::Skip(SkipReason::Undefined) => {
                tracing::warn!("failed to get temperature");
                return Ok(decision);
            }
            Decision::Skip(SkipReason::BelowFloor(temp)) => {
                tracing::warn!("ignoring implausible temperature of {temp:.2} °C");
                return Ok(decision);
            }
            Decision::Apply {
                setting,
                transition,
            } => {
                if let Some(temp) = temperature {
                    tracing::info!("power supply temperature: {temp:.2} °C");
                }

                match fan_rpm {
                    Some(rpm) => tracing::info!("fan speed: {rpm:.0} RPM"),
                    None => tracing::info!("fan speed: unknown"),
                }

                if let Some(state) = transition {
                    tracing::info!("fan is now {state}");
                }

                setting
            }
        };

        match psu::execute(&mut self.transport, Command::SetFanMode(setting)) {
            Ok(()) => tracing::info!("mode set: {setting}"),
            Err(CommandError::Frame(e)) => return Err(e),
            Err(e) => tracing::warn!("failed to send command: {e}"),
        }

        Ok(decision)
    }

    /// Cycles until `shutdown` receives a message or its sender goes away.
    ///
    /// # Errors
    ///
    /// Only stops early on a [`FrameEncodingError`].
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), FrameEncodingError> {
        loop {
            self.cycle()?;

            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("stopping fan control");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use psu::{
        Decision, FanController, FanSetting, FanState, Parameter, SkipReason,
        mock::MockTransport, percent_to_param,
    };

    use super::FanLoop;

    fn fan_loop(temperatures: &[Option<u16>]) -> FanLoop<MockTransport> {
        let mut transport = MockTransport::new();

        for temp in temperatures {
            match temp {
                Some(temp) => transport.queue_integer(Parameter::Temperature, *temp),
                None => transport.queue_reading(Parameter::Temperature, None),
            }
            transport.queue_integer(Parameter::FanRpm, 900);
        }

        FanLoop::new(transport, FanController::default()).with_interval(Duration::ZERO)
    }

    #[test]
    fn test_hysteresis_commands() {
        let temperatures = [30, 38, 40, 35, 33];
        let mut fan_loop = fan_loop(&temperatures.map(Some));

        let mut states = Vec::new();
        for _ in temperatures {
            fan_loop.cycle().unwrap();
            states.push(fan_loop.controller().state());
        }

        assert_eq!(
            states,
            [
                FanState::Passive,
                FanState::Active,
                FanState::Active,
                FanState::Active,
                FanState::Passive,
            ]
        );
        assert_eq!(
            fan_loop.transport().fan_commands(),
            [(0x03, 0), (0x04, 27), (0x04, 30), (0x04, 26), (0x03, 0)]
        );
    }

    #[test]
    fn test_manual_param_follows_curve() {
        let mut fan_loop = fan_loop(&[Some(48)]);

        let decision = fan_loop.cycle().unwrap();
        assert_eq!(
            decision,
            Decision::Apply {
                setting: FanSetting::Manual(35.0),
                transition: Some(FanState::Active),
            }
        );
        assert_eq!(
            fan_loop.transport().fan_commands(),
            [(0x04, percent_to_param(35.0))]
        );
    }

    #[test]
    fn test_undefined_temperature_sends_nothing() {
        let mut fan_loop = fan_loop(&[Some(45), None, Some(15)]);

        fan_loop.cycle().unwrap();
        assert_eq!(
            fan_loop.cycle().unwrap(),
            Decision::Skip(SkipReason::Undefined)
        );
        assert_eq!(
            fan_loop.cycle().unwrap(),
            Decision::Skip(SkipReason::BelowFloor(15.0))
        );

        assert_eq!(fan_loop.controller().state(), FanState::Active);
        assert_eq!(fan_loop.transport().fan_commands().len(), 1);
    }

    #[test]
    fn test_transport_failures_are_not_fatal() {
        let transport = MockTransport::new().failing_writes();
        let mut fan_loop = FanLoop::new(transport, FanController::default());

        assert_eq!(
            fan_loop.cycle().unwrap(),
            Decision::Skip(SkipReason::Undefined)
        );

        let transport = MockTransport::new().without_output_report();
        let mut fan_loop = FanLoop::new(transport, FanController::default());

        assert_eq!(
            fan_loop.cycle().unwrap(),
            Decision::Skip(SkipReason::Undefined)
        );
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let mut fan_loop = fan_loop(&[Some(40), Some(40)]);
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();

        fan_loop.run(&rx).unwrap();
        assert_eq!(fan_loop.transport().fan_commands().len(), 1);

        drop(tx);
        fan_loop.run(&rx).unwrap();
        assert_eq!(fan_loop.transport().fan_commands().len(), 2);
    }
}
