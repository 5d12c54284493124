//! In-memory [`HidTransport`] that answers read-parameter commands from a
//! script, for exercising the protocol and control code without hardware.

use alloc::{
    collections::{BTreeMap, VecDeque},
    vec::Vec,
};
use core::time::Duration;

use thiserror::Error as ThisError;

use crate::{
    codec::LinearFloat,
    command::{Parameter, READ_PARAMETER, SET_FAN_MODE},
    frame::{Frame, HidTransport},
};

#[derive(Clone, Copy, Debug, ThisError)]
#[error("mock transport failure")]
pub struct MockError;

#[derive(Debug)]
pub struct MockTransport {
    report_id: Option<u8>,
    fail_writes: bool,
    written: Vec<Frame>,
    input: VecDeque<Vec<u8>>,
    readings: BTreeMap<u8, VecDeque<Option<LinearFloat>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            report_id: Some(0),
            fail_writes: false,
            written: Vec::new(),
            input: VecDeque::new(),
            readings: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_report_id(mut self, report_id: u8) -> Self {
        self.report_id = Some(report_id);
        self
    }

    #[must_use]
    pub fn without_output_report(mut self) -> Self {
        self.report_id = None;
        self
    }

    #[must_use]
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Queues bytes the device sends on its own.
    pub fn push_input(&mut self, bytes: Vec<u8>) {
        self.input.push_back(bytes);
    }

    /// Queues the answer to the next read of `parameter`. `None` makes the
    /// device stay silent for that read.
    pub fn queue_reading(&mut self, parameter: Parameter, value: Option<LinearFloat>) {
        self.readings
            .entry(parameter.into())
            .or_default()
            .push_back(value);
    }

    /// Queues a reading that decodes to exactly `value`.
    pub fn queue_integer(&mut self, parameter: Parameter, value: u16) {
        // Exponent 0, so the fraction is the value itself.
        assert!(value <= 0x07FF, "value does not fit the fraction");
        self.queue_reading(parameter, Some(LinearFloat::new(value)));
    }

    #[must_use]
    pub fn written(&self) -> &[Frame] {
        &self.written
    }

    /// `(param1, param2)` of every set-fan-mode command written so far.
    #[must_use]
    pub fn fan_commands(&self) -> Vec<(u8, u8)> {
        self.written
            .iter()
            .map(Frame::as_bytes)
            .filter(|bytes| bytes[1..3] == SET_FAN_MODE)
            .map(|bytes| (bytes[3], bytes[4]))
            .collect()
    }

    fn answer(&mut self, frame: &Frame) {
        let bytes = frame.as_bytes();

        if bytes[1] != READ_PARAMETER {
            return;
        }

        let parameter = bytes[2];
        let reading = self
            .readings
            .get_mut(&parameter)
            .and_then(VecDeque::pop_front)
            .flatten();

        if let Some(reading) = reading {
            let [low, high] = reading.raw().to_le_bytes();
            self.input
                .push_back(alloc::vec![frame.report_id(), READ_PARAMETER, parameter, low, high]);
        }
    }
}

impl HidTransport for MockTransport {
    type Error = MockError;

    fn output_report_id(&self) -> Option<u8> {
        self.report_id
    }

    fn write_report(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MockError);
        }

        self.written.push(*frame);
        self.answer(frame);
        Ok(())
    }

    fn collect_input(&mut self, _window: Duration, sink: &mut Vec<u8>) -> Result<(), Self::Error> {
        sink.extend(self.input.drain(..).flatten());
        Ok(())
    }
}
