use alloc::vec::Vec;
use core::time::Duration;

use thiserror::Error as ThisError;

/// Size of every outbound report: the report id plus 64 data bytes.
pub const REPORT_LEN: usize = 65;

/// How long the device gets to answer a command.
pub const RESPONSE_WINDOW: Duration = Duration::from_millis(100);

/// A report ready to be written to the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame([u8; REPORT_LEN]);

impl Frame {
    /// Lays out `[report_id, payload.., 0, 0, ..]`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameEncodingError`] if the payload does not fit next to
    /// the report id.
    pub fn new(report_id: u8, payload: &[u8]) -> Result<Self, FrameEncodingError> {
        let len = 1 + payload.len();

        if len > REPORT_LEN {
            return Err(FrameEncodingError { len });
        }

        let mut buf = [0; REPORT_LEN];
        buf[0] = report_id;
        buf[1..len].copy_from_slice(payload);

        Ok(Self(buf))
    }

    #[inline]
    #[must_use]
    pub fn report_id(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("frame would be {len} bytes, reports are {REPORT_LEN} bytes")]
pub struct FrameEncodingError {
    pub len: usize,
}

/// Failure to get a command to the device.
#[derive(Debug, ThisError)]
pub enum CommandError<E> {
    #[error("device has no output report")]
    NoOutputReport,
    #[error(transparent)]
    Frame(#[from] FrameEncodingError),
    #[error("transport failure: {0}")]
    Transport(E),
}

impl<E> CommandError<E> {
    /// Whether the error points at a defect rather than at the device.
    /// Fatal errors must not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Frame(_))
    }
}

/// Report level access to a HID device.
///
/// Inbound traffic is not correlated with outbound reports in any way:
/// whatever arrives while [`HidTransport::collect_input`] is blocked
/// belongs to the caller.
pub trait HidTransport {
    type Error;

    /// Report id of the output channel, if the device has one.
    fn output_report_id(&self) -> Option<u8>;

    ///
    /// # Errors
    fn write_report(&mut self, frame: &Frame) -> Result<(), Self::Error>;

    /// Blocks for `window`, appending every input byte received meanwhile
    /// to `sink`.
    ///
    /// # Errors
    fn collect_input(&mut self, window: Duration, sink: &mut Vec<u8>) -> Result<(), Self::Error>;
}

impl<T> HidTransport for &mut T
where
    T: HidTransport + ?Sized,
{
    type Error = T::Error;

    fn output_report_id(&self) -> Option<u8> {
        (**self).output_report_id()
    }

    fn write_report(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        (**self).write_report(frame)
    }

    fn collect_input(&mut self, window: Duration, sink: &mut Vec<u8>) -> Result<(), Self::Error> {
        (**self).collect_input(window, sink)
    }
}

/// Frames `payload` with the transport's output report id and writes it.
///
/// # Errors
///
/// Fails when the device has no output report, when the payload cannot be
/// framed or when the transport rejects the write.
pub fn send<T>(transport: &mut T, payload: &[u8]) -> Result<(), CommandError<T::Error>>
where
    T: HidTransport + ?Sized,
{
    let report_id = transport
        .output_report_id()
        .ok_or(CommandError::NoOutputReport)?;

    let frame = Frame::new(report_id, payload)?;

    transport
        .write_report(&frame)
        .map_err(CommandError::Transport)
}

/// Collects whatever the device sends during `window`. The result may be
/// empty, or hold bytes unrelated to the last command sent.
///
/// # Errors
///
/// Propagates transport failures.
pub fn read_response<T>(transport: &mut T, window: Duration) -> Result<Vec<u8>, T::Error>
where
    T: HidTransport + ?Sized,
{
    let mut response = Vec::new();
    transport.collect_input(window, &mut response)?;
    Ok(response)
}
