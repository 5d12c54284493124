use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use psu::{Frame, HidTransport, USB_PID, USB_VID};
use rusb::{Context, DeviceHandle, Direction, TransferType, UsbContext};
use thiserror::Error as ThisError;
use tracing::instrument;

const HID_CLASS: u8 = 0x03;
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Host to device, class request, addressed to an interface.
const SET_REPORT_REQUEST_TYPE: u8 = 0x21;
const SET_REPORT: u8 = 0x09;
const OUTPUT_REPORT_TYPE: u16 = 0x0200;

/// USB identity of the power supply to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceId {
    pub vid: u16,
    pub pid: u16,
}

impl Default for DeviceId {
    fn default() -> Self {
        Self {
            vid: USB_VID,
            pid: USB_PID,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vid, self.pid)
    }
}

#[derive(Debug, ThisError)]
pub enum DeviceError {
    #[error("device {0} not found")]
    NotFound(DeviceId),
    #[error("device has no HID interface")]
    NoHidInterface,
    #[error("HID interface has no interrupt IN endpoint")]
    NoInputEndpoint,
    #[error("wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error(transparent)]
    Usb(#[from] rusb::Error),
}

/// How output reports reach the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputPipe {
    /// Interrupt OUT endpoint of the HID interface.
    Interrupt(u8),
    /// `SET_REPORT` requests on the control pipe.
    Control,
}

/// The power supply's HID interface, claimed for as long as this value
/// lives.
#[derive(Debug)]
pub struct PowerSupply {
    handle: DeviceHandle<Context>,
    interface_number: u8,
    in_endpoint_address: u8,
    in_packet_size: usize,
    output: OutputPipe,
    report_id: u8,
    reattach_kernel_driver: bool,
}

impl PowerSupply {
    /// Opens the first device matching `id`.
    ///
    /// `report_id` is the id of the device's output report. A report id of
    /// `0` means reports are unnumbered and the id byte never goes on the
    /// wire.
    ///
    /// # Errors
    ///
    /// Fails with [`DeviceError::NotFound`] when no device matches, and with
    /// other variants when the device cannot be claimed.
    #[instrument(skip_all, fields(device = %id), err(Debug))]
    pub fn open(id: DeviceId, report_id: u8) -> Result<Self, DeviceError> {
        let context = Context::new()?;

        let device = context
            .devices()?
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .is_ok_and(|desc| desc.vendor_id() == id.vid && desc.product_id() == id.pid)
            })
            .ok_or(DeviceError::NotFound(id))?;

        let config_desc = device.active_config_descriptor()?;

        let interface_desc = config_desc
            .interfaces()
            .flat_map(|i| i.descriptors())
            .find(|idesc| idesc.class_code() == HID_CLASS)
            .ok_or(DeviceError::NoHidInterface)?;

        let interface_number = interface_desc.interface_number();

        let (in_endpoint_address, in_packet_size) = interface_desc
            .endpoint_descriptors()
            .filter(|edesc| edesc.direction() == Direction::In)
            .find(|edesc| edesc.transfer_type() == TransferType::Interrupt)
            .map(|edesc| (edesc.address(), usize::from(edesc.max_packet_size())))
            .ok_or(DeviceError::NoInputEndpoint)?;

        let output = interface_desc
            .endpoint_descriptors()
            .filter(|edesc| edesc.direction() == Direction::Out)
            .find(|edesc| edesc.transfer_type() == TransferType::Interrupt)
            .map_or(OutputPipe::Control, |edesc| {
                OutputPipe::Interrupt(edesc.address())
            });

        let handle = device.open()?;

        // Not supported on every platform, in which case there is nothing
        // to detach.
        let reattach_kernel_driver = matches!(handle.kernel_driver_active(interface_number), Ok(true));
        if reattach_kernel_driver {
            handle.detach_kernel_driver(interface_number)?;
        }

        // Built before claiming so the kernel driver gets re-attached on failure.
        let supply = Self {
            handle,
            interface_number,
            in_endpoint_address,
            in_packet_size,
            output,
            report_id,
            reattach_kernel_driver,
        };

        supply.handle.claim_interface(interface_number)?;

        tracing::debug!(
            "claimed interface {interface_number}, IN endpoint {in_endpoint_address:#04x}, \
             output {output:?}"
        );

        Ok(supply)
    }
}

impl HidTransport for PowerSupply {
    type Error = DeviceError;

    fn output_report_id(&self) -> Option<u8> {
        Some(self.report_id)
    }

    fn write_report(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        let data = wire_bytes(frame);

        let result = match self.output {
            OutputPipe::Interrupt(endpoint) => {
                self.handle.write_interrupt(endpoint, data, WRITE_TIMEOUT)
            }
            OutputPipe::Control => self.handle.write_control(
                SET_REPORT_REQUEST_TYPE,
                SET_REPORT,
                set_report_value(frame.report_id()),
                u16::from(self.interface_number),
                data,
                WRITE_TIMEOUT,
            ),
        };

        match result {
            Ok(written) if written == data.len() => Ok(()),
            Ok(written) => Err(DeviceError::ShortWrite {
                written,
                expected: data.len(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn collect_input(&mut self, window: Duration, sink: &mut Vec<u8>) -> Result<(), Self::Error> {
        let deadline = Instant::now() + window;
        let mut buf = vec![0; self.in_packet_size];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());

            // libusb treats a zero millisecond timeout as no timeout at all.
            if remaining < Duration::from_millis(1) {
                thread::sleep(remaining);
                return Ok(());
            }

            match self
                .handle
                .read_interrupt(self.in_endpoint_address, &mut buf, remaining)
            {
                Ok(read) => push_packet(self.report_id, &buf[..read], sink),
                Err(rusb::Error::Timeout) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// The part of a frame that goes on the wire: unnumbered reports drop the
/// id byte.
fn wire_bytes(frame: &Frame) -> &[u8] {
    let bytes = frame.as_bytes();

    if frame.report_id() == 0 {
        &bytes[1..]
    } else {
        bytes
    }
}

/// `wValue` of a `SET_REPORT` request for output report `report_id`.
fn set_report_value(report_id: u8) -> u16 {
    OUTPUT_REPORT_TYPE | u16::from(report_id)
}

/// Appends an input packet the way HID APIs present it, with the report id
/// in front. Numbered reports already carry it.
fn push_packet(report_id: u8, packet: &[u8], sink: &mut Vec<u8>) {
    if report_id == 0 {
        sink.push(0);
    }
    sink.extend_from_slice(packet);
}

impl Drop for PowerSupply {
    fn drop(&mut self) {
        self.handle.release_interface(self.interface_number).ok();

        if self.reattach_kernel_driver {
            self.handle
                .attach_kernel_driver(self.interface_number)
                .ok();
        }

        tracing::debug!("released interface {}", self.interface_number);
    }
}

#[cfg(test)]
mod tests {
    use psu::{
        Command, Frame, LinearFloat, Parameter, REPORT_LEN, command::decode_response,
    };

    use super::{DeviceId, push_packet, set_report_value, wire_bytes};

    #[test]
    fn test_default_device_id() {
        let id = DeviceId::default();
        assert_eq!((id.vid, id.pid), (0x264a, 0x2329));
        assert_eq!(id.to_string(), "264a:2329");
    }

    #[test]
    fn test_unnumbered_report_drops_id() {
        let payload = Command::ReadParameter(Parameter::Temperature).payload();
        let frame = Frame::new(0, &payload).unwrap();

        let data = wire_bytes(&frame);
        assert_eq!(data.len(), REPORT_LEN - 1);
        assert_eq!(data[..2], [0x31, 0x3A]);
        assert!(data[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_numbered_report_keeps_id() {
        let frame = Frame::new(7, &[0x30, 0x42]).unwrap();

        let data = wire_bytes(&frame);
        assert_eq!(data.len(), REPORT_LEN);
        assert_eq!(data[..3], [7, 0x30, 0x42]);
    }

    #[test]
    fn test_set_report_value() {
        assert_eq!(set_report_value(0), 0x0200);
        assert_eq!(set_report_value(7), 0x0207);
    }

    #[test]
    fn test_unnumbered_packets_get_id_prefix() {
        // 3200 encoded, answer to a temperature read.
        let packet = [0x31, 0x3A, 0x64, 0x28, 0x00];

        let mut sink = Vec::new();
        push_packet(0, &packet, &mut sink);
        assert_eq!(sink, [0x00, 0x31, 0x3A, 0x64, 0x28, 0x00]);
        assert_eq!(decode_response(&sink), Some(3200.0));

        // Without the prefix the value would be read one byte off.
        assert_ne!(decode_response(&packet), Some(3200.0));
    }

    #[test]
    fn test_numbered_packets_pass_through() {
        let value = LinearFloat::new(0xF3E8);
        let [low, high] = value.raw().to_le_bytes();
        let packet = [0x05, 0x31, 0x3A, low, high];

        let mut sink = Vec::new();
        push_packet(5, &packet, &mut sink);
        push_packet(5, &[0x05, 0xFF], &mut sink);
        assert_eq!(sink[..5], packet);
        assert_eq!(sink[5..], [0x05, 0xFF]);
        assert_eq!(decode_response(&sink), Some(value.value()));
    }
}
