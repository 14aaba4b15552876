//! nusb-based USB transport implementation.

use std::time::Duration;

use ::nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient, TransferError};
use ::nusb::{Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument};

use super::traits::{Connector, ControlSetup, TransportError, UsbTransport, check_out_length};

/// nusb-based USB transport.
pub struct NusbTransport {
    interface: Interface,
    vid: u16,
    pid: u16,
}

impl NusbTransport {
    /// Open the first device matching VID/PID and claim `interface`.
    #[instrument(level = "info", fields(vid = format!("{:04X}", vid), pid = format!("{:04X}", pid)))]
    pub fn open_with_ids(vid: u16, pid: u16, interface: u8) -> Result<Self, TransportError> {
        let device_info = list_devices()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?
            .find(|d| d.vendor_id() == vid && d.product_id() == pid)
            .ok_or(TransportError::DeviceNotFound { vid, pid })?;

        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            "Found device"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        debug!(interface, "Claiming interface");
        let claimed = device.claim_interface(interface).wait().map_err(|e| {
            TransportError::ClaimInterfaceFailed {
                interface,
                message: e.to_string(),
            }
        })?;

        info!(interface, "Device opened successfully");

        Ok(Self {
            interface: claimed,
            vid,
            pid,
        })
    }
}

/// Split a bmRequestType into nusb's control type and recipient.
fn split_request_type(request_type: u8) -> Result<(ControlType, Recipient), TransportError> {
    let control_type = match (request_type >> 5) & 0x03 {
        0 => ControlType::Standard,
        1 => ControlType::Class,
        2 => ControlType::Vendor,
        _ => return Err(TransportError::InvalidRequestType(request_type)),
    };
    let recipient = match request_type & 0x1F {
        0 => Recipient::Device,
        1 => Recipient::Interface,
        2 => Recipient::Endpoint,
        3 => Recipient::Other,
        _ => return Err(TransportError::InvalidRequestType(request_type)),
    };
    Ok((control_type, recipient))
}

fn map_transfer_error(err: TransferError, timeout: Duration) -> TransportError {
    match err {
        TransferError::Stall => TransportError::Stall,
        TransferError::Disconnected => TransportError::Disconnected,
        // nusb cancels transfers whose timeout elapsed.
        TransferError::Cancelled => TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        other => TransportError::TransferFailed(other.to_string()),
    }
}

impl UsbTransport for NusbTransport {
    #[instrument(skip(self, setup), fields(request = setup.request, value = setup.value))]
    fn control_in(
        &self,
        setup: ControlSetup,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if !setup.is_in() {
            return Err(TransportError::InvalidRequestType(setup.request_type));
        }
        let (control_type, recipient) = split_request_type(setup.request_type)?;
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type,
                    recipient,
                    request: setup.request,
                    value: setup.value,
                    index: setup.index,
                    length,
                },
                timeout,
            )
            .wait()
            .map_err(|e| map_transfer_error(e, timeout))?;

        debug!(bytes_read = data.len(), "Control IN complete");
        Ok(data)
    }

    #[instrument(skip(self, setup, data), fields(request = setup.request, value = setup.value, len = data.len()))]
    fn control_out(
        &self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        if setup.is_in() {
            return Err(TransportError::InvalidRequestType(setup.request_type));
        }
        check_out_length(data)?;
        let (control_type, recipient) = split_request_type(setup.request_type)?;
        self.interface
            .control_out(
                ControlOut {
                    control_type,
                    recipient,
                    request: setup.request,
                    value: setup.value,
                    index: setup.index,
                    data,
                },
                timeout,
            )
            .wait()
            .map_err(|e| map_transfer_error(e, timeout))?;

        debug!(bytes_written = data.len(), "Control OUT complete");
        Ok(data.len())
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}

/// Connector backed by the host's USB stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbConnector;

impl Connector for NusbConnector {
    type Transport = NusbTransport;

    fn open(&self, vid: u16, pid: u16, interface: u8) -> Result<NusbTransport, TransportError> {
        NusbTransport::open_with_ids(vid, pid, interface)
    }
}
