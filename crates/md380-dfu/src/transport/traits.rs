//! USB Transport layer abstraction.
//!
//! Defines the `UsbTransport` trait for control transfers on an opened DFU
//! interface and the `Connector` trait that finds, opens and claims one,
//! allowing different implementations (nusb, mock, etc.).

use std::time::Duration;

use thiserror::Error;

use crate::protocol::constants::{MAX_CONTROL_TRANSFER_LEN, REQUEST_TYPE_DIR_IN};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Unsupported bmRequestType 0x{0:02X}")]
    InvalidRequestType(u8),

    #[error("Data stage of {0} bytes exceeds the 16-bit wLength")]
    InvalidLength(usize),

    #[error("Request stalled by device")]
    Stall,

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),
}

/// Setup stage of a control transfer (everything but the data stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    pub fn new(request_type: u8, request: u8, value: u16, index: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
        }
    }

    /// Device-to-host transfer.
    pub fn is_in(&self) -> bool {
        self.request_type & REQUEST_TYPE_DIR_IN != 0
    }
}

/// Reject an OUT data stage that does not fit in wLength.
pub fn check_out_length(data: &[u8]) -> Result<(), TransportError> {
    if data.len() > MAX_CONTROL_TRANSFER_LEN {
        return Err(TransportError::InvalidLength(data.len()));
    }
    Ok(())
}

/// Control-transfer channel bound to one claimed interface.
pub trait UsbTransport: Send + Sync {
    /// Device-to-host control transfer reading up to `length` bytes.
    fn control_in(
        &self,
        setup: ControlSetup,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Host-to-device control transfer. Returns the number of bytes sent.
    fn control_out(
        &self,
        setup: ControlSetup,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Get the VID of the opened device.
    fn vendor_id(&self) -> u16;

    /// Get the PID of the opened device.
    fn product_id(&self) -> u16;
}

/// Finds a device by VID/PID, opens it and claims an interface.
///
/// Enumeration and permission handling belong to the host platform; the
/// session only consumes the claimed transport.
pub trait Connector {
    type Transport: UsbTransport;

    fn open(&self, vid: u16, pid: u16, interface: u8) -> Result<Self::Transport, TransportError>;
}
