//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow session activity
//! without tight coupling to the protocol engine.

use std::fmt;
use std::sync::Mutex;

use crate::protocol::{DfuStatus, hexdump};

/// USB packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Transmit (Host -> Device)
    Rx, // Receive (Device -> Host)
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Events emitted by a DFU session.
#[derive(Debug, Clone)]
pub enum DfuEvent {
    /// Interface claimed.
    DeviceConnected { vid: u16, pid: u16 },
    /// Session demoted to disconnected.
    DeviceDisconnected { reason: String },
    /// Control transfer completed.
    Packet {
        direction: PacketDirection,
        request: u8,
        value: u16,
        data: Vec<u8>,
    },
    /// A DNLOAD data stage failed but the session carried on.
    WriteFailed { block: u16, message: String },
    /// Status record returned by a GETSTATUS poll.
    Status(DfuStatus),
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait DfuObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &DfuEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl DfuObserver for NullObserver {
    fn on_event(&self, _event: &DfuEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl DfuObserver for TracingObserver {
    fn on_event(&self, event: &DfuEvent) {
        match event {
            DfuEvent::DeviceConnected { vid, pid } => {
                tracing::info!(vid = %format!("{:04X}", vid), pid = %format!("{:04X}", pid), "Device connected");
            }
            DfuEvent::DeviceDisconnected { reason } => {
                tracing::warn!(reason = %reason, "Device disconnected");
            }
            DfuEvent::Packet {
                direction,
                request,
                value,
                data,
            } => {
                tracing::trace!(
                    dir = %direction,
                    request = request,
                    block = value,
                    len = data.len(),
                    "USB Packet\n{}",
                    hexdump(data)
                );
            }
            DfuEvent::WriteFailed { block, message } => {
                tracing::warn!(block = block, error = %message, "DNLOAD transfer failed, continuing");
            }
            DfuEvent::Status(status) => {
                tracing::debug!(status = %status, "Status");
            }
        }
    }
}

/// Observer that keeps every event, for inspection in tests.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DfuEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DfuEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DfuObserver for RecordingObserver {
    fn on_event(&self, event: &DfuEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
