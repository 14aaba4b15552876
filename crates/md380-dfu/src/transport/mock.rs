//! Mock USB transport for testing.
//!
//! Simulates an STM32 DFU bootloader: every control transfer is captured,
//! IN responses are scripted per request code, and failures can be injected
//! for the next transfer of a given request.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{Connector, ControlSetup, TransportError, UsbTransport, check_out_length};
use crate::protocol::constants::*;

/// One captured control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    pub setup: ControlSetup,
    /// Payload of an OUT transfer (empty for IN).
    pub data: Vec<u8>,
    /// Requested length of an IN transfer (0 for OUT).
    pub length: u16,
}

#[derive(Debug)]
struct MockState {
    /// Scripted IN responses keyed by bRequest.
    responses: HashMap<u8, VecDeque<Vec<u8>>>,
    /// Requests whose next transfer fails.
    pending_failures: Vec<u8>,
    /// Captured transfers.
    log: Vec<ControlRecord>,
    /// State reported when no GETSTATUS/GETSTATE response is queued.
    idle_state: u8,
    /// Whether device is "connected".
    connected: bool,
}

/// Mock transport for unit testing the protocol engine.
///
/// Clones share the same simulated device, so a test can keep one handle
/// while the session owns another.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    vid: u16,
    pid: u16,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses: HashMap::new(),
                pending_failures: Vec::new(),
                log: Vec::new(),
                idle_state: DFU_STATE_DNLOAD_IDLE,
                connected: true,
            })),
            vid: STM_VENDOR_ID,
            pid: STM_DFU_PRODUCT_ID,
        }
    }

    /// Queue a response for the next IN transfer of `request`.
    pub fn queue_response(&self, request: u8, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry(request)
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Queue a GETSTATUS record.
    pub fn queue_status(&self, status: u8, poll_timeout_ms: u32, state: u8) {
        let t = poll_timeout_ms.to_le_bytes();
        self.queue_response(DFU_GETSTATUS, &[status, t[0], t[1], t[2], state, 0]);
    }

    /// State reported by GETSTATUS/GETSTATE when nothing is queued.
    pub fn set_idle_state(&self, state: u8) {
        self.state.lock().unwrap().idle_state = state;
    }

    /// Make the next transfer of `request` fail.
    pub fn fail_next(&self, request: u8) {
        self.state.lock().unwrap().pending_failures.push(request);
    }

    /// Get all captured transfers.
    pub fn get_transfers(&self) -> Vec<ControlRecord> {
        self.state.lock().unwrap().log.clone()
    }

    /// Payloads of all captured DNLOAD transfers.
    pub fn get_downloads(&self) -> Vec<(u16, Vec<u8>)> {
        self.get_transfers()
            .into_iter()
            .filter(|r| r.setup.request == DFU_DNLOAD)
            .map(|r| (r.setup.value, r.data))
            .collect()
    }

    /// bRequest codes in the order they were issued.
    pub fn get_requests(&self) -> Vec<u8> {
        self.get_transfers().iter().map(|r| r.setup.request).collect()
    }

    /// Clear captured transfers.
    pub fn clear_transfers(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Simulate device unplug.
    pub fn unplug(&self) {
        self.state.lock().unwrap().connected = false;
    }

    /// Simulate device re-plug.
    pub fn replug(&self) {
        self.state.lock().unwrap().connected = true;
    }

    /// Set VID/PID reported by this device.
    pub fn set_ids(&mut self, vid: u16, pid: u16) {
        self.vid = vid;
        self.pid = pid;
    }

    /// Number of live handles to the simulated device.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    fn begin(&self, state: &mut MockState, record: ControlRecord) -> Result<(), TransportError> {
        let request = record.setup.request;
        state.log.push(record);
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        if let Some(pos) = state.pending_failures.iter().position(|&r| r == request) {
            state.pending_failures.remove(pos);
            return Err(TransportError::TransferFailed(format!(
                "injected failure on request {}",
                request
            )));
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbTransport for MockTransport {
    fn control_in(
        &self,
        setup: ControlSetup,
        length: u16,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        self.begin(
            &mut state,
            ControlRecord {
                setup,
                data: Vec::new(),
                length,
            },
        )?;

        let queued = state
            .responses
            .get_mut(&setup.request)
            .and_then(|q| q.pop_front());
        let mut data = match queued {
            Some(bytes) => bytes,
            None => match setup.request {
                DFU_GETSTATUS => vec![0, 0, 0, 0, state.idle_state, 0],
                DFU_GETSTATE => vec![state.idle_state],
                _ => Vec::new(),
            },
        };
        data.truncate(length as usize);
        Ok(data)
    }

    fn control_out(
        &self,
        setup: ControlSetup,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        // Same bound the host stack enforces when building the setup packet
        check_out_length(data)?;
        let mut state = self.state.lock().unwrap();
        self.begin(
            &mut state,
            ControlRecord {
                setup,
                data: data.to_vec(),
                length: 0,
            },
        )?;
        Ok(data.len())
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}

/// Connector over a simulated bus holding at most one mock device.
#[derive(Clone, Default)]
pub struct MockConnector {
    device: Option<MockTransport>,
    claim_fails: bool,
}

impl MockConnector {
    /// Bus with nothing plugged in.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bus with `device` plugged in.
    pub fn with_device(device: MockTransport) -> Self {
        Self {
            device: Some(device),
            claim_fails: false,
        }
    }

    /// Make interface claims fail (device busy / permission denied).
    pub fn set_claim_fails(&mut self, fails: bool) {
        self.claim_fails = fails;
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&self, vid: u16, pid: u16, interface: u8) -> Result<MockTransport, TransportError> {
        let device = self
            .device
            .as_ref()
            .filter(|d| d.vendor_id() == vid && d.product_id() == pid)
            .ok_or(TransportError::DeviceNotFound { vid, pid })?;
        if self.claim_fails {
            return Err(TransportError::ClaimInterfaceFailed {
                interface,
                message: "interface busy".into(),
            });
        }
        Ok(device.clone())
    }
}
