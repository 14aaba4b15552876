//! DFU class requests.
//!
//! Each request is a single control transfer on the claimed interface.
//! DNLOAD is always followed by two GETSTATUS polls: the first lets the
//! device apply the block, the second returns the outcome. A write is not
//! complete until the second poll returns.

use tracing::{debug, warn};

use crate::config::WriteFailurePolicy;
use crate::error::DfuError;
use crate::events::{DfuEvent, DfuObserver};
use crate::protocol::constants::*;
use crate::protocol::{DfuState, DfuStatus, hexdump};
use crate::session::DfuSession;
use crate::transport::{Connector, ControlSetup, UsbTransport, check_out_length};

fn setup_in(request: u8, value: u16) -> ControlSetup {
    ControlSetup::new(REQUEST_TYPE_CLASS_IN, request, value, 0)
}

fn setup_out(request: u8, value: u16) -> ControlSetup {
    ControlSetup::new(REQUEST_TYPE_CLASS_OUT, request, value, 0)
}

impl<C: Connector, O: DfuObserver> DfuSession<C, O> {
    /// GETSTATUS.
    pub fn get_status(&mut self) -> Result<DfuStatus, DfuError> {
        let data = self.class_in(setup_in(DFU_GETSTATUS, 0), DFU_STATUS_LEN)?;
        let status = DfuStatus::from_bytes(&data);
        self.emit(DfuEvent::Status(status));
        Ok(status)
    }

    /// GETSTATE.
    pub fn get_state(&mut self) -> Result<DfuState, DfuError> {
        let data = self.class_in(setup_in(DFU_GETSTATE, 0), DFU_STATE_LEN)?;
        Ok(DfuState::from_u8(data.first().copied().unwrap_or(0)))
    }

    /// DNLOAD `data` to `block`, then poll status twice and return the
    /// second record.
    ///
    /// With [`WriteFailurePolicy::Lenient`] a failed data transfer is only
    /// logged; the polls still run and decide the result. With
    /// [`WriteFailurePolicy::Strict`] it fails immediately and disconnects.
    ///
    /// A payload longer than one control transfer can carry is refused
    /// before anything is sent and leaves the session untouched.
    pub fn download(&mut self, block: u16, data: &[u8]) -> Result<DfuStatus, DfuError> {
        check_out_length(data)?;
        debug!(block, len = data.len(), "DNLOAD\n{}", hexdump(data));

        let timeout = self.config().timeout();
        let sent = self
            .link()?
            .control_out(setup_out(DFU_DNLOAD, block), data, timeout);

        if let Err(e) = sent {
            match self.config().write_failure {
                WriteFailurePolicy::Lenient => {
                    warn!(block, error = %e, "DNLOAD transfer failed, deferring to status poll");
                    self.emit(DfuEvent::WriteFailed {
                        block,
                        message: e.to_string(),
                    });
                }
                WriteFailurePolicy::Strict => {
                    self.demote(&e);
                    return Err(DfuError::Transfer(e));
                }
            }
        }

        // Apply
        self.get_status()?;
        // Confirm
        self.get_status()
    }

    /// UPLOAD `length` bytes from `block`, then poll status once so the
    /// device can leave its upload state. Short reads are zero-padded.
    pub fn upload(&mut self, block: u16, length: u16) -> Result<Vec<u8>, DfuError> {
        let mut data = self.class_in(setup_in(DFU_UPLOAD, block), length)?;
        if data.len() < length as usize {
            debug!(block, got = data.len(), expected = length, "Short UPLOAD");
        }
        data.resize(length as usize, 0);

        self.get_status()?;
        Ok(data)
    }

    /// DETACH. The bootloader jumps to the application, so a missing
    /// acknowledgement is normal and ignored.
    pub fn detach(&mut self) -> Result<(), DfuError> {
        let timeout = self.config().timeout();
        let sent = self
            .link()?
            .control_out(setup_out(DFU_DETACH, 0), &[], timeout);
        if let Err(e) = sent {
            debug!(error = %e, "DETACH not acknowledged");
        }
        Ok(())
    }

    /// CLRSTATUS, leaving the error state.
    pub fn clear_status(&mut self) -> Result<(), DfuError> {
        self.class_out(setup_out(DFU_CLRSTATUS, 0), &[])?;
        Ok(())
    }

    /// ABORT, returning to dfuIDLE.
    pub fn abort(&mut self) -> Result<(), DfuError> {
        self.class_out(setup_out(DFU_ABORT, 0), &[])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SessionConfig;
    use crate::events::RecordingObserver;
    use crate::transport::{MockConnector, MockTransport, TransportError};

    fn connected(mock: &MockTransport, config: SessionConfig) -> DfuSession<MockConnector, RecordingObserver> {
        let mut session = DfuSession::with_observer(
            MockConnector::with_device(mock.clone()),
            config,
            Arc::new(RecordingObserver::new()),
        );
        assert!(session.connect());
        session
    }

    #[test]
    fn test_get_status_encoding() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.queue_status(0x00, 250, DFU_STATE_DFU_IDLE);

        let st = session.get_status().unwrap();
        assert_eq!(st.state(), DfuState::DfuIdle);
        assert_eq!(st.poll_timeout_ms(), 250);

        let transfers = mock.get_transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].setup, ControlSetup::new(0xA1, 3, 0, 0));
        assert_eq!(transfers[0].length, 6);
    }

    #[test]
    fn test_get_state_encoding() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.queue_response(DFU_GETSTATE, &[DFU_STATE_UPLOAD_IDLE]);

        assert_eq!(session.get_state().unwrap(), DfuState::UploadIdle);
        let transfers = mock.get_transfers();
        assert_eq!(transfers[0].setup, ControlSetup::new(0xA1, 5, 0, 0));
        assert_eq!(transfers[0].length, 1);
    }

    #[test]
    fn test_download_polls_status_twice() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.queue_status(0x00, 0, DFU_STATE_DNLOAD_BUSY);
        mock.queue_status(0x00, 0, DFU_STATE_DNLOAD_IDLE);

        let st = session.download(2, &[0xAA; 16]).unwrap();
        assert_eq!(st.state(), DfuState::DnloadIdle);
        assert_eq!(
            mock.get_requests(),
            vec![DFU_DNLOAD, DFU_GETSTATUS, DFU_GETSTATUS]
        );
        let transfers = mock.get_transfers();
        assert_eq!(transfers[0].setup, ControlSetup::new(0x21, 1, 2, 0));
        assert_eq!(transfers[0].data, vec![0xAA; 16]);
    }

    #[test]
    fn test_download_write_failure_is_lenient_by_default() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.fail_next(DFU_DNLOAD);

        let st = session.download(0, &[0x91, 0x05]).unwrap();
        assert!(st.status_code().is_ok());
        assert!(session.is_connected());
        assert_eq!(
            mock.get_requests(),
            vec![DFU_DNLOAD, DFU_GETSTATUS, DFU_GETSTATUS]
        );
        assert!(
            session
                .observer()
                .events()
                .iter()
                .any(|e| matches!(e, DfuEvent::WriteFailed { block: 0, .. }))
        );
    }

    #[test]
    fn test_download_write_failure_strict() {
        let mock = MockTransport::new();
        let config = SessionConfig {
            write_failure: WriteFailurePolicy::Strict,
            ..Default::default()
        };
        let mut session = connected(&mock, config);
        mock.fail_next(DFU_DNLOAD);

        assert!(matches!(
            session.download(0, &[0x91, 0x05]),
            Err(DfuError::Transfer(_))
        ));
        assert!(!session.is_connected());
        assert_eq!(mock.get_requests(), vec![DFU_DNLOAD]);
    }

    #[test]
    fn test_download_rejects_oversized_payload() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());

        assert!(matches!(
            session.download(2, &vec![0u8; 70_000]),
            Err(DfuError::Transfer(TransportError::InvalidLength(70_000)))
        ));
        assert!(session.is_connected());
        assert!(mock.get_transfers().is_empty());

        // Largest legal block still goes out
        session.download(2, &vec![0u8; MAX_CONTROL_TRANSFER_LEN]).unwrap();
        assert_eq!(mock.get_downloads()[0].1.len(), 65535);
    }

    #[test]
    fn test_every_status_poll_is_reported() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.queue_status(0x00, 0, DFU_STATE_DNLOAD_BUSY);

        session.download(2, &[0xAA; 4]).unwrap();
        session.upload(2, 4).unwrap();
        session.get_status().unwrap();

        let states: Vec<DfuState> = session
            .observer()
            .events()
            .iter()
            .filter_map(|e| match e {
                DfuEvent::Status(st) => Some(st.state()),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                DfuState::DnloadBusy,
                DfuState::DnloadIdle,
                DfuState::DnloadIdle,
                DfuState::DnloadIdle
            ]
        );
    }

    #[test]
    fn test_download_poll_failure_disconnects() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.fail_next(DFU_GETSTATUS);

        assert!(matches!(
            session.download(2, &[0x00]),
            Err(DfuError::Transfer(_))
        ));
        assert!(!session.is_connected());
        // The confirming poll is never issued
        assert_eq!(mock.get_requests(), vec![DFU_DNLOAD, DFU_GETSTATUS]);
    }

    #[test]
    fn test_upload_pads_and_polls() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.queue_response(DFU_UPLOAD, &[1, 2, 3]);

        let data = session.upload(3, 8).unwrap();
        assert_eq!(data, vec![1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(mock.get_requests(), vec![DFU_UPLOAD, DFU_GETSTATUS]);
        assert_eq!(mock.get_transfers()[0].setup, ControlSetup::new(0xA1, 2, 3, 0));
    }

    #[test]
    fn test_upload_failure_disconnects() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.fail_next(DFU_UPLOAD);

        assert!(matches!(session.upload(2, 1024), Err(DfuError::Transfer(_))));
        assert!(!session.is_connected());
        assert_eq!(mock.get_requests(), vec![DFU_UPLOAD]);
    }

    #[test]
    fn test_get_state_failure_disconnects() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.fail_next(DFU_GETSTATE);

        assert!(matches!(session.get_state(), Err(DfuError::Transfer(_))));
        assert!(!session.is_connected());
        assert!(matches!(session.get_status(), Err(DfuError::NotConnected)));
    }

    #[test]
    fn test_detach_ignores_failure() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());
        mock.fail_next(DFU_DETACH);

        session.detach().unwrap();
        assert!(session.is_connected());
        assert_eq!(mock.get_transfers()[0].setup, ControlSetup::new(0x21, 0, 0, 0));
    }

    #[test]
    fn test_clear_status_and_abort() {
        let mock = MockTransport::new();
        let mut session = connected(&mock, SessionConfig::default());

        session.clear_status().unwrap();
        session.abort().unwrap();
        assert_eq!(mock.get_requests(), vec![DFU_CLRSTATUS, DFU_ABORT]);

        mock.fail_next(DFU_ABORT);
        assert!(session.abort().is_err());
        assert!(!session.is_connected());
    }

    #[test]
    fn test_operations_require_connection() {
        let mock = MockTransport::new();
        let mut session = DfuSession::new(
            MockConnector::with_device(mock.clone()),
            SessionConfig::default(),
        );

        assert!(matches!(session.get_status(), Err(DfuError::NotConnected)));
        assert!(matches!(session.get_state(), Err(DfuError::NotConnected)));
        assert!(matches!(session.download(0, &[]), Err(DfuError::NotConnected)));
        assert!(matches!(session.upload(0, 32), Err(DfuError::NotConnected)));
        assert!(matches!(session.detach(), Err(DfuError::NotConnected)));
        assert!(matches!(session.clear_status(), Err(DfuError::NotConnected)));
        assert!(matches!(session.abort(), Err(DfuError::NotConnected)));
        assert!(mock.get_transfers().is_empty());
    }
}
