//! End-to-end runs against a simulated MD380 bootloader.

use std::sync::Arc;

use md380_dfu::protocol::constants::*;
use md380_dfu::{
    DfuError, DfuEvent, DfuSession, DfuState, MockConnector, MockTransport, RecordingObserver, SessionConfig,
    TeardownPolicy,
};

fn session_with(mock: &MockTransport, config: SessionConfig) -> DfuSession<MockConnector, RecordingObserver> {
    DfuSession::with_observer(
        MockConnector::with_device(mock.clone()),
        config,
        Arc::new(RecordingObserver::new()),
    )
}

#[test]
fn md380_reflash_scenario() {
    let mock = MockTransport::new();
    let mut session = session_with(&mock, SessionConfig::default());

    assert!(session.connect());
    assert!(session.is_connected());

    session.set_address(0x0801_0000).unwrap();
    session.erase_block(0x0801_0000).unwrap();
    assert_eq!(
        mock.get_downloads(),
        vec![
            (0, vec![0x21, 0x00, 0x00, 0x01, 0x08]),
            (0, vec![0x41, 0x00, 0x00, 0x01, 0x08]),
        ]
    );

    // Write fails, both polls succeed
    mock.clear_transfers();
    mock.fail_next(DFU_DNLOAD);
    mock.queue_status(0x00, 0, DFU_STATE_DNLOAD_BUSY);
    mock.queue_status(0x00, 0, DFU_STATE_DNLOAD_IDLE);
    let status = session.download(2, &[0xFF; 1024]).unwrap();
    assert_eq!(status.state(), DfuState::DnloadIdle);
    assert!(session.is_connected());
    assert_eq!(
        mock.get_requests(),
        vec![DFU_DNLOAD, DFU_GETSTATUS, DFU_GETSTATUS]
    );

    // Status poll fails
    mock.fail_next(DFU_GETSTATUS);
    assert!(matches!(session.get_status(), Err(DfuError::Transfer(_))));
    assert!(!session.is_connected());

    let events = session.observer().events();
    assert!(matches!(events.first(), Some(DfuEvent::DeviceConnected { .. })));
    assert!(matches!(events.last(), Some(DfuEvent::DeviceDisconnected { .. })));
}

#[test]
fn failed_session_can_reconnect() {
    let mock = MockTransport::new();
    let mut session = session_with(&mock, SessionConfig::default());
    assert!(session.connect());

    mock.fail_next(DFU_UPLOAD);
    assert!(session.get_command().is_err());
    assert!(matches!(session.reboot(), Err(DfuError::NotConnected)));

    assert!(session.connect());
    session.reboot().unwrap();
    assert_eq!(mock.get_downloads().last(), Some(&(0, vec![0x91, 0x05])));
}

#[test]
fn retain_keeps_handle_after_failure() {
    let mock = MockTransport::new();
    let mut session = session_with(&mock, SessionConfig::default());
    assert!(session.connect());

    mock.fail_next(DFU_GETSTATE);
    assert!(session.get_state().is_err());
    assert!(!session.is_connected());
    assert!(session.holds_transport());

    // Explicit teardown releases it
    session.disconnect().unwrap();
    assert!(!session.holds_transport());
    assert!(matches!(session.disconnect(), Err(DfuError::NoTransport)));
}

#[test]
fn release_drops_handle_on_failure() {
    let mock = MockTransport::new();
    let config = SessionConfig {
        teardown: TeardownPolicy::Release,
        ..Default::default()
    };
    let mut session = session_with(&mock, config);
    assert!(session.connect());
    let held = mock.handle_count();

    mock.fail_next(DFU_GETSTATUS);
    assert!(session.get_status().is_err());
    assert!(!session.is_connected());
    assert!(!session.holds_transport());
    assert_eq!(mock.handle_count(), held - 1);
    assert!(matches!(session.disconnect(), Err(DfuError::NoTransport)));
}

#[test]
fn unplugged_device_demotes_session() {
    let mock = MockTransport::new();
    let mut session = session_with(&mock, SessionConfig::default());
    assert!(session.connect());

    mock.unplug();
    // The write is tolerated, the first poll is not
    assert!(matches!(
        session.program_mode(),
        Err(DfuError::Transfer(md380_dfu::TransportError::Disconnected))
    ));
    assert!(!session.is_connected());
}

#[test]
fn other_device_is_not_matched() {
    let mut mock = MockTransport::new();
    mock.set_ids(0x1234, 0xDF11);
    let mut session = session_with(&mock, SessionConfig::default());
    assert!(!session.connect());
    assert!(!session.is_connected());
}
