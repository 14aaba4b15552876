//! DFU Session - owns the claimed transport and the connectivity state.
//!
//! Every protocol operation goes through the session. A transport failure
//! on a status, state or upload exchange demotes it to disconnected; only
//! a fresh `connect()` brings it back.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::{SessionConfig, TeardownPolicy};
use crate::error::DfuError;
use crate::events::{DfuEvent, DfuObserver, PacketDirection, TracingObserver};
use crate::transport::{Connector, ControlSetup, TransportError, UsbTransport};

/// Connectivity state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// DFU Session over one device.
pub struct DfuSession<C: Connector, O: DfuObserver = TracingObserver> {
    config: SessionConfig,
    connector: C,
    observer: Arc<O>,
    transport: Option<C::Transport>,
    link: LinkState,
}

impl<C: Connector> DfuSession<C, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(connector: C, config: SessionConfig) -> Self {
        Self::with_observer(connector, config, Arc::new(TracingObserver))
    }
}

impl<C: Connector, O: DfuObserver> DfuSession<C, O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(connector: C, config: SessionConfig, observer: Arc<O>) -> Self {
        Self {
            config,
            connector,
            observer,
            transport: None,
            link: LinkState::Disconnected,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Find the device, open it and claim its DFU interface.
    ///
    /// A missing device or a refused claim is an expected outcome and is
    /// reported as `false`, never as an error. Any handle retained from an
    /// earlier failure is dropped first.
    #[instrument(skip(self), fields(vid = format!("{:04X}", self.config.vendor_id), pid = format!("{:04X}", self.config.product_id)))]
    pub fn connect(&mut self) -> bool {
        self.transport = None;
        self.link = LinkState::Disconnected;

        let SessionConfig {
            vendor_id,
            product_id,
            interface,
            ..
        } = self.config;

        match self.connector.open(vendor_id, product_id, interface) {
            Ok(transport) => {
                info!(interface, "Connected");
                self.observer.on_event(&DfuEvent::DeviceConnected {
                    vid: transport.vendor_id(),
                    pid: transport.product_id(),
                });
                self.transport = Some(transport);
                self.link = LinkState::Connected;
                true
            }
            Err(TransportError::DeviceNotFound { .. }) => {
                debug!("No matching device");
                false
            }
            Err(e) => {
                warn!(error = %e, interface, "Could not claim interface");
                false
            }
        }
    }

    /// Release the transport and mark the session disconnected.
    ///
    /// Returns `NoTransport` if there was nothing to release.
    pub fn disconnect(&mut self) -> Result<(), DfuError> {
        let was_connected = self.is_connected();
        self.link = LinkState::Disconnected;
        let transport = self.transport.take().ok_or(DfuError::NoTransport)?;
        drop(transport);
        if was_connected {
            self.observer.on_event(&DfuEvent::DeviceDisconnected {
                reason: "released by host".into(),
            });
        }
        info!("Disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Whether a transport handle is still held (see [`TeardownPolicy`]).
    pub fn holds_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Transport of a connected session, wrapped to report packets.
    pub(crate) fn link(&self) -> Result<ObservableTransport<'_, C::Transport, O>, DfuError> {
        match (&self.link, &self.transport) {
            (LinkState::Connected, Some(inner)) => Ok(ObservableTransport {
                inner,
                observer: self.observer.as_ref(),
            }),
            _ => Err(DfuError::NotConnected),
        }
    }

    pub(crate) fn emit(&self, event: DfuEvent) {
        self.observer.on_event(&event);
    }

    /// Demote the session after a transport failure.
    pub(crate) fn demote(&mut self, cause: &TransportError) {
        self.link = LinkState::Disconnected;
        if self.config.teardown == TeardownPolicy::Release {
            self.transport = None;
        }
        self.emit(DfuEvent::DeviceDisconnected {
            reason: cause.to_string(),
        });
    }

    /// IN transfer that demotes the session on failure.
    pub(crate) fn class_in(&mut self, setup: ControlSetup, length: u16) -> Result<Vec<u8>, DfuError> {
        let timeout = self.config.timeout();
        let result = self.link()?.control_in(setup, length, timeout);
        result.map_err(|e| {
            self.demote(&e);
            DfuError::Transfer(e)
        })
    }

    /// OUT transfer that demotes the session on failure.
    pub(crate) fn class_out(&mut self, setup: ControlSetup, data: &[u8]) -> Result<usize, DfuError> {
        let timeout = self.config.timeout();
        let result = self.link()?.control_out(setup, data, timeout);
        result.map_err(|e| {
            self.demote(&e);
            DfuError::Transfer(e)
        })
    }
}

/// Transport wrapper that emits packet events.
pub(crate) struct ObservableTransport<'a, T: UsbTransport, O: DfuObserver> {
    inner: &'a T,
    observer: &'a O,
}

impl<'a, T: UsbTransport, O: DfuObserver> UsbTransport for ObservableTransport<'a, T, O> {
    fn control_in(
        &self,
        setup: ControlSetup,
        length: u16,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let res = self.inner.control_in(setup, length, timeout);
        if let Ok(data) = &res {
            self.observer.on_event(&DfuEvent::Packet {
                direction: PacketDirection::Rx,
                request: setup.request,
                value: setup.value,
                data: data.clone(),
            });
        }
        res
    }

    fn control_out(
        &self,
        setup: ControlSetup,
        data: &[u8],
        timeout: std::time::Duration,
    ) -> Result<usize, TransportError> {
        let res = self.inner.control_out(setup, data, timeout);
        if res.is_ok() {
            self.observer.on_event(&DfuEvent::Packet {
                direction: PacketDirection::Tx,
                request: setup.request,
                value: setup.value,
                data: data.to_vec(),
            });
        }
        res
    }

    fn vendor_id(&self) -> u16 {
        self.inner.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.inner.product_id()
    }
}
