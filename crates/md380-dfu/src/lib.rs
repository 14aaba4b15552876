//! md380-dfu: USB DFU client for the MD380 radio bootloader.
//!
//! The MD380 ships an STM32 DFU bootloader (VID 0x0483, PID 0xDF11) with
//! a few proprietary commands layered on top of DNLOAD block 0: setting
//! the target address, erasing a flash block, rebooting and entering
//! programming mode.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Request codes, vendor opcodes, status/state decoding
//! - **Transport**: Control-transfer abstraction (nusb, mock)
//! - **Session**: Owns the claimed interface and the connectivity state
//! - **DFU**: Class requests (DNLOAD, UPLOAD, GETSTATUS, ...)
//! - **Vendor**: MD380 block-0 commands
//! - **Events**: Observer pattern for UI decoupling
//!
//! # Example
//!
//! ```no_run
//! use md380_dfu::{DfuSession, NusbConnector, SessionConfig};
//!
//! let mut session = DfuSession::new(NusbConnector, SessionConfig::default());
//! if session.connect() {
//!     session.program_mode().expect("program mode failed");
//!     session.reboot().expect("reboot failed");
//! }
//! ```

pub mod config;
pub mod dfu;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod vendor;

// Re-exports for convenience
pub use config::{ConfigError, SessionConfig, TeardownPolicy, WriteFailurePolicy};
pub use error::DfuError;
pub use events::{DfuEvent, DfuObserver, NullObserver, PacketDirection, RecordingObserver, TracingObserver};
pub use protocol::{DfuState, DfuStatus, DfuStatusCode, hexdump, le32_at, u8_widen};
pub use session::{DfuSession, LinkState};
pub use transport::{
    Connector, ControlRecord, ControlSetup, MockConnector, MockTransport, NusbConnector, NusbTransport,
    TransportError, UsbTransport,
};
pub use vendor::VendorCommand;
