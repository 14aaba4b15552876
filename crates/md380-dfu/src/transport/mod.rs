//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use self::mock::{ControlRecord, MockConnector, MockTransport};
pub use self::nusb::{NusbConnector, NusbTransport};
pub use self::traits::{Connector, ControlSetup, TransportError, UsbTransport, check_out_length};
