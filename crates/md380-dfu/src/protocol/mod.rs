//! Protocol module - DFU requests, MD380 opcodes and response decoding.

pub mod bytes;
pub mod constants;
pub mod status;

pub use bytes::{hexdump, le32_at, u8_widen};
pub use constants::*;
pub use status::{DfuState, DfuStatus, DfuStatusCode};
