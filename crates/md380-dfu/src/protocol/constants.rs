//! Protocol constants for the STM32 DFU bootloader and the MD380 extensions.
//!
//! Request codes and states follow the USB DFU 1.1 class specification.
//! Vendor opcodes are carried in DNLOAD payloads on block 0.

use std::time::Duration;

// ============================================================================
// Device Identification
// ============================================================================

/// STMicroelectronics Vendor ID
pub const STM_VENDOR_ID: u16 = 0x0483;

/// STM32 DFU bootloader Product ID (used by the MD380 in DFU mode)
pub const STM_DFU_PRODUCT_ID: u16 = 0xDF11;

/// The bootloader exposes a single DFU interface.
pub const DFU_INTERFACE: u8 = 0;

/// Timeout applied to every control transfer.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

// ============================================================================
// bmRequestType
// ============================================================================

/// Device-to-host, class, interface
pub const REQUEST_TYPE_CLASS_IN: u8 = 0xA1;

/// Host-to-device, class, interface
pub const REQUEST_TYPE_CLASS_OUT: u8 = 0x21;

/// Direction bit of bmRequestType (set for device-to-host).
pub const REQUEST_TYPE_DIR_IN: u8 = 0x80;

// ============================================================================
// DFU class requests (bRequest)
// ============================================================================

pub const DFU_DETACH: u8 = 0;
pub const DFU_DNLOAD: u8 = 1;
pub const DFU_UPLOAD: u8 = 2;
pub const DFU_GETSTATUS: u8 = 3;
pub const DFU_CLRSTATUS: u8 = 4;
pub const DFU_GETSTATE: u8 = 5;
pub const DFU_ABORT: u8 = 6;

/// Length of the GETSTATUS response.
pub const DFU_STATUS_LEN: u16 = 6;

/// Length of the GETSTATE response.
pub const DFU_STATE_LEN: u16 = 1;

/// Largest data stage a control transfer can carry (wLength is 16 bits).
pub const MAX_CONTROL_TRANSFER_LEN: usize = u16::MAX as usize;

// ============================================================================
// Blocks
// ============================================================================

/// Block reserved for vendor command payloads and the command response.
pub const COMMAND_BLOCK: u16 = 0;

/// Size of the command response read back from block 0.
pub const COMMAND_RESPONSE_LEN: u16 = 32;

// ============================================================================
// MD380 vendor opcodes (byte 0 of a block-0 DNLOAD)
// ============================================================================

/// Set the target address for subsequent block transfers.
pub const VENDOR_SET_ADDRESS: u8 = 0x21;

/// Erase the flash block containing the given address.
pub const VENDOR_ERASE_BLOCK: u8 = 0x41;

/// Family byte of the two-byte MD380 commands.
pub const VENDOR_CMD_FAMILY: u8 = 0x91;

/// Halt all threads and show "Programming Mode".
pub const VENDOR_CMD_PROGRAM_MODE: u8 = 0x01;

/// Reboot the radio.
pub const VENDOR_CMD_REBOOT: u8 = 0x05;

// ============================================================================
// DFU states (bState)
// ============================================================================

pub const DFU_STATE_APP_IDLE: u8 = 0x00;
pub const DFU_STATE_APP_DETACH: u8 = 0x01;
pub const DFU_STATE_DFU_IDLE: u8 = 0x02;
pub const DFU_STATE_DNLOAD_SYNC: u8 = 0x03;
pub const DFU_STATE_DNLOAD_BUSY: u8 = 0x04;
pub const DFU_STATE_DNLOAD_IDLE: u8 = 0x05;
pub const DFU_STATE_MANIFEST_SYNC: u8 = 0x06;
pub const DFU_STATE_MANIFEST: u8 = 0x07;
pub const DFU_STATE_MANIFEST_WAIT_RESET: u8 = 0x08;
pub const DFU_STATE_UPLOAD_IDLE: u8 = 0x09;
pub const DFU_STATE_ERROR: u8 = 0x0A;
