//! GETSTATUS / GETSTATE response decoding.
//!
//! The device reports a 6-byte status record:
//! `bStatus`, `bwPollTimeout` (24-bit LE), `bState`, `iString`.

use std::fmt;

use super::bytes::le24;
use super::constants::*;

/// DFU device state (`bState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuState {
    AppIdle,
    AppDetach,
    DfuIdle,
    DnloadSync,
    DnloadBusy,
    DnloadIdle,
    ManifestSync,
    Manifest,
    ManifestWaitReset,
    UploadIdle,
    Error,
    /// Value outside the DFU 1.1 enumeration.
    Unknown(u8),
}

impl DfuState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            DFU_STATE_APP_IDLE => DfuState::AppIdle,
            DFU_STATE_APP_DETACH => DfuState::AppDetach,
            DFU_STATE_DFU_IDLE => DfuState::DfuIdle,
            DFU_STATE_DNLOAD_SYNC => DfuState::DnloadSync,
            DFU_STATE_DNLOAD_BUSY => DfuState::DnloadBusy,
            DFU_STATE_DNLOAD_IDLE => DfuState::DnloadIdle,
            DFU_STATE_MANIFEST_SYNC => DfuState::ManifestSync,
            DFU_STATE_MANIFEST => DfuState::Manifest,
            DFU_STATE_MANIFEST_WAIT_RESET => DfuState::ManifestWaitReset,
            DFU_STATE_UPLOAD_IDLE => DfuState::UploadIdle,
            DFU_STATE_ERROR => DfuState::Error,
            other => DfuState::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            DfuState::AppIdle => DFU_STATE_APP_IDLE,
            DfuState::AppDetach => DFU_STATE_APP_DETACH,
            DfuState::DfuIdle => DFU_STATE_DFU_IDLE,
            DfuState::DnloadSync => DFU_STATE_DNLOAD_SYNC,
            DfuState::DnloadBusy => DFU_STATE_DNLOAD_BUSY,
            DfuState::DnloadIdle => DFU_STATE_DNLOAD_IDLE,
            DfuState::ManifestSync => DFU_STATE_MANIFEST_SYNC,
            DfuState::Manifest => DFU_STATE_MANIFEST,
            DfuState::ManifestWaitReset => DFU_STATE_MANIFEST_WAIT_RESET,
            DfuState::UploadIdle => DFU_STATE_UPLOAD_IDLE,
            DfuState::Error => DFU_STATE_ERROR,
            DfuState::Unknown(v) => *v,
        }
    }

    /// The device is still working on the previous request and must be
    /// polled again before another DNLOAD/UPLOAD is issued.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            DfuState::DnloadSync | DfuState::DnloadBusy | DfuState::ManifestSync | DfuState::Manifest
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DfuState::Error)
    }
}

impl fmt::Display for DfuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfuState::AppIdle => write!(f, "appIDLE"),
            DfuState::AppDetach => write!(f, "appDETACH"),
            DfuState::DfuIdle => write!(f, "dfuIDLE"),
            DfuState::DnloadSync => write!(f, "dfuDNLOAD-SYNC"),
            DfuState::DnloadBusy => write!(f, "dfuDNBUSY"),
            DfuState::DnloadIdle => write!(f, "dfuDNLOAD-IDLE"),
            DfuState::ManifestSync => write!(f, "dfuMANIFEST-SYNC"),
            DfuState::Manifest => write!(f, "dfuMANIFEST"),
            DfuState::ManifestWaitReset => write!(f, "dfuMANIFEST-WAIT-RESET"),
            DfuState::UploadIdle => write!(f, "dfuUPLOAD-IDLE"),
            DfuState::Error => write!(f, "dfuERROR"),
            DfuState::Unknown(v) => write!(f, "unknown(0x{:02X})", v),
        }
    }
}

/// DFU status code (`bStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuStatusCode {
    Ok,
    ErrTarget,
    ErrFile,
    ErrWrite,
    ErrErase,
    ErrCheckErased,
    ErrProg,
    ErrVerify,
    ErrAddress,
    ErrNotDone,
    ErrFirmware,
    ErrVendor,
    ErrUsbReset,
    ErrPowerOnReset,
    ErrUnknown,
    ErrStalledPacket,
    Unknown(u8),
}

impl DfuStatusCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => DfuStatusCode::Ok,
            0x01 => DfuStatusCode::ErrTarget,
            0x02 => DfuStatusCode::ErrFile,
            0x03 => DfuStatusCode::ErrWrite,
            0x04 => DfuStatusCode::ErrErase,
            0x05 => DfuStatusCode::ErrCheckErased,
            0x06 => DfuStatusCode::ErrProg,
            0x07 => DfuStatusCode::ErrVerify,
            0x08 => DfuStatusCode::ErrAddress,
            0x09 => DfuStatusCode::ErrNotDone,
            0x0A => DfuStatusCode::ErrFirmware,
            0x0B => DfuStatusCode::ErrVendor,
            0x0C => DfuStatusCode::ErrUsbReset,
            0x0D => DfuStatusCode::ErrPowerOnReset,
            0x0E => DfuStatusCode::ErrUnknown,
            0x0F => DfuStatusCode::ErrStalledPacket,
            other => DfuStatusCode::Unknown(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, DfuStatusCode::Ok)
    }
}

impl fmt::Display for DfuStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DfuStatusCode::Ok => "OK",
            DfuStatusCode::ErrTarget => "errTARGET",
            DfuStatusCode::ErrFile => "errFILE",
            DfuStatusCode::ErrWrite => "errWRITE",
            DfuStatusCode::ErrErase => "errERASE",
            DfuStatusCode::ErrCheckErased => "errCHECK_ERASED",
            DfuStatusCode::ErrProg => "errPROG",
            DfuStatusCode::ErrVerify => "errVERIFY",
            DfuStatusCode::ErrAddress => "errADDRESS",
            DfuStatusCode::ErrNotDone => "errNOTDONE",
            DfuStatusCode::ErrFirmware => "errFIRMWARE",
            DfuStatusCode::ErrVendor => "errVENDOR",
            DfuStatusCode::ErrUsbReset => "errUSBR",
            DfuStatusCode::ErrPowerOnReset => "errPOR",
            DfuStatusCode::ErrUnknown => "errUNKNOWN",
            DfuStatusCode::ErrStalledPacket => "errSTALLEDPKT",
            DfuStatusCode::Unknown(v) => return write!(f, "unknown(0x{:02X})", v),
        };
        f.write_str(s)
    }
}

/// Decoded GETSTATUS record.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DfuStatus {
    /// Raw response, zero-padded to 6 bytes.
    raw: [u8; DFU_STATUS_LEN as usize],
}

impl DfuStatus {
    pub const SIZE: usize = DFU_STATUS_LEN as usize;

    /// Decode a status response. Short responses are zero-padded, extra
    /// bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; Self::SIZE];
        let n = bytes.len().min(Self::SIZE);
        raw[..n].copy_from_slice(&bytes[..n]);
        Self { raw }
    }

    /// Raw `bStatus`.
    pub fn status(&self) -> u8 {
        self.raw[0]
    }

    pub fn status_code(&self) -> DfuStatusCode {
        DfuStatusCode::from_u8(self.raw[0])
    }

    /// Minimum time in milliseconds before the next GETSTATUS.
    pub fn poll_timeout_ms(&self) -> u32 {
        le24(&self.raw[1..4])
    }

    /// Raw `bState`.
    pub fn state_raw(&self) -> u8 {
        self.raw[4]
    }

    pub fn state(&self) -> DfuState {
        DfuState::from_u8(self.raw[4])
    }

    /// Index of a vendor status description string.
    pub fn string_index(&self) -> u8 {
        self.raw[5]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Debug for DfuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DfuStatus")
            .field("status", &self.status_code())
            .field("poll_timeout_ms", &self.poll_timeout_ms())
            .field("state", &self.state())
            .field("string_index", &self.string_index())
            .finish()
    }
}

impl fmt::Display for DfuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status={} state={} poll_timeout={}ms",
            self.status_code(),
            self.state(),
            self.poll_timeout_ms()
        )
    }
}
