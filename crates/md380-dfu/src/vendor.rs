//! MD380 bootloader extensions.
//!
//! All vendor commands are DNLOAD payloads on block 0. The bootloader
//! treats byte 0 as an opcode: `0x21` and `0x41` take a little-endian
//! address, the `0x91` family takes a single command byte.

use crate::error::DfuError;
use crate::events::DfuObserver;
use crate::protocol::DfuStatus;
use crate::protocol::constants::*;
use crate::session::DfuSession;
use crate::transport::Connector;

/// A block-0 command understood by the MD380 bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCommand {
    /// Target address for the following block transfers.
    SetAddress(u32),
    /// Erase the flash block holding the address.
    EraseBlock(u32),
    /// Generic two-byte command.
    Raw(u8, u8),
}

impl VendorCommand {
    pub const REBOOT: Self = VendorCommand::Raw(VENDOR_CMD_FAMILY, VENDOR_CMD_REBOOT);
    pub const PROGRAM_MODE: Self = VendorCommand::Raw(VENDOR_CMD_FAMILY, VENDOR_CMD_PROGRAM_MODE);

    /// Encode the DNLOAD payload. A fresh buffer is built on every call.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            VendorCommand::SetAddress(addr) => address_payload(VENDOR_SET_ADDRESS, addr),
            VendorCommand::EraseBlock(addr) => address_payload(VENDOR_ERASE_BLOCK, addr),
            VendorCommand::Raw(a, b) => vec![a, b],
        }
    }
}

fn address_payload(opcode: u8, addr: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    buf.push(opcode);
    buf.extend_from_slice(&addr.to_le_bytes());
    buf
}

impl<C: Connector, O: DfuObserver> DfuSession<C, O> {
    /// Send a vendor command on block 0 and return the confirmed status.
    pub fn vendor_command(&mut self, cmd: VendorCommand) -> Result<DfuStatus, DfuError> {
        tracing::debug!(command = ?cmd, "Vendor command");
        self.download(COMMAND_BLOCK, &cmd.payload())
    }

    /// Set the address for subsequent block reads and writes.
    pub fn set_address(&mut self, addr: u32) -> Result<DfuStatus, DfuError> {
        self.vendor_command(VendorCommand::SetAddress(addr))
    }

    /// Erase the flash block at `addr`. Erase-before-write ordering is the
    /// caller's responsibility.
    pub fn erase_block(&mut self, addr: u32) -> Result<DfuStatus, DfuError> {
        self.vendor_command(VendorCommand::EraseBlock(addr))
    }

    pub fn md380_cmd(&mut self, a: u8, b: u8) -> Result<DfuStatus, DfuError> {
        self.vendor_command(VendorCommand::Raw(a, b))
    }

    /// Reboot the radio.
    pub fn reboot(&mut self) -> Result<DfuStatus, DfuError> {
        self.vendor_command(VendorCommand::REBOOT)
    }

    /// Halt all threads and show "Programming Mode" on the display.
    pub fn program_mode(&mut self) -> Result<DfuStatus, DfuError> {
        self.vendor_command(VendorCommand::PROGRAM_MODE)
    }

    /// Read the 32-byte command response from block 0.
    pub fn get_command(&mut self) -> Result<Vec<u8>, DfuError> {
        self.upload(COMMAND_BLOCK, COMMAND_RESPONSE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SessionConfig;
    use crate::events::NullObserver;
    use crate::protocol::le32_at;
    use crate::transport::{MockConnector, MockTransport};

    fn connected(mock: &MockTransport) -> DfuSession<MockConnector, NullObserver> {
        let mut session = DfuSession::with_observer(
            MockConnector::with_device(mock.clone()),
            SessionConfig::default(),
            Arc::new(NullObserver),
        );
        assert!(session.connect());
        session
    }

    #[test]
    fn test_set_address_payload() {
        for addr in [0, 1, 0x0800_0000, 0x0801_0000, 0xDEAD_BEEF, u32::MAX] {
            let payload = VendorCommand::SetAddress(addr).payload();
            assert_eq!(payload.len(), 5);
            assert_eq!(payload[0], 0x21);
            assert_eq!(le32_at(&payload, 1), Some(addr));
        }
        assert_eq!(
            VendorCommand::SetAddress(0x0801_0000).payload(),
            vec![0x21, 0x00, 0x00, 0x01, 0x08]
        );
    }

    #[test]
    fn test_erase_differs_only_in_opcode() {
        for addr in [0, 0x0801_0000, 0x1234_5678, u32::MAX] {
            let set = VendorCommand::SetAddress(addr).payload();
            let erase = VendorCommand::EraseBlock(addr).payload();
            assert_eq!(erase[0], 0x41);
            assert_eq!(erase[1..], set[1..]);
        }
    }

    #[test]
    fn test_md380_commands() {
        assert_eq!(VendorCommand::Raw(0x12, 0x34).payload(), vec![0x12, 0x34]);
        assert_eq!(VendorCommand::REBOOT.payload(), vec![0x91, 0x05]);
        assert_eq!(VendorCommand::PROGRAM_MODE.payload(), vec![0x91, 0x01]);
    }

    #[test]
    fn test_vendor_commands_go_to_block_zero() {
        let mock = MockTransport::new();
        let mut session = connected(&mock);

        session.set_address(0x0801_0000).unwrap();
        session.erase_block(0x0801_0000).unwrap();
        session.md380_cmd(0xAB, 0xCD).unwrap();
        session.program_mode().unwrap();
        session.reboot().unwrap();

        assert_eq!(
            mock.get_downloads(),
            vec![
                (0, vec![0x21, 0x00, 0x00, 0x01, 0x08]),
                (0, vec![0x41, 0x00, 0x00, 0x01, 0x08]),
                (0, vec![0xAB, 0xCD]),
                (0, vec![0x91, 0x01]),
                (0, vec![0x91, 0x05]),
            ]
        );
        // Each command is confirmed by two status polls
        assert_eq!(mock.get_transfers().len(), 15);
    }

    #[test]
    fn test_get_command_reads_32_bytes() {
        let mock = MockTransport::new();
        let mut session = connected(&mock);
        mock.queue_response(DFU_UPLOAD, &[0x55; 40]);

        let response = session.get_command().unwrap();
        assert_eq!(response, vec![0x55; 32]);

        let transfers = mock.get_transfers();
        assert_eq!(transfers[0].setup.request, DFU_UPLOAD);
        assert_eq!(transfers[0].setup.value, 0);
        assert_eq!(transfers[0].length, 32);
        assert_eq!(transfers[1].setup.request, DFU_GETSTATUS);
    }
}
