//! Byte helpers used when decoding responses and logging traffic.

use byteorder::{ByteOrder, LittleEndian};

/// Widen a raw byte to its unsigned value.
pub fn u8_widen(b: u8) -> u32 {
    u32::from(b)
}

/// Decode a little-endian 32-bit word from `data[offset..offset + 4]`.
///
/// Returns `None` when the window runs past the end of `data`.
pub fn le32_at(data: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    data.get(offset..end).map(LittleEndian::read_u32)
}

/// Decode a little-endian 24-bit value from a 3-byte window.
pub(crate) fn le24(data: &[u8]) -> u32 {
    LittleEndian::read_u24(data)
}

/// Format bytes for diagnostics: 32 per line, with an extra gap after the
/// 17th byte of each line.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / 16);
    for (i, b) in data.iter().enumerate() {
        out.push_str(&format!("{:02x} ", b));
        if i % 32 == 16 {
            out.push(' ');
        }
        if i % 32 == 31 {
            out.push('\n');
        }
    }
    out
}
