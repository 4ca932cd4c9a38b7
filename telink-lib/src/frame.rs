//! Telink mesh frame layout.
//!
//! Outbound frames are always 20 bytes, multi-byte fields little-endian:
//!
//! | offset | size | field |
//! |-------:|-----:|-------|
//! | 0      | 2    | packet counter |
//! | 2      | 3    | zero; MAC bytes land in 3..5 during encryption |
//! | 5      | 2    | mesh id |
//! | 7      | 1    | command code |
//! | 8      | 2    | vendor code |
//! | 10     | 10   | payload, right-zero-padded |

use crate::command::Command;

pub const FRAME_LEN: usize = 20;
pub const MAX_PAYLOAD: usize = 10;

/// Mesh id addressing the connected node only.
pub const MESH_ID_CONNECTED: u16 = 0x0000;
/// First mesh id of the group range (0x8000..=0x80FF).
pub const MESH_ID_GROUP_BASE: u16 = 0x8000;
/// Broadcast mesh id. The codec encodes it, but no operation here emits it.
pub const MESH_ID_BROADCAST: u16 = 0xFFFF;

/// Assembles a plaintext command frame. The caller encrypts it afterwards.
///
/// Payloads longer than [`MAX_PAYLOAD`] are a programmer error.
pub fn build(counter: u16, mesh_id: u16, command: Command, vendor: u16, payload: &[u8]) -> [u8; FRAME_LEN] {
    debug_assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds {MAX_PAYLOAD} bytes");
    let mut frame = [0u8; FRAME_LEN];
    frame[0..2].copy_from_slice(&counter.to_le_bytes());
    frame[5..7].copy_from_slice(&mesh_id.to_le_bytes());
    frame[7] = command.into();
    frame[8..10].copy_from_slice(&vendor.to_le_bytes());
    let n = payload.len().min(MAX_PAYLOAD);
    frame[10..10 + n].copy_from_slice(&payload[..n]);
    frame
}

/// Vendor code carried in bytes 8..10 of a decrypted inbound frame.
pub fn vendor_matches(frame: &[u8], vendor: u16) -> bool {
    frame.len() >= 10 && frame[8] == (vendor & 0xFF) as u8 && frame[9] == (vendor >> 8) as u8
}

/// Command code of a decrypted inbound frame.
pub fn command(frame: &[u8]) -> Command {
    Command::from(frame[7])
}

/// Mesh id a decrypted inbound frame is addressed to.
///
/// Online-status reports carry it in the first payload byte; everything else
/// echoes it in byte 3.
pub fn received_id(frame: &[u8]) -> u16 {
    if command(frame) == Command::OnlineStatusReport && frame.len() > 10 {
        frame[10] as u16
    } else {
        frame[3] as u16
    }
}
