//! AX.25 frame codec
//!
//! Packing and unpacking of frames, frame type classification, address
//! manipulation and the monitor text form. Nothing in here logs: bad
//! input yields `None` and the caller decides what to say about it.

pub mod address;
pub mod builder;
pub mod crc;
pub mod frame_type;
pub mod packet;
pub mod text;

pub use self::address::{parse_addr, Address, Strictness};
pub use self::builder::{i_frame, s_frame, u_frame};
pub use self::crc::fcs_calc;
pub use self::frame_type::{CmdRes, FrameInfo, FrameType};
pub use self::packet::{Packet, PacketMeta};
pub use self::text::{alevel_to_text, safe_print};

pub const MIN_ADDRS: usize = 2;
pub const MAX_ADDRS: usize = 10;
pub const MAX_REPEATERS: usize = MAX_ADDRS - MIN_ADDRS;
pub const MAX_INFO_LEN: usize = 2048;
pub const MIN_PACKET_LEN: usize = 2 * 7 + 1;
pub const MAX_PACKET_LEN: usize = MAX_ADDRS * 7 + 2 + 3 + MAX_INFO_LEN;
/// Longest text address, e.g. an Internet server name, plus terminator.
pub const MAX_ADDR_LEN: usize = 12;

/// Address positions
pub const DESTINATION: usize = 0;
pub const SOURCE: usize = 1;
pub const REPEATER_1: usize = 2;

pub const UI_FRAME: u8 = 0x03;
pub const PID_NO_LAYER_3: u8 = 0xf0;
pub const PID_ESCAPE: u8 = 0xff;

pub(crate) const SSID_H_MASK: u8 = 0x80;
pub(crate) const SSID_RR_MASK: u8 = 0x60;
pub(crate) const SSID_RR_SHIFT: u8 = 5;
pub(crate) const SSID_SSID_MASK: u8 = 0x1e;
pub(crate) const SSID_SSID_SHIFT: u8 = 1;
pub(crate) const SSID_LAST_MASK: u8 = 0x01;

/// Sequence number modulus of a connected-mode frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Modulo {
    /// Not known outside the link layer; decoded as modulo 8
    #[default]
    Unknown,
    Mod8,
    Mod128,
}
