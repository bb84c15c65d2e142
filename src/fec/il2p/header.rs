//! IL2P header: 13 bytes, then 2 RS parity bytes on the air.
//!
//! Type 1 packs a simple two-address modulo 8 frame into the header
//! itself: six-bit callsigns in the low bits of bytes 0..12, SSIDs in byte
//! 12, and flag fields spread over bits 6 and 7 of bytes 0..11. Type 0
//! only carries the flags and payload length; the whole AX.25 frame goes
//! in the payload.

use crate::ax25::{
    i_frame, s_frame, u_frame, CmdRes, FrameType, Modulo, Packet, DESTINATION, SOURCE,
};

use super::scramble::descramble;
use super::{HEADER_PARITY, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::fec::rs::il2p_codec;

pub type Header = [u8; HEADER_SIZE];

/// Writes `value` into bit `bit` of bytes `lsb - width + 1 ..= lsb`,
/// most significant bit first.
fn set_field(hdr: &mut Header, bit: u8, lsb: usize, width: usize, value: u32) {
    for k in 0..width {
        if value & (1 << k) != 0 {
            hdr[lsb - k] |= 1 << bit;
        }
    }
}

fn get_field(hdr: &Header, bit: u8, lsb: usize, width: usize) -> u32 {
    (lsb + 1 - width..=lsb).fold(0, |acc, i| (acc << 1) | ((hdr[i] >> bit) & 1) as u32)
}

fn set_ui(h: &mut Header, v: u32) {
    set_field(h, 6, 0, 1, v)
}
fn set_pid(h: &mut Header, v: u32) {
    set_field(h, 6, 4, 4, v)
}
fn set_control(h: &mut Header, v: u32) {
    set_field(h, 6, 11, 7, v)
}
fn set_fec_level(h: &mut Header, v: u32) {
    set_field(h, 7, 0, 1, v)
}
fn set_hdr_type(h: &mut Header, v: u32) {
    set_field(h, 7, 1, 1, v)
}
fn set_payload_byte_count(h: &mut Header, v: u32) {
    set_field(h, 7, 11, 10, v)
}

fn sixbit(a: u8) -> Option<u8> {
    (b' '..=b'_').contains(&a).then(|| a - b' ')
}

/// AX.25 PID to the four-bit IL2P code.
fn encode_pid(pid: u8) -> Option<u32> {
    Some(match pid {
        p if p & 0x30 == 0x20 || p & 0x30 == 0x10 => 0x2,
        0x01 => 0x3,
        0x06 => 0x4,
        0x07 => 0x5,
        0x08 => 0x6,
        0xcc => 0xb,
        0xcd => 0xc,
        0xce => 0xd,
        0xcf => 0xe,
        0xf0 => 0xf,
        _ => return None,
    })
}

fn decode_pid(code: u32) -> u8 {
    const AXPID: [u8; 16] = [
        0xf0, 0xf0, 0x20, 0x01, 0x06, 0x07, 0x08, 0xf0, 0xf0, 0xf0, 0xf0, 0xcc, 0xcd, 0xce,
        0xcf, 0xf0,
    ];
    AXPID[(code & 0xf) as usize]
}

const U_TYPES: [FrameType; 8] = [
    FrameType::USabm,
    FrameType::UDisc,
    FrameType::UDm,
    FrameType::UUa,
    FrameType::UFrmr,
    FrameType::UUi,
    FrameType::UXid,
    FrameType::UTest,
];

/// Header fields shared by both types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderAttributes {
    /// 0 or 1
    pub hdr_type: u8,
    pub max_fec: bool,
    pub payload_len: usize,
}

pub fn get_header_attributes(hdr: &Header) -> HeaderAttributes {
    HeaderAttributes {
        hdr_type: get_field(hdr, 7, 1, 1) as u8,
        max_fec: get_field(hdr, 7, 0, 1) == 1,
        payload_len: get_field(hdr, 7, 11, 10) as usize,
    }
}

/// Type 1 header for `pp`, or `None` if the frame does not qualify: more
/// than two addresses, modulo 128, callsign characters outside the six-bit
/// set, SABME or unknown types, an unmapped PID, or too much information.
pub fn type_1_header(pp: &Packet, max_fec: bool) -> Option<Header> {
    if pp.num_addr() != 2 || pp.modulo() == Modulo::Mod128 {
        return None;
    }
    let mut hdr = [0u8; HEADER_SIZE];
    for (offset, pos) in [(0, DESTINATION), (6, SOURCE)] {
        let call = pp.get_addr_no_ssid(pos);
        for (i, &a) in call.as_bytes().iter().take(6).enumerate() {
            hdr[offset + i] = sixbit(a)?;
        }
    }
    hdr[12] = (pp.get_ssid(DESTINATION) << 4) | pp.get_ssid(SOURCE);

    let info = pp.frame_type();
    let c = matches!(info.cr, CmdRes::Command | CmdRes::Cr11) as u32;
    let pf = info.pf as u32;
    let nr = info.nr as u32 & 7;
    let ns = info.ns as u32 & 7;

    if let Some(sub) = FrameType::S_TYPES.iter().position(|&t| t == info.kind) {
        set_control(&mut hdr, (pf << 6) | (nr << 3) | (c << 2) | sub as u32);
    } else if let Some(sub) = U_TYPES.iter().position(|&t| t == info.kind) {
        if info.kind == FrameType::UUi {
            set_ui(&mut hdr, 1);
            set_pid(&mut hdr, encode_pid(pp.get_pid()?)?);
        } else {
            set_pid(&mut hdr, 1);
        }
        set_control(&mut hdr, (pf << 6) | ((sub as u32) << 3) | (c << 2));
    } else if info.kind == FrameType::I {
        set_pid(&mut hdr, encode_pid(pp.get_pid()?)?);
        set_control(&mut hdr, (pf << 6) | (nr << 3) | ns);
    } else {
        return None;
    }

    let info_len = pp.get_info().len();
    if info_len > MAX_PAYLOAD_SIZE {
        return None;
    }
    set_fec_level(&mut hdr, max_fec as u32);
    set_hdr_type(&mut hdr, 1);
    set_payload_byte_count(&mut hdr, info_len as u32);
    Some(hdr)
}

/// Type 0 header: the payload is the whole frame.
pub fn type_0_header(pp: &Packet, max_fec: bool) -> Option<Header> {
    let frame_len = pp.frame_len();
    if !(14..=MAX_PAYLOAD_SIZE).contains(&frame_len) {
        return None;
    }
    let mut hdr = [0u8; HEADER_SIZE];
    set_fec_level(&mut hdr, max_fec as u32);
    set_hdr_type(&mut hdr, 0);
    set_payload_byte_count(&mut hdr, frame_len as u32);
    Some(hdr)
}

fn callsign_at(hdr: &Header, offset: usize) -> Option<String> {
    let call: String = hdr[offset..offset + 6]
        .iter()
        .map(|&s| ((s & 0x3f) + b' ') as char)
        .collect::<String>()
        .trim_end_matches(' ')
        .to_string();
    call.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .then_some(call)
}

/// Rebuilds the frame described by a type 1 header, without information.
pub fn decode_header_type_1(hdr: &Header) -> Option<Packet> {
    if get_field(hdr, 7, 1, 1) != 1 {
        return None;
    }
    let dst = format!("{}-{}", callsign_at(hdr, 0)?, hdr[12] >> 4);
    let src = format!("{}-{}", callsign_at(hdr, 6)?, hdr[12] & 0x0f);
    let addrs = [dst.as_str(), src.as_str()];

    let pid = get_field(hdr, 6, 4, 4);
    let control = get_field(hdr, 6, 11, 7);
    let pf = ((control >> 6) & 1) as u8;
    let nr = ((control >> 3) & 7) as u8;
    let cr = if control & 0x04 != 0 { CmdRes::Command } else { CmdRes::Response };

    match pid {
        0 => {
            let kind = FrameType::S_TYPES[(control & 3) as usize];
            s_frame(&addrs, cr, kind, Modulo::Mod8, nr, pf, &[])
        }
        1 => {
            let kind = U_TYPES[((control >> 3) & 7) as usize];
            u_frame(&addrs, cr, kind, pf, 0xf0, &[])
        }
        _ if get_field(hdr, 6, 0, 1) == 1 => {
            u_frame(&addrs, cr, FrameType::UUi, pf, decode_pid(pid), &[])
        }
        _ => {
            let ns = (control & 7) as u8;
            i_frame(&addrs, CmdRes::Command, Modulo::Mod8, nr, ns, pf, decode_pid(pid), &[])
        }
    }
}

/// Corrects and descrambles a received header with its parity. Returns the
/// header and the number of symbols corrected.
pub fn clarify_header(received: &[u8]) -> Option<(Header, usize)> {
    let rs = il2p_codec(HEADER_PARITY)?;
    let (corrected, fixed) = rs.decode_shortened(received.get(..HEADER_SIZE + HEADER_PARITY)?)?;
    let plain = descramble(&corrected);
    let mut hdr = [0u8; HEADER_SIZE];
    hdr.copy_from_slice(&plain);
    Some((hdr, fixed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let mut h = [0u8; HEADER_SIZE];
        set_payload_byte_count(&mut h, 1023);
        set_control(&mut h, 0x55);
        set_pid(&mut h, 0xa);
        set_ui(&mut h, 1);
        set_hdr_type(&mut h, 1);
        assert_eq!(get_field(&h, 7, 11, 10), 1023);
        assert_eq!(get_field(&h, 6, 11, 7), 0x55);
        assert_eq!(get_field(&h, 6, 4, 4), 0xa);
        let attrs = get_header_attributes(&h);
        assert_eq!(attrs, HeaderAttributes { hdr_type: 1, max_fec: false, payload_len: 1023 });
        // Low six bits stay free for callsigns.
        assert!(h.iter().all(|&b| b & 0x3f == 0));
    }

    #[test]
    fn test_pid_mapping() {
        for pid in [0x20, 0x01, 0x06, 0x07, 0x08, 0xcc, 0xcd, 0xce, 0xcf, 0xf0] {
            assert_eq!(decode_pid(encode_pid(pid).unwrap()), pid);
        }
        assert_eq!(encode_pid(0x10), Some(2));
        assert_eq!(encode_pid(0x42), None);
    }

    #[test]
    fn test_type_1_roundtrip_each_kind() {
        let addrs = ["W2UB-3", "WB2OSZ-15"];
        let frames = vec![
            u_frame(&addrs, CmdRes::Command, FrameType::UUi, 0, 0xcc, b"").unwrap(),
            u_frame(&addrs, CmdRes::Command, FrameType::USabm, 1, 0, b"").unwrap(),
            u_frame(&addrs, CmdRes::Response, FrameType::UUa, 1, 0, b"").unwrap(),
            u_frame(&addrs, CmdRes::Command, FrameType::UDisc, 0, 0, b"").unwrap(),
            s_frame(&addrs, CmdRes::Response, FrameType::SRnr, Modulo::Mod8, 5, 1, b"").unwrap(),
            s_frame(&addrs, CmdRes::Command, FrameType::SRej, Modulo::Mod8, 2, 0, b"").unwrap(),
            i_frame(&addrs, CmdRes::Command, Modulo::Mod8, 6, 3, 1, 0xf0, b"").unwrap(),
        ];
        for pp in frames {
            let hdr = type_1_header(&pp, true).unwrap();
            assert!(get_header_attributes(&hdr).max_fec);
            let back = decode_header_type_1(&hdr).unwrap();
            assert_eq!(back.frame_bytes(), pp.frame_bytes(), "{}", pp.frame_type().desc);
        }
    }

    #[test]
    fn test_type_1_not_eligible() {
        let three = u_frame(&["A", "B", "C"], CmdRes::Command, FrameType::UUi, 0, 0xf0, b"")
            .unwrap();
        assert!(type_1_header(&three, false).is_none());

        let sabme = u_frame(&["A", "B"], CmdRes::Command, FrameType::USabme, 1, 0, b"").unwrap();
        assert!(type_1_header(&sabme, false).is_none());

        let i128 = i_frame(&["A", "B"], CmdRes::Command, Modulo::Mod128, 1, 2, 0, 0xf0, b"")
            .unwrap();
        assert!(type_1_header(&i128, false).is_none());

        let odd_pid = u_frame(&["A", "B"], CmdRes::Command, FrameType::UUi, 0, 0x42, b"").unwrap();
        assert!(type_1_header(&odd_pid, false).is_none());
        assert!(type_0_header(&odd_pid, false).is_some());
    }
}
