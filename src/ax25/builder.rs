//! Frame construction for the link layer.

use super::address::{parse_addr, Strictness};
use super::frame_type::{control_bytes, CmdRes, FrameType};
use super::packet::Packet;
use super::{
    Modulo, DESTINATION, MAX_ADDRS, MAX_INFO_LEN, MIN_ADDRS, PID_ESCAPE, PID_NO_LAYER_3, SOURCE,
    SSID_H_MASK, SSID_LAST_MASK,
};

/// Encodes the address field. The C bit goes on the destination for a
/// command and on the source for a response.
fn encode_addrs(addrs: &[&str], cr: CmdRes) -> Option<Vec<u8>> {
    if !(MIN_ADDRS..=MAX_ADDRS).contains(&addrs.len()) {
        return None;
    }
    if cr != CmdRes::Command && cr != CmdRes::Response {
        return None;
    }
    let mut frame = Vec::with_capacity(addrs.len() * 7 + 3);
    for (n, text) in addrs.iter().enumerate() {
        let a = parse_addr(text, Strictness::Strict)?;
        let mut flags = 0;
        if (n == DESTINATION && cr == CmdRes::Command) || (n == SOURCE && cr == CmdRes::Response) {
            flags |= SSID_H_MASK;
        }
        if n == addrs.len() - 1 {
            flags |= SSID_LAST_MASK;
        }
        frame.extend_from_slice(&a.encode(flags));
    }
    Some(frame)
}

fn normalize_pid(pid: u8) -> u8 {
    if pid == 0 || pid == PID_ESCAPE {
        PID_NO_LAYER_3
    } else {
        pid
    }
}

fn append_info(frame: &mut Vec<u8>, info: &[u8]) {
    frame.extend_from_slice(&info[..info.len().min(MAX_INFO_LEN)]);
}

/// Builds an unnumbered frame. Information is kept only for the types
/// that carry it: FRMR, UI, XID and TEST. UI frames also get a PID.
pub fn u_frame(
    addrs: &[&str],
    cr: CmdRes,
    kind: FrameType,
    pf: u8,
    pid: u8,
    info: &[u8],
) -> Option<Packet> {
    let mut frame = encode_addrs(addrs, cr)?;
    let ctrl = kind.u_control()?;
    frame.push(ctrl | ((pf & 1) << 4));
    if kind == FrameType::UUi {
        frame.push(normalize_pid(pid));
    }
    if matches!(kind, FrameType::UFrmr | FrameType::UUi | FrameType::UXid | FrameType::UTest) {
        append_info(&mut frame, info);
    }
    Some(Packet::from_parts(frame, Modulo::Unknown))
}

/// Builds a supervisory frame. Only SREJ carries information.
pub fn s_frame(
    addrs: &[&str],
    cr: CmdRes,
    kind: FrameType,
    modulo: Modulo,
    nr: u8,
    pf: u8,
    info: &[u8],
) -> Option<Packet> {
    if !kind.is_supervisory() {
        return None;
    }
    let modulo = if modulo == Modulo::Mod128 { Modulo::Mod128 } else { Modulo::Mod8 };
    let mut frame = encode_addrs(addrs, cr)?;
    frame.extend(control_bytes(kind, modulo, pf, nr, 0)?);
    if kind == FrameType::SSrej {
        append_info(&mut frame, info);
    }
    Some(Packet::from_parts(frame, modulo))
}

/// Builds an information frame.
#[allow(clippy::too_many_arguments)]
pub fn i_frame(
    addrs: &[&str],
    cr: CmdRes,
    modulo: Modulo,
    nr: u8,
    ns: u8,
    pf: u8,
    pid: u8,
    info: &[u8],
) -> Option<Packet> {
    let modulo = if modulo == Modulo::Mod128 { Modulo::Mod128 } else { Modulo::Mod8 };
    let mut frame = encode_addrs(addrs, cr)?;
    frame.extend(control_bytes(FrameType::I, modulo, pf, nr, ns)?);
    frame.push(normalize_pid(pid));
    append_info(&mut frame, info);
    Some(Packet::from_parts(frame, modulo))
}
