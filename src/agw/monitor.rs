//! Received frames in the forms AGW clients ask for.

use bytes::Bytes;
use chrono::{Local, NaiveTime};

use crate::ax25::{CmdRes, FrameType, Packet, DESTINATION, REPEATER_1, SOURCE};

use super::header::AgwMessage;

/// Raw delivery: a zero byte for the "TNC" then the frame.
pub fn raw_message(chan: usize, pp: &Packet) -> Bytes {
    let mut data = Vec::with_capacity(pp.frame_len() + 1);
    data.push(0);
    data.extend_from_slice(pp.frame_bytes());
    AgwMessage::new(chan as u8, b'K')
        .calls(&pp.get_addr_with_ssid(SOURCE), &pp.get_addr_with_ssid(DESTINATION))
        .data(data)
        .to_bytes()
}

/// Monitor delivery, stamped with the local time.
pub fn monitor_message(chan: usize, pp: &Packet, own_xmit: bool) -> Bytes {
    monitor_message_at(chan, pp, own_xmit, Local::now().time())
}

pub(crate) fn monitor_message_at(chan: usize, pp: &Packet, own_xmit: bool, time: NaiveTime) -> Bytes {
    let (kind, desc) = mon_desc(pp);
    let kind = if own_xmit { b'T' } else { kind };

    let mut data = mon_addrs(chan, pp).into_bytes();
    data.extend_from_slice(desc.as_bytes());
    data.extend_from_slice(time.format("[%H:%M:%S]\r").to_string().as_bytes());
    let info = pp.get_info();
    if !info.is_empty() {
        data.extend_from_slice(info);
        data.push(b'\r');
    }
    data.push(0);

    AgwMessage::new(chan as u8, kind)
        .calls(&pp.get_addr_with_ssid(SOURCE), &pp.get_addr_with_ssid(DESTINATION))
        .data(data)
        .to_bytes()
}

/// ` 1:Fm SRC To DST Via D1,D2 ` with the leading and trailing space.
pub fn mon_addrs(chan: usize, pp: &Packet) -> String {
    let src = pp.get_addr_with_ssid(SOURCE);
    let dst = pp.get_addr_with_ssid(DESTINATION);
    if pp.num_repeaters() == 0 {
        return format!(" {}:Fm {} To {} ", chan + 1, src, dst);
    }
    let via: Vec<String> = (REPEATER_1..pp.num_addr()).map(|n| pp.get_addr_with_ssid(n)).collect();
    format!(" {}:Fm {} To {} Via {} ", chan + 1, src, dst, via.join(","))
}

/// Frame description such as `<UI pid=F0 Len=12 PF=0 >` and the
/// datakind for it: `I`, `U` for UI, `S` for everything else.
pub fn mon_desc(pp: &Packet) -> (u8, String) {
    let ft = pp.frame_type();
    let pf_text = match ft.cr {
        CmdRes::Command => "P",
        CmdRes::Response => "F",
        _ => "PF",
    };
    let pf = ft.pf;
    let pid = pp.get_pid().unwrap_or(0);
    let len = pp.get_info().len();

    let (kind, desc) = match ft.kind {
        FrameType::I => (
            b'I',
            format!("<I S{} R{} pid={:02X} Len={} {}={} >", ft.ns, ft.nr, pid, len, pf_text, pf),
        ),
        FrameType::UUi => (b'U', format!("<UI pid={:02X} Len={} {}={} >", pid, len, pf_text, pf)),
        FrameType::SRr => (b'S', format!("<RR R{} {}={} >", ft.nr, pf_text, pf)),
        FrameType::SRnr => (b'S', format!("<RNR R{} {}={} >", ft.nr, pf_text, pf)),
        FrameType::SRej => (b'S', format!("<REJ R{} {}={} >", ft.nr, pf_text, pf)),
        FrameType::SSrej => (b'S', format!("<SREJ R{} {}={} Len={} >", ft.nr, pf_text, pf, len)),
        FrameType::UXid => (b'S', format!("<XID {}={} Len={} >", pf_text, pf, len)),
        FrameType::UTest => (b'S', format!("<TEST {}={} Len={} >", pf_text, pf, len)),
        FrameType::USabme
        | FrameType::USabm
        | FrameType::UDisc
        | FrameType::UDm
        | FrameType::UUa
        | FrameType::UFrmr => (b'S', format!("<{} {}={} >", ft.kind.name(), pf_text, pf)),
        FrameType::U | FrameType::NotAx25 => (b'S', "<U other??? >".to_string()),
    };
    (kind, desc)
}
