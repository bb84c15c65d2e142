//! Monitor text form: `SRC>DST,VIA1,VIA2*:info`.

use crate::core::AudioLevel;

use super::address::{parse_addr, Strictness};
use super::packet::Packet;
use super::{DESTINATION, MAX_ADDRS, MAX_INFO_LEN, REPEATER_1, SOURCE};

impl Packet {
    /// Parses a monitor line into a UI frame with PID 0xF0.
    ///
    /// `strict` requires proper AX.25 callsigns. Lenient mode is for text
    /// from Internet servers; it also upper-cases a `qA?` construct in the
    /// path. `<0xHH>` in the information part becomes a single byte.
    pub fn from_text(monitor: &str, strict: bool) -> Option<Packet> {
        let strictness = if strict { Strictness::Strict } else { Strictness::Lenient };
        let mut p = Packet::blank_ui();

        let (addrs, info) = monitor.split_once(':')?;
        let (src, rest) = addrs.split_once('>')?;

        let a = parse_addr(src, strictness)?;
        p.set_addr(SOURCE, &a.callsign);
        p.set_h(SOURCE);
        p.set_ssid(SOURCE, a.ssid);

        let mut fields = rest.split(',');
        let dst = fields.next()?;
        let a = parse_addr(dst, strictness)?;
        p.set_addr(DESTINATION, &a.callsign);
        p.set_h(DESTINATION);
        p.set_ssid(DESTINATION, a.ssid);

        for field in fields {
            if p.num_addr() >= MAX_ADDRS {
                break;
            }
            let k = p.num_addr();
            let field = if !strict && field.starts_with("qA") {
                let mut s = String::with_capacity(field.len());
                s.push_str("QA");
                s.extend(field[2..].chars().take(1).map(|c| c.to_ascii_uppercase()));
                s.push_str(field.get(3..).unwrap_or(""));
                s
            } else {
                field.to_string()
            };
            let a = parse_addr(&field, strictness)?;
            p.set_addr(k, &a.callsign);
            p.set_ssid(k, a.ssid);
            if a.heard {
                for n in REPEATER_1..=k {
                    p.set_h(n);
                }
            }
        }

        p.set_info(&unescape_info(info));
        Some(p)
    }

    /// Address part in monitor form, `SRC>DST,V1,V2*:`. The `*` follows the
    /// last repeater that has repeated the frame.
    pub fn format_addrs(&self) -> String {
        if self.num_addr() == 0 {
            return String::new();
        }
        let mut out = format!(
            "{}>{}",
            self.get_addr_with_ssid(SOURCE),
            self.get_addr_with_ssid(DESTINATION)
        );
        let heard = self.heard();
        for n in REPEATER_1..self.num_addr() {
            out.push(',');
            out.push_str(&self.get_addr_with_ssid(n));
            if n == heard {
                out.push('*');
            }
        }
        out.push(':');
        out
    }

    /// Repeater list only, `V1,V2*`.
    pub fn format_via_path(&self) -> String {
        let heard = self.heard();
        (REPEATER_1..self.num_addr())
            .map(|n| {
                let mut s = self.get_addr_with_ssid(n);
                if n == heard {
                    s.push('*');
                }
                s
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whole frame in monitor form with unprintable bytes escaped.
    pub fn to_monitor_text(&self) -> String {
        let mut out = self.format_addrs();
        out.push_str(&safe_print(self.get_info(), false));
        out
    }
}

/// Converts `<0xHH>` sequences to bytes, up to the maximum info length.
fn unescape_info(info: &str) -> Vec<u8> {
    let bytes = info.as_bytes();
    let mut out = Vec::with_capacity(bytes.len().min(MAX_INFO_LEN));
    let mut i = 0;
    while i < bytes.len() && out.len() < MAX_INFO_LEN {
        let rest = &bytes[i..];
        if rest.len() >= 6
            && rest.starts_with(b"<0x")
            && rest[3].is_ascii_hexdigit()
            && rest[4].is_ascii_hexdigit()
            && rest[5] == b'>'
        {
            let hex = std::str::from_utf8(&rest[3..5]).unwrap_or("00");
            out.push(u8::from_str_radix(hex, 16).unwrap_or(0));
            i += 6;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Renders bytes for display, writing control characters, DEL, 0xFE, 0xFF
/// and a trailing space as `<0xHH>`. Other bytes pass through so UTF-8
/// survives unless `ascii_only` is set.
pub fn safe_print(data: &[u8], ascii_only: bool) -> String {
    let mut escaped = Vec::with_capacity(data.len());
    for (i, &ch) in data.iter().enumerate() {
        let last = i + 1 == data.len() || data[i + 1] == 0;
        if (ch == b' ' && last)
            || ch < b' '
            || ch == 0x7f
            || ch == 0xfe
            || ch == 0xff
            || (ascii_only && ch >= 0x80)
        {
            escaped.extend_from_slice(format!("<0x{:02x}>", ch).as_bytes());
        } else {
            escaped.push(ch);
        }
    }
    String::from_utf8_lossy(&escaped).into_owned()
}

/// Audio level for display: `r(m/s)` for AFSK, `r(+m/-s)` for baseband,
/// just `r` for PSK and DTMF. Empty when the level is not known.
pub fn alevel_to_text(alevel: AudioLevel) -> String {
    let AudioLevel { rec, mark, space } = alevel;
    if rec < 0 {
        String::new()
    } else if mark >= 0 && space < 0 {
        format!("{}({:+}/{:+})", rec, mark, space)
    } else if mark == space && matches!(mark, -1 | -2 | -99) {
        rec.to_string()
    } else {
        format!("{}({}/{})", rec, mark, space)
    }
}
