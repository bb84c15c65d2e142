//! Frame classification from the control field.

use super::packet::Packet;
use super::{Modulo, DESTINATION, SOURCE};

/// Kind of AX.25 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    I,
    SRr,
    SRnr,
    SRej,
    SSrej,
    USabme,
    USabm,
    UDisc,
    UDm,
    UUa,
    UFrmr,
    UUi,
    UXid,
    UTest,
    /// Unnumbered frame not used by AX.25
    U,
    /// No control byte could be found
    NotAx25,
}

impl FrameType {
    /// Supervisory frame subtypes in control field order.
    pub const S_TYPES: [FrameType; 4] =
        [FrameType::SRr, FrameType::SRnr, FrameType::SRej, FrameType::SSrej];

    pub fn is_supervisory(self) -> bool {
        Self::S_TYPES.contains(&self)
    }

    pub fn is_unnumbered(self) -> bool {
        matches!(
            self,
            FrameType::USabme
                | FrameType::USabm
                | FrameType::UDisc
                | FrameType::UDm
                | FrameType::UUa
                | FrameType::UFrmr
                | FrameType::UUi
                | FrameType::UXid
                | FrameType::UTest
                | FrameType::U
        )
    }

    /// Control byte of an unnumbered frame with the P/F bit clear.
    pub fn u_control(self) -> Option<u8> {
        Some(match self {
            FrameType::USabme => 0x6f,
            FrameType::USabm => 0x2f,
            FrameType::UDisc => 0x43,
            FrameType::UDm => 0x0f,
            FrameType::UUa => 0x63,
            FrameType::UFrmr => 0x87,
            FrameType::UUi => 0x03,
            FrameType::UXid => 0xaf,
            FrameType::UTest => 0xe3,
            _ => return None,
        })
    }

    fn from_u_control(c: u8) -> FrameType {
        match c & 0xef {
            0x6f => FrameType::USabme,
            0x2f => FrameType::USabm,
            0x43 => FrameType::UDisc,
            0x0f => FrameType::UDm,
            0x63 => FrameType::UUa,
            0x87 => FrameType::UFrmr,
            0x03 => FrameType::UUi,
            0xaf => FrameType::UXid,
            0xe3 => FrameType::UTest,
            _ => FrameType::U,
        }
    }

    /// Short name as used in monitor output.
    pub fn name(self) -> &'static str {
        match self {
            FrameType::I => "I",
            FrameType::SRr => "RR",
            FrameType::SRnr => "RNR",
            FrameType::SRej => "REJ",
            FrameType::SSrej => "SREJ",
            FrameType::USabme => "SABME",
            FrameType::USabm => "SABM",
            FrameType::UDisc => "DISC",
            FrameType::UDm => "DM",
            FrameType::UUa => "UA",
            FrameType::UFrmr => "FRMR",
            FrameType::UUi => "UI",
            FrameType::UXid => "XID",
            FrameType::UTest => "TEST",
            FrameType::U => "U other???",
            FrameType::NotAx25 => "Not AX.25",
        }
    }
}

/// Command/response as carried by the C bits of destination and source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdRes {
    /// Destination C=0, source C=1
    Response,
    /// Destination C=1, source C=0
    Command,
    /// Both clear, old AX.25 version
    Cr00,
    /// Both set, old AX.25 version
    Cr11,
}

impl CmdRes {
    fn texts(self) -> (&'static str, &'static str) {
        match self {
            CmdRes::Cr11 => ("cc=11", "p/f"),
            CmdRes::Command => ("cmd", "p"),
            CmdRes::Response => ("res", "f"),
            CmdRes::Cr00 => ("cc=00", "p/f"),
        }
    }

    /// Label for the P/F bit: `p` for commands, `f` for responses.
    pub fn pf_text(self) -> &'static str {
        self.texts().1
    }
}

/// Result of classifying a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub kind: FrameType,
    pub cr: CmdRes,
    /// Human readable summary, e.g. `RR res, n(r)=3, f=1`
    pub desc: String,
    pub pf: u8,
    pub nr: u8,
    pub ns: u8,
}

/// Control field bytes for a frame of the given kind. `None` for kinds
/// that have no defined encoding.
pub fn control_bytes(kind: FrameType, modulo: Modulo, pf: u8, nr: u8, ns: u8) -> Option<Vec<u8>> {
    let pf = pf & 1;
    let mod128 = modulo == Modulo::Mod128;
    if kind == FrameType::I {
        return Some(if mod128 {
            vec![(ns & 0x7f) << 1, ((nr & 0x7f) << 1) | pf]
        } else {
            vec![((nr & 7) << 5) | (pf << 4) | ((ns & 7) << 1)]
        });
    }
    if let Some(sub) = FrameType::S_TYPES.iter().position(|&t| t == kind) {
        let c = 0x01 | ((sub as u8) << 2);
        return Some(if mod128 {
            vec![c, ((nr & 0x7f) << 1) | pf]
        } else {
            vec![c | (pf << 4) | ((nr & 7) << 5)]
        });
    }
    kind.u_control().map(|c| vec![c | (pf << 4)])
}

impl Packet {
    /// Command or response from the C bits.
    pub fn cmd_res(&self) -> CmdRes {
        match (self.get_h(DESTINATION), self.get_h(SOURCE)) {
            (true, true) => CmdRes::Cr11,
            (true, false) => CmdRes::Command,
            (false, true) => CmdRes::Response,
            (false, false) => CmdRes::Cr00,
        }
    }

    /// Classifies the frame.
    ///
    /// Sequence numbers of I and S frames are decoded according to
    /// [`Packet::modulo`]; an unknown modulo decodes as modulo 8.
    pub fn frame_type(&self) -> FrameInfo {
        let c = match self.get_control() {
            Some(c) => c,
            None => {
                return FrameInfo {
                    kind: FrameType::NotAx25,
                    cr: CmdRes::Cr11,
                    desc: FrameType::NotAx25.name().to_string(),
                    pf: 0,
                    nr: 0,
                    ns: 0,
                }
            }
        };
        let mod128 = self.modulo() == Modulo::Mod128;
        let c2 = if mod128 { self.get_c2().unwrap_or(0) } else { 0 };
        let cr = self.cmd_res();
        let (cr_text, pf_text) = cr.texts();

        if c & 0x01 == 0 {
            let (ns, pf, nr) = if mod128 {
                ((c >> 1) & 0x7f, c2 & 1, (c2 >> 1) & 0x7f)
            } else {
                ((c >> 1) & 7, (c >> 4) & 1, (c >> 5) & 7)
            };
            let desc = format!(
                "I {}, n(s)={}, n(r)={}, {}={}, pid=0x{:02x}",
                cr_text,
                ns,
                nr,
                pf_text,
                pf,
                self.get_pid().unwrap_or(0)
            );
            return FrameInfo { kind: FrameType::I, cr, desc, pf, nr, ns };
        }

        if c & 0x02 == 0 {
            let (pf, nr) = if mod128 {
                (c2 & 1, (c2 >> 1) & 0x7f)
            } else {
                ((c >> 4) & 1, (c >> 5) & 7)
            };
            let kind = FrameType::S_TYPES[((c >> 2) & 3) as usize];
            let desc = format!("{} {}, n(r)={}, {}={}", kind.name(), cr_text, nr, pf_text, pf);
            return FrameInfo { kind, cr, desc, pf, nr, ns: 0 };
        }

        let pf = (c >> 4) & 1;
        let kind = FrameType::from_u_control(c);
        let desc = if kind == FrameType::U {
            kind.name().to_string()
        } else {
            format!("{} {}, {}={}", kind.name(), cr_text, pf_text, pf)
        };
        FrameInfo { kind, cr, desc, pf, nr: 0, ns: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::Address;
    use crate::core::AudioLevel;

    fn frame_with_control(ctrl: &[u8], dst_c: bool, src_c: bool, modulo: Modulo) -> Packet {
        let mut f = Vec::new();
        f.extend_from_slice(&Address::new("B", 0).encode(if dst_c { 0x80 } else { 0 }));
        f.extend_from_slice(&Address::new("A", 0).encode(if src_c { 0x81 } else { 0x01 }));
        f.extend_from_slice(ctrl);
        f.push(0xf0);
        let mut p = Packet::from_bytes(&f, AudioLevel::unknown()).unwrap();
        p.set_modulo(modulo);
        p
    }

    #[test]
    fn test_i_frame_mod8() {
        let p = frame_with_control(&[0x5a], true, false, Modulo::Mod8);
        let info = p.frame_type();
        assert_eq!(info.kind, FrameType::I);
        assert_eq!(info.cr, CmdRes::Command);
        assert_eq!((info.ns, info.nr, info.pf), (5, 2, 1));
        assert_eq!(info.desc, "I cmd, n(s)=5, n(r)=2, p=1, pid=0xf0");
    }

    #[test]
    fn test_i_frame_mod128() {
        let p = frame_with_control(&[100 << 1, (77 << 1) | 1], true, false, Modulo::Mod128);
        let info = p.frame_type();
        assert_eq!((info.ns, info.nr, info.pf), (100, 77, 1));
    }

    #[test]
    fn test_unknown_modulo_uses_mod8() {
        let p = frame_with_control(&[0x01, 0x07], false, true, Modulo::Unknown);
        let info = p.frame_type();
        assert_eq!(info.kind, FrameType::SRr);
        assert_eq!(info.nr, 0);
        assert_eq!(info.desc, "RR res, n(r)=0, f=0");
    }

    #[test]
    fn test_s_and_u_frames() {
        let p = frame_with_control(&[0x09 | 0x10 | (3 << 5)], false, true, Modulo::Mod8);
        let info = p.frame_type();
        assert_eq!(info.kind, FrameType::SRej);
        assert_eq!((info.nr, info.pf), (3, 1));

        let p = frame_with_control(&[0x3f], true, true, Modulo::Unknown);
        let info = p.frame_type();
        assert_eq!(info.kind, FrameType::USabm);
        assert_eq!(info.desc, "SABM cc=11, p/f=1");

        let p = frame_with_control(&[0x03], false, false, Modulo::Unknown);
        assert_eq!(p.frame_type().kind, FrameType::UUi);
        assert_eq!(p.frame_type().cr, CmdRes::Cr00);

        let p = frame_with_control(&[0x27], true, false, Modulo::Unknown);
        assert_eq!(p.frame_type().kind, FrameType::U);
        assert_eq!(p.frame_type().desc, "U other???");
    }

    #[test]
    fn test_not_ax25() {
        let p = Packet::from_bytes(&[0u8; 20], AudioLevel::unknown()).unwrap();
        assert_eq!(p.frame_type().kind, FrameType::NotAx25);
    }

    #[test]
    fn test_control_roundtrip() {
        let kinds = [
            FrameType::I,
            FrameType::SRr,
            FrameType::SRnr,
            FrameType::SRej,
            FrameType::SSrej,
            FrameType::USabme,
            FrameType::USabm,
            FrameType::UDisc,
            FrameType::UDm,
            FrameType::UUa,
            FrameType::UFrmr,
            FrameType::UUi,
            FrameType::UXid,
            FrameType::UTest,
        ];
        for modulo in [Modulo::Mod8, Modulo::Mod128] {
            let max = if modulo == Modulo::Mod128 { 127 } else { 7 };
            for kind in kinds {
                for (nr, ns, pf) in [(0, 0, 0), (max, 1, 1), (3, max, 0)] {
                    let ctrl = control_bytes(kind, modulo, pf, nr, ns).unwrap();
                    let p = frame_with_control(&ctrl, true, false, modulo);
                    let info = p.frame_type();
                    assert_eq!(info.kind, kind);
                    let again = control_bytes(info.kind, modulo, info.pf, info.nr, info.ns).unwrap();
                    assert_eq!(again, ctrl, "{:?} {:?}", kind, modulo);
                }
            }
        }
    }
}
