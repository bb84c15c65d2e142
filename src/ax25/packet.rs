//! The owned AX.25 packet.

use std::time::Instant;

use crate::core::{AudioLevel, FecType};

use super::address::{parse_addr, Address, Strictness};
use super::crc::fcs_calc;
use super::{
    Modulo, DESTINATION, MAX_ADDRS, MAX_INFO_LEN, MAX_PACKET_LEN, MIN_ADDRS, MIN_PACKET_LEN,
    PID_ESCAPE, PID_NO_LAYER_3, REPEATER_1, SOURCE, SSID_H_MASK, SSID_LAST_MASK, SSID_RR_MASK,
    SSID_RR_SHIFT, SSID_SSID_MASK, SSID_SSID_SHIFT, UI_FRAME,
};

/// Out of band information that travels with a packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PacketMeta {
    /// Radio channel the frame was received on
    pub chan: Option<usize>,
    /// Demodulator index within the channel
    pub subchan: usize,
    /// Slicer index within the demodulator
    pub slice: usize,
    pub alevel: AudioLevel,
    pub fec_type: FecType,
    /// Earliest transmit time for delayed frames
    pub release_time: Option<Instant>,
}

/// An AX.25 frame, without the FCS.
///
/// Addresses are kept in wire form; the accessors translate. A frame whose
/// address field is malformed is still held, with `num_addr() == 0`, so it
/// can be shown in raw form.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    frame: Vec<u8>,
    num_addr: usize,
    modulo: Modulo,
    pub meta: PacketMeta,
}

/// Counts addresses by finding the first last-address bit. Zero if the
/// address field is not 2 to 10 whole addresses.
fn count_addresses(frame: &[u8]) -> usize {
    match frame.iter().position(|&b| b & SSID_LAST_MASK != 0) {
        Some(a) => {
            let addr_bytes = a + 1;
            let addrs = addr_bytes / 7;
            if addr_bytes % 7 == 0 && (MIN_ADDRS..=MAX_ADDRS).contains(&addrs) {
                addrs
            } else {
                0
            }
        }
        None => 0,
    }
}

impl Packet {
    /// Wraps a received frame. Length excludes the FCS.
    pub fn from_bytes(buf: &[u8], alevel: AudioLevel) -> Option<Packet> {
        if buf.len() < MIN_PACKET_LEN || buf.len() > MAX_PACKET_LEN {
            return None;
        }
        Some(Packet {
            frame: buf.to_vec(),
            num_addr: count_addresses(buf),
            modulo: Modulo::Unknown,
            meta: PacketMeta { alevel, ..Default::default() },
        })
    }

    /// Assembles a packet from parts already in wire form.
    pub(crate) fn from_parts(frame: Vec<u8>, modulo: Modulo) -> Packet {
        let num_addr = count_addresses(&frame);
        Packet { frame, num_addr, modulo, meta: PacketMeta::default() }
    }

    /// Blank UI frame with an empty destination and source, used as the
    /// starting point for text parsing.
    pub(crate) fn blank_ui() -> Packet {
        let mut frame = Vec::with_capacity(64);
        frame.extend_from_slice(&[b' ' << 1; 6]);
        frame.push(SSID_H_MASK | SSID_RR_MASK);
        frame.extend_from_slice(&[b' ' << 1; 6]);
        frame.push(SSID_RR_MASK | SSID_LAST_MASK);
        frame.push(UI_FRAME);
        frame.push(PID_NO_LAYER_3);
        Packet::from_parts(frame, Modulo::Unknown)
    }

    /// Copy of this packet with fresh metadata.
    pub fn dup(&self) -> Packet {
        Packet {
            frame: self.frame.clone(),
            num_addr: self.num_addr,
            modulo: self.modulo,
            meta: PacketMeta::default(),
        }
    }

    /// Empty frame that asks the transmitter to seize the channel.
    pub fn null() -> Packet {
        Packet::from_parts(Vec::new(), Modulo::Unknown)
    }

    pub fn frame_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    /// Frame followed by its FCS, low byte first.
    pub fn frame_with_fcs(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame.len() + 2);
        out.extend_from_slice(&self.frame);
        out.extend_from_slice(&fcs_calc(&self.frame).to_le_bytes());
        out
    }

    pub fn is_null_frame(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn modulo(&self) -> Modulo {
        self.modulo
    }

    /// Set by the link layer once it knows which sequence numbering the
    /// connection uses. Affects control field length of I and S frames.
    pub fn set_modulo(&mut self, modulo: Modulo) {
        self.modulo = modulo;
    }

    // ---- addresses ----

    pub fn num_addr(&self) -> usize {
        self.num_addr
    }

    pub fn num_repeaters(&self) -> usize {
        self.num_addr.saturating_sub(2)
    }

    fn ssid_byte(&self, n: usize) -> Option<u8> {
        if n < self.num_addr {
            Some(self.frame[n * 7 + 6])
        } else {
            None
        }
    }

    /// Callsign and SSID as text, e.g. `W1AW-5`. SSID 0 is omitted.
    /// Out of range positions give `??????`.
    pub fn get_addr_with_ssid(&self, n: usize) -> String {
        match self.address(n) {
            Some(a) => a.to_string(),
            None => "??????".to_string(),
        }
    }

    /// Callsign only, trailing spaces trimmed.
    pub fn get_addr_no_ssid(&self, n: usize) -> String {
        match self.address(n) {
            Some(a) => a.callsign,
            None => "??????".to_string(),
        }
    }

    /// Decoded address at a position. `heard` reflects the H bit, which in
    /// the destination and source positions is a command/response bit.
    pub fn address(&self, n: usize) -> Option<Address> {
        if n < self.num_addr {
            Some(Address::decode(&self.frame[n * 7..n * 7 + 7]))
        } else {
            None
        }
    }

    /// All addresses in order: destination, source, repeaters.
    pub fn addresses(&self) -> Vec<Address> {
        (0..self.num_addr).filter_map(|n| self.address(n)).collect()
    }

    pub fn get_ssid(&self, n: usize) -> u8 {
        self.ssid_byte(n).map_or(0, |b| (b & SSID_SSID_MASK) >> SSID_SSID_SHIFT)
    }

    pub fn set_ssid(&mut self, n: usize, ssid: u8) {
        if n < self.num_addr {
            let b = &mut self.frame[n * 7 + 6];
            *b = (*b & !SSID_SSID_MASK) | ((ssid << SSID_SSID_SHIFT) & SSID_SSID_MASK);
        }
    }

    /// H bit: "has been repeated" for repeaters, command/response for the
    /// destination and source.
    pub fn get_h(&self, n: usize) -> bool {
        self.ssid_byte(n).map_or(false, |b| b & SSID_H_MASK != 0)
    }

    pub fn set_h(&mut self, n: usize) {
        if n < self.num_addr {
            self.frame[n * 7 + 6] |= SSID_H_MASK;
        }
    }

    pub fn clear_h(&mut self, n: usize) {
        if n < self.num_addr {
            self.frame[n * 7 + 6] &= !SSID_H_MASK;
        }
    }

    /// The two reserved bits, normally 11.
    pub fn get_rr(&self, n: usize) -> u8 {
        self.ssid_byte(n).map_or(0, |b| (b & SSID_RR_MASK) >> SSID_RR_SHIFT)
    }

    /// Position of the last repeater with H set, or the source if no
    /// repeater has been used.
    pub fn heard(&self) -> usize {
        (REPEATER_1..self.num_addr)
            .rev()
            .find(|&n| self.get_h(n))
            .unwrap_or(SOURCE)
    }

    /// First repeater that has not yet repeated the frame.
    pub fn get_first_not_repeated(&self) -> Option<usize> {
        (REPEATER_1..self.num_addr).find(|&n| !self.get_h(n))
    }

    fn write_callsign(&mut self, n: usize, callsign: &str) {
        let field = &mut self.frame[n * 7..n * 7 + 6];
        field.fill(b' ' << 1);
        for (slot, ch) in field.iter_mut().zip(callsign.bytes().take(6)) {
            *slot = ch << 1;
        }
    }

    /// Replaces the address at `n`, or appends one when `n == num_addr()`.
    /// The text is parsed leniently and the H bit is left alone.
    pub fn set_addr(&mut self, n: usize, text: &str) {
        if n < self.num_addr {
            let a = parse_addr(text, Strictness::Lenient)
                .unwrap_or_else(|| Address::new(String::new(), 0));
            self.write_callsign(n, &a.callsign);
            self.set_ssid(n, a.ssid);
        } else if n == self.num_addr {
            self.insert_addr(n, text);
        }
    }

    /// Inserts an address at `n`, shifting the rest along. Nothing happens
    /// when the frame already has the maximum number of addresses.
    pub fn insert_addr(&mut self, n: usize, text: &str) {
        if self.num_addr >= MAX_ADDRS || n > self.num_addr || self.num_addr == 0 {
            return;
        }
        let last = (self.num_addr - 1) * 7 + 6;
        self.frame[last] &= !SSID_LAST_MASK;

        let mut field = [b' ' << 1; 7];
        field[6] = SSID_RR_MASK;
        self.frame.splice(n * 7..n * 7, field);
        self.num_addr += 1;

        let last = (self.num_addr - 1) * 7 + 6;
        self.frame[last] |= SSID_LAST_MASK;

        let a = parse_addr(text, Strictness::Lenient)
            .unwrap_or_else(|| Address::new(String::new(), 0));
        self.write_callsign(n, &a.callsign);
        self.set_ssid(n, a.ssid);
    }

    /// Removes the address at `n`. The destination and source stay.
    pub fn remove_addr(&mut self, n: usize) {
        if n < REPEATER_1 || n >= self.num_addr {
            return;
        }
        let last = (self.num_addr - 1) * 7 + 6;
        self.frame[last] &= !SSID_LAST_MASK;
        self.frame.drain(n * 7..n * 7 + 7);
        self.num_addr -= 1;
        let last = (self.num_addr - 1) * 7 + 6;
        self.frame[last] |= SSID_LAST_MASK;
    }

    /// True if every address is a valid strict AX.25 callsign.
    pub fn check_addresses(&self) -> bool {
        self.num_addr > 0
            && (0..self.num_addr).all(|n| {
                parse_addr(&self.get_addr_with_ssid(n), Strictness::Strict).is_some()
            })
    }

    // ---- control, pid, info ----

    fn control_offset(&self) -> usize {
        self.num_addr * 7
    }

    pub(crate) fn num_control(&self) -> usize {
        match self.frame.get(self.control_offset()) {
            Some(&c) if c & 0x01 == 0 || c & 0x03 == 0x01 => {
                if self.modulo == Modulo::Mod128 {
                    2
                } else {
                    1
                }
            }
            Some(_) => 1,
            None => 0,
        }
    }

    fn pid_offset(&self) -> usize {
        self.control_offset() + self.num_control()
    }

    pub(crate) fn num_pid(&self) -> usize {
        let c = match self.frame.get(self.control_offset()) {
            Some(&c) => c,
            None => return 0,
        };
        if c & 0x01 == 0 || c == 0x03 || c == 0x13 {
            match self.frame.get(self.pid_offset()) {
                Some(&PID_ESCAPE) => 2,
                Some(_) => 1,
                None => 0,
            }
        } else {
            0
        }
    }

    /// Offset of the information part within the frame.
    pub fn info_offset(&self) -> usize {
        (self.control_offset() + self.num_control() + self.num_pid()).min(self.frame.len())
    }

    /// First control byte.
    pub fn get_control(&self) -> Option<u8> {
        if self.num_addr >= MIN_ADDRS {
            self.frame.get(self.control_offset()).copied()
        } else {
            None
        }
    }

    /// Byte following the first control byte, present for modulo 128.
    pub fn get_c2(&self) -> Option<u8> {
        if self.num_addr >= MIN_ADDRS {
            self.frame.get(self.control_offset() + 1).copied()
        } else {
            None
        }
    }

    pub fn get_pid(&self) -> Option<u8> {
        if self.num_addr >= MIN_ADDRS && self.num_pid() > 0 {
            self.frame.get(self.pid_offset()).copied()
        } else {
            None
        }
    }

    /// Sets the protocol id of an I or UI frame. Frames without a PID
    /// field are left unchanged.
    pub fn set_pid(&mut self, pid: u8) {
        if self.num_addr >= MIN_ADDRS && self.num_pid() > 0 {
            let off = self.pid_offset();
            self.frame[off] = pid;
        }
    }

    /// Information part. For a frame with a bad address field this is
    /// the whole frame.
    pub fn get_info(&self) -> &[u8] {
        if self.num_addr < MIN_ADDRS {
            return &self.frame;
        }
        &self.frame[self.info_offset()..]
    }

    /// Replaces the information part, truncated to the maximum length.
    pub fn set_info(&mut self, info: &[u8]) {
        if self.num_addr < MIN_ADDRS {
            return;
        }
        let off = self.info_offset();
        let n = info.len().min(MAX_INFO_LEN);
        self.frame.truncate(off);
        self.frame.extend_from_slice(&info[..n]);
    }

    /// Truncates the information part at the first CR or LF.
    /// Returns the number of bytes removed.
    pub fn cut_at_crlf(&mut self) -> usize {
        let off = if self.num_addr < MIN_ADDRS { 0 } else { self.info_offset() };
        match self.frame[off..].iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(pos) => {
                let removed = self.frame.len() - (off + pos);
                self.frame.truncate(off + pos);
                removed
            }
            None => 0,
        }
    }

    /// APRS data type indicator, the first byte of the information part.
    pub fn get_dti(&self) -> Option<u8> {
        if self.num_addr >= MIN_ADDRS {
            self.get_info().first().copied()
        } else {
            None
        }
    }

    /// UI frame with no layer 3, as used by APRS.
    pub fn is_aprs(&self) -> bool {
        !self.frame.is_empty()
            && self.num_addr >= MIN_ADDRS
            && self.get_control() == Some(UI_FRAME)
            && self.get_pid() == Some(PID_NO_LAYER_3)
    }

    /// For a third party APRS packet (`}` data type) parses the embedded
    /// monitor line. This packet is unchanged.
    pub fn unwrap_third_party(&self) -> Option<Packet> {
        if self.get_dti() != Some(b'}') {
            return None;
        }
        let info = &self.get_info()[1..];
        Packet::from_text(&String::from_utf8_lossy(info), true)
    }

    // ---- checksums ----

    /// Identifies a frame for duplicate suppression regardless of the path
    /// it took: covers source, destination and the information part with
    /// trailing CR, LF and spaces removed.
    pub fn dedupe_crc(&self) -> u16 {
        let src = self.get_addr_with_ssid(SOURCE);
        let dst = self.get_addr_with_ssid(DESTINATION);
        let mut info = self.get_info();
        while let Some((&last, rest)) = info.split_last() {
            if last == b'\r' || last == b'\n' || last == b' ' {
                info = rest;
            } else {
                break;
            }
        }
        let mut crc = super::crc::crc16_update(src.as_bytes(), 0xffff);
        crc = super::crc::crc16_update(dst.as_bytes(), crc);
        crc = super::crc::crc16_update(info, crc);
        crc ^ 0xffff
    }

    /// Matches a frame against its own digipeated copy: the frame bytes
    /// with every repeater address left out.
    pub fn m_m_crc(&self) -> u16 {
        if self.num_addr < MIN_ADDRS {
            return fcs_calc(&self.frame);
        }
        let mut crc = super::crc::crc16_update(&self.frame[..REPEATER_1 * 7 - 1], 0xffff);
        // C bit and last-address bit of the source depend on the path.
        crc = super::crc::crc16_update(&[self.frame[13] & SSID_SSID_MASK], crc);
        crc = super::crc::crc16_update(&self.frame[self.control_offset()..], crc);
        crc ^ 0xffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(call: &str, ssid: u8, flags: u8) -> [u8; 7] {
        Address::new(call, ssid).encode(flags)
    }

    fn sample_frame() -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&addr("APRS", 0, SSID_H_MASK));
        f.extend_from_slice(&addr("W1AW", 1, 0));
        f.extend_from_slice(&addr("WIDE1", 1, SSID_H_MASK));
        f.extend_from_slice(&addr("WIDE2", 2, SSID_LAST_MASK));
        f.push(UI_FRAME);
        f.push(PID_NO_LAYER_3);
        f.extend_from_slice(b">hello\r\n");
        f
    }

    #[test]
    fn test_from_bytes_accessors() {
        let p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        assert_eq!(p.num_addr(), 4);
        assert_eq!(p.num_repeaters(), 2);
        assert_eq!(p.get_addr_with_ssid(DESTINATION), "APRS");
        assert_eq!(p.get_addr_with_ssid(SOURCE), "W1AW-1");
        assert_eq!(p.get_addr_no_ssid(2), "WIDE1");
        assert_eq!(p.get_ssid(3), 2);
        assert_eq!(p.get_rr(3), 3);
        assert_eq!(p.heard(), 2);
        assert_eq!(p.get_first_not_repeated(), Some(3));
        assert_eq!(p.get_control(), Some(UI_FRAME));
        assert_eq!(p.get_pid(), Some(PID_NO_LAYER_3));
        assert_eq!(p.get_info(), b">hello\r\n");
        assert_eq!(p.get_dti(), Some(b'>'));
        assert!(p.is_aprs());
        assert!(p.check_addresses());
        assert_eq!(p.get_addr_with_ssid(9), "??????");
    }

    #[test]
    fn test_length_limits() {
        assert!(Packet::from_bytes(&[0u8; MIN_PACKET_LEN - 1], AudioLevel::unknown()).is_none());
        assert!(Packet::from_bytes(&vec![0u8; MAX_PACKET_LEN + 1], AudioLevel::unknown()).is_none());
        // Structurally invalid but in range: kept with no addresses.
        let p = Packet::from_bytes(&[0u8; 20], AudioLevel::unknown()).unwrap();
        assert_eq!(p.num_addr(), 0);
        assert_eq!(p.get_info().len(), 20);
        assert_eq!(p.get_control(), None);
        assert!(!p.check_addresses());
    }

    #[test]
    fn test_minimum_frame() {
        let mut f = Vec::new();
        f.extend_from_slice(&addr("B", 0, SSID_H_MASK));
        f.extend_from_slice(&addr("A", 0, SSID_LAST_MASK));
        f.push(0x2f);
        let p = Packet::from_bytes(&f, AudioLevel::unknown()).unwrap();
        assert_eq!(p.num_addr(), 2);
        assert_eq!(p.get_pid(), None);
        assert!(p.get_info().is_empty());
        assert_eq!(p.get_first_not_repeated(), None);
        assert_eq!(p.heard(), SOURCE);
    }

    #[test]
    fn test_maximum_frame_roundtrip() {
        let mut f = Vec::new();
        for n in 0..MAX_ADDRS {
            let flags = if n == MAX_ADDRS - 1 { SSID_LAST_MASK } else { 0 };
            f.extend_from_slice(&addr(&format!("CALL{}", n), n as u8, flags));
        }
        f.extend_from_slice(&[0x00, 0x02]);
        f.extend_from_slice(&[PID_ESCAPE, 0xcc]);
        f.extend(std::iter::repeat(b'x').take(MAX_INFO_LEN));
        let mut p = Packet::from_bytes(&f, AudioLevel::unknown()).unwrap();
        p.set_modulo(Modulo::Mod128);
        assert_eq!(p.num_addr(), MAX_ADDRS);
        assert_eq!(p.num_control(), 2);
        assert_eq!(p.num_pid(), 2);
        assert_eq!(p.get_info().len(), MAX_INFO_LEN);

        let again = Packet::from_bytes(p.frame_bytes(), AudioLevel::unknown()).unwrap();
        assert_eq!(again.frame_bytes(), &f[..]);
        assert_eq!(again.addresses(), p.addresses());
    }

    #[test]
    fn test_ssid_and_h_bits() {
        let mut p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        let before = p.frame_bytes().to_vec();

        p.set_ssid(3, 15);
        assert_eq!(p.get_ssid(3), 15);
        p.set_ssid(3, 0);
        assert_eq!(p.get_addr_with_ssid(3), "WIDE2");
        p.set_ssid(3, 2);
        assert_eq!(p.frame_bytes(), &before[..]);

        p.set_h(3);
        assert!(p.get_h(3));
        assert_eq!(p.get_first_not_repeated(), None);
        p.clear_h(3);
        assert_eq!(p.frame_bytes(), &before[..]);
    }

    #[test]
    fn test_address_mutation() {
        let mut p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        p.set_addr(2, "N0CALL-7");
        assert_eq!(p.get_addr_with_ssid(2), "N0CALL-7");
        assert!(p.get_h(2));

        p.insert_addr(2, "RELAY");
        assert_eq!(p.num_addr(), 5);
        assert_eq!(p.get_addr_with_ssid(2), "RELAY");
        assert_eq!(p.get_addr_with_ssid(3), "N0CALL-7");
        assert_eq!(p.get_info(), b">hello\r\n");

        p.set_addr(5, "WIDE3-3");
        assert_eq!(p.num_addr(), 6);
        assert_eq!(p.get_addr_with_ssid(5), "WIDE3-3");

        p.remove_addr(2);
        assert_eq!(p.num_addr(), 5);
        assert_eq!(p.get_addr_with_ssid(2), "N0CALL-7");

        let again = Packet::from_bytes(p.frame_bytes(), AudioLevel::unknown()).unwrap();
        assert_eq!(again.num_addr(), 5);
    }

    #[test]
    fn test_insert_at_max_is_ignored() {
        let mut p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        for _ in 0..10 {
            p.insert_addr(2, "X");
        }
        assert_eq!(p.num_addr(), MAX_ADDRS);
    }

    #[test]
    fn test_info_editing() {
        let mut p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        assert_eq!(p.cut_at_crlf(), 2);
        assert_eq!(p.get_info(), b">hello");
        assert_eq!(p.cut_at_crlf(), 0);

        p.set_info(&vec![b'a'; MAX_INFO_LEN + 10]);
        assert_eq!(p.get_info().len(), MAX_INFO_LEN);
        p.set_pid(0xcf);
        assert_eq!(p.get_pid(), Some(0xcf));
        assert!(!p.is_aprs());
    }

    #[test]
    fn test_dedupe_crc_ignores_path_and_trailing_space() {
        let a = Packet::from_text("W1AW>APRS,WIDE1-1,WIDE2-1:hello", true).unwrap();
        let b = Packet::from_text("W1AW>APRS,N0CALL*,WIDE2-1:hello \r\n", true).unwrap();
        let c = Packet::from_text("W1AW>APRS:hello!", true).unwrap();
        assert_eq!(a.dedupe_crc(), b.dedupe_crc());
        assert_ne!(a.dedupe_crc(), c.dedupe_crc());
    }

    #[test]
    fn test_m_m_crc_ignores_digipeaters() {
        let a = Packet::from_text("W1AW>APRS,WIDE1-1:hello", true).unwrap();
        let b = Packet::from_text("W1AW>APRS,N0CALL*,WIDE2-1:hello", true).unwrap();
        let c = Packet::from_text("W1AW>APRS:hello", true).unwrap();
        let d = Packet::from_text("W1AW>APRS:hello ", true).unwrap();
        assert_eq!(a.m_m_crc(), b.m_m_crc());
        assert_eq!(a.m_m_crc(), c.m_m_crc());
        assert_ne!(c.m_m_crc(), d.m_m_crc());
    }

    #[test]
    fn test_unwrap_third_party() {
        let p = Packet::from_text("W1AW>APRS,WIDE1-1:}N0CALL>APDW,TCPIP,W1AW*:>inner", false).unwrap();
        let inner = p.unwrap_third_party().unwrap();
        assert_eq!(inner.get_addr_with_ssid(SOURCE), "N0CALL");
        assert_eq!(inner.get_info(), b">inner");
        assert_eq!(p.get_dti(), Some(b'}'));

        let plain = Packet::from_text("W1AW>APRS:>x", true).unwrap();
        assert!(plain.unwrap_third_party().is_none());
    }

    #[test]
    fn test_frame_with_fcs() {
        let p = Packet::from_bytes(&sample_frame(), AudioLevel::unknown()).unwrap();
        let with = p.frame_with_fcs();
        assert_eq!(with.len(), p.frame_len() + 2);
        assert!(super::super::crc::check_fcs(&with));
    }
}
