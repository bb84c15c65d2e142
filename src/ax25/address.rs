//! Station addresses: text form parsing and the 7-byte wire encoding.

use std::fmt;

use super::{SSID_H_MASK, SSID_LAST_MASK, SSID_RR_MASK, SSID_SSID_MASK, SSID_SSID_SHIFT};

/// How picky [`parse_addr`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Anything an Internet server might send: up to 11 letters or digits
    /// of either case, letters allowed in the SSID.
    Lenient,
    /// Proper AX.25: up to 6 upper case letters or digits, numeric SSID.
    Strict,
    /// Strict, and a trailing `*` is not allowed either.
    NoHeard,
}

impl Strictness {
    fn is_strict(self) -> bool {
        self != Strictness::Lenient
    }
}

/// A callsign with SSID and heard marker, as found in monitor text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub callsign: String,
    pub ssid: u8,
    /// Trailing `*` in text form
    pub heard: bool,
}

impl Address {
    pub fn new(callsign: impl Into<String>, ssid: u8) -> Self {
        Address { callsign: callsign.into(), ssid: ssid & 0x0f, heard: false }
    }

    /// Parses `CALL[-SSID]` in strict mode.
    pub fn parse(text: &str) -> Option<Self> {
        parse_addr(text, Strictness::Strict)
    }

    /// The 7-byte wire form. Only the first six callsign characters fit.
    /// `flags` supplies the H/C bit and last-address bit.
    pub(crate) fn encode(&self, flags: u8) -> [u8; 7] {
        let mut out = [b' ' << 1; 7];
        for (slot, ch) in out.iter_mut().zip(self.callsign.bytes().take(6)) {
            *slot = ch << 1;
        }
        out[6] = SSID_RR_MASK
            | ((self.ssid << SSID_SSID_SHIFT) & SSID_SSID_MASK)
            | (flags & (SSID_H_MASK | SSID_LAST_MASK));
        out
    }

    /// Decodes the 7-byte wire form. Trailing spaces are trimmed and the
    /// H bit becomes `heard`.
    pub(crate) fn decode(field: &[u8]) -> Self {
        let callsign: String = field[..6]
            .iter()
            .map(|&b| ((b >> 1) & 0x7f) as char)
            .collect::<String>()
            .trim_end_matches(' ')
            .to_string();
        Address {
            callsign,
            ssid: (field[6] & SSID_SSID_MASK) >> SSID_SSID_SHIFT,
            heard: field[6] & SSID_H_MASK != 0,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid != 0 {
            write!(f, "{}-{}", self.callsign, self.ssid)
        } else {
            write!(f, "{}", self.callsign)
        }
    }
}

/// Parses `CALL[-SSID][*]`.
///
/// Returns `None` for an empty string, a callsign that is too long or has
/// characters other than letters and digits, a bad SSID, or trailing junk.
pub fn parse_addr(text: &str, strictness: Strictness) -> Option<Address> {
    if text.is_empty() {
        return None;
    }
    let strict = strictness.is_strict();
    let maxlen = if strict { 6 } else { super::MAX_ADDR_LEN - 1 };
    let bytes = text.as_bytes();

    let mut i = 0;
    while i < bytes.len() && bytes[i] != b'-' && bytes[i] != b'*' {
        let ch = bytes[i];
        if i >= maxlen || !ch.is_ascii_alphanumeric() {
            return None;
        }
        if strict && ch.is_ascii_lowercase() {
            return None;
        }
        i += 1;
    }
    let callsign = text[..i].to_string();

    let mut ssid = 0u8;
    if i < bytes.len() && bytes[i] == b'-' {
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
            if i - start >= 2 {
                return None;
            }
            if strict && !bytes[i].is_ascii_digit() {
                return None;
            }
            i += 1;
        }
        // Leading digits only, so a lenient "1A" is 1 and "AB" is 0.
        let digits: String = text[start..i].chars().take_while(|c| c.is_ascii_digit()).collect();
        let value: u32 = digits.parse().unwrap_or(0);
        if value > 15 {
            return None;
        }
        ssid = value as u8;
    }

    let mut heard = false;
    if i < bytes.len() && bytes[i] == b'*' {
        if strictness == Strictness::NoHeard {
            return None;
        }
        heard = true;
        i += 1;
    }

    if i != bytes.len() {
        return None;
    }

    Some(Address { callsign, ssid, heard })
}
