//! Utility module
//!
//! Small helpers shared by the protocol modules.

pub mod logging;
pub mod net;

use std::sync::atomic::{AtomicBool, Ordering};

/// Formats bytes as a classic hex dump, 16 bytes per line with an ASCII
/// column. Used when debug logging frames.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);
    for (line, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("  {:03x}: ", line * 16));
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => out.push_str(&format!("{:02x} ", b)),
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        for &b in chunk {
            out.push(if (0x20..0x7f).contains(&b) { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}

/// Copies `s` into a fixed size, NUL padded field, truncating if needed.
/// The last byte is always NUL.
pub fn to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N.saturating_sub(1));
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Reads a NUL terminated string out of a fixed size field.
pub fn from_fixed(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// One flag per client or producer: bad input is reported at error level
/// the first time and at debug level after that.
#[derive(Debug, Default)]
pub struct LogOnce(AtomicBool);

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time only.
    pub fn first(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }
}
