//! HDLC bit stuffing inside a fixed-size FEC data area.
//!
//! Bits are packed least significant first, the order they go out on the
//! air. The area starts with a flag, and after the closing flag the rest
//! is filled with a continuous run of flag bits.

const FLAG: u8 = 0x7e;

struct BitWriter {
    out: Vec<u8>,
    olen: usize,
}

impl BitWriter {
    fn put(&mut self, bit: bool) -> Option<()> {
        if self.olen >= self.out.len() * 8 {
            return None;
        }
        if bit {
            self.out[self.olen >> 3] |= 1 << (self.olen & 7);
        }
        self.olen += 1;
        Some(())
    }
}

/// Bit-stuffs `frame` (FCS included) into an area of `size` bytes.
///
/// Returns the filled area and the number of bytes up to and including
/// the one holding the last bit of the closing flag. `None` if the frame
/// does not fit.
pub fn stuff(frame: &[u8], size: usize) -> Option<(Vec<u8>, usize)> {
    if size == 0 {
        return None;
    }
    let mut w = BitWriter { out: vec![0u8; size], olen: 8 };
    w.out[0] = FLAG;

    let mut ones = 0;
    for &byte in frame {
        for i in 0..8 {
            let bit = byte & (1 << i) != 0;
            w.put(bit)?;
            if bit {
                ones += 1;
                if ones == 5 {
                    w.put(false)?;
                    ones = 0;
                }
            } else {
                ones = 0;
            }
        }
    }
    for i in 0..8 {
        w.put(FLAG & (1 << i) != 0)?;
    }
    let used = (w.olen + 7) / 8;

    let mut mask: u8 = 1;
    while w.olen < size * 8 {
        w.put(FLAG & mask != 0)?;
        mask = mask.rotate_left(1);
    }
    Some((w.out, used))
}

/// Removes stuffing and the surrounding flags.
///
/// The area must begin with a flag; more flags may follow. Fails on seven
/// ones in a row, on a result that is not a whole number of bytes, or when
/// no closing flag is found.
pub fn unstuff(area: &[u8]) -> Option<Vec<u8>> {
    if area.first() != Some(&FLAG) {
        return None;
    }
    let start = area.iter().position(|&b| b != FLAG)?;

    let mut pat: u8 = 0;
    let mut acc: u8 = 0;
    let mut bits = 0;
    let mut out = Vec::with_capacity(area.len());

    for &byte in &area[start..] {
        for i in 0..8 {
            let bit = byte & (1 << i) != 0;
            pat = (pat >> 1) | if bit { 0x80 } else { 0 };
            if pat == 0xfe {
                return None;
            }
            if bit {
                acc = (acc >> 1) | 0x80;
            } else {
                if pat == FLAG {
                    return if bits == 7 { Some(out) } else { None };
                }
                if pat >> 2 == 0x1f {
                    continue;
                }
                acc >>= 1;
            }
            bits += 1;
            if bits == 8 {
                bits = 0;
                out.push(acc);
            }
        }
    }
    None
}
