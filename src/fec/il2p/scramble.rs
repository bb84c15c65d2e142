//! IL2P scrambler, a self-synchronizing LFSR with polynomial x^9 + x^4 + 1.
//!
//! Bits run most significant first. The transmit register delays its
//! output by five bits, so the first five outputs are dropped and five
//! more are flushed at the end to keep the block length.

const INIT_TX: u32 = 0x00f;
const INIT_RX: u32 = 0x1f0;

fn scramble_bit(input: bool, state: &mut u32) -> bool {
    let out = ((*state >> 4) ^ *state) & 1 != 0;
    *state = (((input as u32 ^ *state) & 1) << 9 | (*state ^ ((*state & 1) << 4))) >> 1;
    out
}

fn descramble_bit(input: bool, state: &mut u32) -> bool {
    let bit = input as u32;
    let out = (bit ^ *state) & 1 != 0;
    *state = ((*state >> 1) | (bit << 8)) ^ (bit << 3);
    out
}

struct BitSink<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl BitSink<'_> {
    fn push(&mut self, bit: bool) {
        if let Some(byte) = self.out.get_mut(self.pos / 8) {
            if bit {
                *byte |= 0x80 >> (self.pos % 8);
            }
        }
        self.pos += 1;
    }
}

/// Scrambles a block. The output has the same length as the input.
pub fn scramble(input: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; input.len()];
    let mut sink = BitSink { out: &mut out, pos: 0 };
    let mut state = INIT_TX;
    let mut skip = 5;

    for &byte in input {
        for i in (0..8).rev() {
            let s = scramble_bit(byte & (1 << i) != 0, &mut state);
            if skip > 0 {
                skip -= 1;
            } else {
                sink.push(s);
            }
        }
    }
    if !input.is_empty() {
        for _ in 0..5 {
            let s = scramble_bit(false, &mut state);
            sink.push(s);
        }
    }
    out
}

/// Reverses [`scramble`].
pub fn descramble(input: &[u8]) -> Vec<u8> {
    let mut state = INIT_RX;
    input
        .iter()
        .map(|&byte| {
            (0..8).rev().fold(0u8, |acc, i| {
                let d = descramble_bit(byte & (1 << i) != 0, &mut state);
                acc | ((d as u8) << i)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let blocks: [&[u8]; 4] = [b"A", b"hello, world", &[0u8; 64], &[0xffu8; 239]];
        for block in blocks {
            let s = scramble(block);
            assert_eq!(s.len(), block.len());
            assert_eq!(descramble(&s), block);
        }
    }

    #[test]
    fn test_scrambles() {
        let s = scramble(&[0u8; 16]);
        assert!(s.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_empty() {
        assert!(scramble(&[]).is_empty());
        assert!(descramble(&[]).is_empty());
    }
}
