//! IL2P payload blocks.
//!
//! The payload is split into nearly equal blocks, large ones (one byte
//! bigger) first. Each block is scrambled and followed by its own parity.

use crate::fec::rs::il2p_codec;

use super::scramble::{descramble, scramble};
use super::MAX_PAYLOAD_SIZE;

/// Block layout for a payload of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadProperties {
    pub payload_byte_count: usize,
    pub payload_block_count: usize,
    pub small_block_size: usize,
    pub large_block_size: usize,
    pub large_block_count: usize,
    pub small_block_count: usize,
    pub parity_symbols_per_block: usize,
}

impl PayloadProperties {
    /// Layout for `payload_size` bytes. `None` when the size is over the
    /// limit. An empty payload has no blocks.
    pub fn compute(payload_size: usize, max_fec: bool) -> Option<Self> {
        if payload_size > MAX_PAYLOAD_SIZE {
            return None;
        }
        if payload_size == 0 {
            return Some(Self::default());
        }
        let per_block = if max_fec { 239 } else { 247 };
        let blocks = (payload_size + per_block - 1) / per_block;
        let small = payload_size / blocks;
        let large_count = payload_size - blocks * small;
        let parity = if max_fec {
            16
        } else {
            match small {
                0..=61 => 2,
                62..=123 => 4,
                124..=185 => 6,
                _ => 8,
            }
        };
        Some(Self {
            payload_byte_count: payload_size,
            payload_block_count: blocks,
            small_block_size: small,
            large_block_size: small + 1,
            large_block_count: large_count,
            small_block_count: blocks - large_count,
            parity_symbols_per_block: parity,
        })
    }

    /// Bytes on the air for the payload, parity included.
    pub fn encoded_len(&self) -> usize {
        self.small_block_count * (self.small_block_size + self.parity_symbols_per_block)
            + self.large_block_count * (self.large_block_size + self.parity_symbols_per_block)
    }

    /// Data block sizes in transmission order.
    fn block_sizes(&self) -> impl Iterator<Item = usize> {
        std::iter::repeat(self.large_block_size)
            .take(self.large_block_count)
            .chain(std::iter::repeat(self.small_block_size).take(self.small_block_count))
    }
}

/// Encodes a payload. An empty payload encodes to nothing.
pub fn encode_payload(payload: &[u8], max_fec: bool) -> Option<Vec<u8>> {
    let props = PayloadProperties::compute(payload.len(), max_fec)?;
    let rs = match props.payload_block_count {
        0 => return Some(Vec::new()),
        _ => il2p_codec(props.parity_symbols_per_block)?,
    };
    let mut out = Vec::with_capacity(props.encoded_len());
    let mut rest = payload;
    for size in props.block_sizes() {
        let (block, tail) = rest.split_at(size);
        rest = tail;
        let scrambled = scramble(block);
        out.extend_from_slice(&scrambled);
        out.extend(rs.encode_shortened(&scrambled)?);
    }
    Some(out)
}

/// Decodes `payload_size` bytes of payload from the received blocks.
/// Returns the payload and the number of symbols corrected. Fails if any
/// block is uncorrectable or the data runs short.
pub fn decode_payload(
    received: &[u8],
    payload_size: usize,
    max_fec: bool,
) -> Option<(Vec<u8>, usize)> {
    let props = PayloadProperties::compute(payload_size, max_fec)?;
    if props.payload_block_count == 0 {
        return Some((Vec::new(), 0));
    }
    let rs = il2p_codec(props.parity_symbols_per_block)?;
    let nparity = props.parity_symbols_per_block;
    if received.len() < props.encoded_len() {
        return None;
    }

    let mut out = Vec::with_capacity(payload_size);
    let mut corrected = 0;
    let mut pos = 0;
    for size in props.block_sizes() {
        let (data, fixed) = rs.decode_shortened(&received[pos..pos + size + nparity])?;
        corrected += fixed;
        out.extend(descramble(&data));
        pos += size + nparity;
    }
    (out.len() == payload_size).then_some((out, corrected))
}
