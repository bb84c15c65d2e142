//! IL2P: Improved Layer 2 Protocol.
//!
//! A frame on the air is a preamble byte, a 24-bit sync word, the
//! scrambled header with 2 parity bytes, then the payload blocks. Bits go
//! out most significant first.

pub mod header;
pub mod payload;
pub mod scramble;

use crate::ax25::Packet;
use crate::core::{AudioLevel, FecType};
use crate::fec::rs::il2p_codec;

pub use self::header::{get_header_attributes, Header, HeaderAttributes};
pub use self::payload::PayloadProperties;

pub const PREAMBLE: u8 = 0x55;
pub const SYNC_WORD: u32 = 0xF15E48;
pub const SYNC_WORD_SIZE: usize = 3;
pub const HEADER_SIZE: usize = 13;
pub const HEADER_PARITY: usize = 2;
pub const MAX_PAYLOAD_SIZE: usize = 1023;
pub const MAX_PAYLOAD_BLOCKS: usize = 5;
pub const MAX_PARITY_SYMBOLS: usize = 16;
pub const MAX_ENCODED_PAYLOAD_SIZE: usize = MAX_PAYLOAD_SIZE + MAX_PAYLOAD_BLOCKS * MAX_PARITY_SYMBOLS;
pub const MAX_PACKET_SIZE: usize =
    SYNC_WORD_SIZE + HEADER_SIZE + HEADER_PARITY + MAX_ENCODED_PAYLOAD_SIZE;

fn protect_header(hdr: &Header, out: &mut Vec<u8>) -> Option<()> {
    let rs = il2p_codec(HEADER_PARITY)?;
    let scrambled = scramble::scramble(hdr);
    out.extend_from_slice(&scrambled);
    out.extend(rs.encode_shortened(&scrambled)?);
    Some(())
}

/// Encodes a frame, without sync word. Type 1 is used when the frame
/// qualifies, otherwise type 0. `None` if neither fits.
pub fn encode_frame(pp: &Packet, max_fec: bool) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_PACKET_SIZE);
    if let Some(hdr) = header::type_1_header(pp, max_fec) {
        protect_header(&hdr, &mut out)?;
        out.extend(payload::encode_payload(pp.get_info(), max_fec)?);
        return Some(out);
    }
    let hdr = header::type_0_header(pp, max_fec)?;
    protect_header(&hdr, &mut out)?;
    out.extend(payload::encode_payload(pp.frame_bytes(), max_fec)?);
    Some(out)
}

/// Bytes to transmit: preamble, sync word and the encoded frame, inverted
/// when `invert` is set.
pub fn send_frame(pp: &Packet, max_fec: bool, invert: bool) -> Option<Vec<u8>> {
    let mut out = vec![PREAMBLE];
    out.extend_from_slice(&SYNC_WORD.to_be_bytes()[1..]);
    out.extend(encode_frame(pp, max_fec)?);
    if invert {
        out.iter_mut().for_each(|b| *b = !*b);
    }
    Some(out)
}

/// Decodes a whole received frame that follows the sync word. Returns the
/// packet and the number of symbols corrected.
pub fn decode_frame(irec: &[u8]) -> Option<(Packet, usize)> {
    let (hdr, fixed) = header::clarify_header(irec)?;
    decode_header_payload(&hdr, irec.get(HEADER_SIZE + HEADER_PARITY..)?, fixed)
}

/// Second half of decoding for receivers that gather the header first:
/// `hdr` is already corrected and descrambled, `corrected` is the count
/// so far.
pub fn decode_header_payload(
    hdr: &Header,
    epayload: &[u8],
    corrected: usize,
) -> Option<(Packet, usize)> {
    let attrs = get_header_attributes(hdr);
    let (mut pp, total) = if attrs.hdr_type == 1 {
        let mut pp = header::decode_header_type_1(hdr)?;
        let (info, fixed) = payload::decode_payload(epayload, attrs.payload_len, attrs.max_fec)?;
        if attrs.payload_len > 0 {
            pp.set_info(&info);
        }
        (pp, corrected + fixed)
    } else {
        let (frame, fixed) = payload::decode_payload(epayload, attrs.payload_len, attrs.max_fec)?;
        if frame.is_empty() {
            return None;
        }
        (Packet::from_bytes(&frame, AudioLevel::unknown())?, corrected + fixed)
    };
    pp.meta.fec_type = FecType::Il2p;
    Some((pp, total))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecState {
    Searching,
    Header,
    Payload,
}

/// Bit-at-a-time receiver: finds the sync word (one bit error allowed, in
/// either polarity), gathers the header, then as much payload as the
/// header announces.
#[derive(Debug)]
pub struct Receiver {
    state: RecState,
    acc: u32,
    bc: u8,
    inverted: bool,
    shdr: Vec<u8>,
    hdr: Header,
    eplen: usize,
    payload: Vec<u8>,
    corrected: usize,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            state: RecState::Searching,
            acc: 0,
            bc: 0,
            inverted: false,
            shdr: Vec::with_capacity(HEADER_SIZE + HEADER_PARITY),
            hdr: [0; HEADER_SIZE],
            eplen: 0,
            payload: Vec::with_capacity(MAX_ENCODED_PAYLOAD_SIZE),
            corrected: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        self.bc += 1;
        if self.bc < 8 {
            return None;
        }
        self.bc = 0;
        let b = (self.acc & 0xff) as u8;
        Some(if self.inverted { !b } else { b })
    }

    fn finish(&mut self) -> Option<(Packet, usize)> {
        self.state = RecState::Searching;
        decode_header_payload(&self.hdr, &self.payload, self.corrected)
    }

    /// Feeds one bit. Returns a packet when a frame completes and decodes.
    pub fn push_bit(&mut self, bit: bool) -> Option<(Packet, usize)> {
        self.acc = ((self.acc << 1) | bit as u32) & 0x00ff_ffff;
        match self.state {
            RecState::Searching => {
                let normal = (self.acc ^ SYNC_WORD).count_ones() <= 1;
                let inverted = ((!self.acc & 0x00ff_ffff) ^ SYNC_WORD).count_ones() <= 1;
                if normal || inverted {
                    self.inverted = !normal;
                    self.state = RecState::Header;
                    self.bc = 0;
                    self.shdr.clear();
                }
                None
            }
            RecState::Header => {
                let b = self.next_byte()?;
                self.shdr.push(b);
                if self.shdr.len() < HEADER_SIZE + HEADER_PARITY {
                    return None;
                }
                let Some((hdr, fixed)) = header::clarify_header(&self.shdr) else {
                    self.state = RecState::Searching;
                    return None;
                };
                self.hdr = hdr;
                self.corrected = fixed;
                self.payload.clear();
                let attrs = get_header_attributes(&hdr);
                match PayloadProperties::compute(attrs.payload_len, attrs.max_fec) {
                    Some(props) if props.encoded_len() > 0 => {
                        self.eplen = props.encoded_len();
                        self.state = RecState::Payload;
                        None
                    }
                    Some(_) => self.finish(),
                    None => {
                        self.state = RecState::Searching;
                        None
                    }
                }
            }
            RecState::Payload => {
                let b = self.next_byte()?;
                self.payload.push(b);
                if self.payload.len() < self.eplen {
                    return None;
                }
                self.finish()
            }
        }
    }

    /// Feeds whole bytes, most significant bit first.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<(Packet, usize)> {
        let mut out = Vec::new();
        for &byte in bytes {
            for i in (0..8).rev() {
                if let Some(found) = self.push_bit(byte & (1 << i) != 0) {
                    out.push(found);
                }
            }
        }
        out
    }
}
