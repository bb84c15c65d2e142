//! KISS byte stuffing and the stream decoder shared by every transport.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::ax25::MAX_PACKET_LEN;
use crate::core::Error;

pub const FEND: u8 = 0xc0;
pub const FESC: u8 = 0xdb;
pub const TFEND: u8 = 0xdc;
pub const TFESC: u8 = 0xdd;

/// Largest escaped message we collect: every byte escaped, plus the type
/// byte and both FENDs.
pub const MAX_KISS_LEN: usize = 2 * (MAX_PACKET_LEN + 1) + 2;

/// Noise kept while looking for a frame start.
pub const MAX_NOISE_LEN: usize = 100;

/// Answer to `restart` or `reset` typed at us as if we were a TNC.
pub const RESET_REPLY: &[u8] = b"\xc0\xc0";

/// Answer to any other line of noise.
pub const PROMPT_REPLY: &[u8] = b"\r\ncmd:";

/// Wraps bytes in FENDs, escaping FEND and FESC.
pub fn encapsulate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2 + data.len() / 8);
    out.push(FEND);
    for &b in data {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
    out.push(FEND);
    out
}

/// Removes the framing and escapes. Leading and trailing FENDs are both
/// optional. A byte after FESC other than TFEND or TFESC is dropped.
pub fn unwrap(data: &[u8]) -> Vec<u8> {
    let data = data.strip_suffix(&[FEND]).unwrap_or(data);
    let data = data.strip_prefix(&[FEND]).unwrap_or(data);
    let mut out = Vec::with_capacity(data.len());
    let mut escaped = false;
    for &b in data {
        if escaped {
            match b {
                TFESC => out.push(FESC),
                TFEND => out.push(FEND),
                _ => {}
            }
            escaped = false;
        } else if b == FESC {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    out
}

/// Something recognized in the byte stream from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KissItem {
    /// Unwrapped message: type byte then data
    Frame(Vec<u8>),
    /// A line of noise; send this back to the client
    NoiseReply(&'static [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Searching,
    Collecting,
}

/// Stream decoder. One per client connection, since partial frames
/// belong to the connection they arrived on.
#[derive(Debug, Default)]
pub struct KissCodec {
    state: State,
    msg: Vec<u8>,
    noise: Vec<u8>,
    /// Set when the current message grew too long; it is discarded
    overflow: bool,
}

impl KissCodec {
    /// Creates a new decoder in the searching state
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte, returning anything it completes.
    pub fn push_byte(&mut self, ch: u8) -> Option<KissItem> {
        match self.state {
            State::Searching => {
                if ch == FEND {
                    self.noise.clear();
                    self.msg.clear();
                    self.msg.push(ch);
                    self.overflow = false;
                    self.state = State::Collecting;
                    return None;
                }
                if self.noise.len() < MAX_NOISE_LEN {
                    self.noise.push(ch);
                }
                if ch == b'\r' {
                    let line = std::mem::take(&mut self.noise);
                    let reply = if line.eq_ignore_ascii_case(b"restart\r") || line.eq_ignore_ascii_case(b"reset\r") {
                        RESET_REPLY
                    } else {
                        PROMPT_REPLY
                    };
                    return Some(KissItem::NoiseReply(reply));
                }
                None
            }
            State::Collecting => {
                if ch == FEND {
                    if self.msg.len() <= 1 {
                        // FEND FEND: empty frame, keep collecting.
                        self.msg.clear();
                        self.msg.push(ch);
                        return None;
                    }
                    self.msg.push(ch);
                    self.state = State::Searching;
                    let msg = std::mem::take(&mut self.msg);
                    if std::mem::take(&mut self.overflow) {
                        return None;
                    }
                    let unwrapped = unwrap(&msg);
                    return (!unwrapped.is_empty()).then_some(KissItem::Frame(unwrapped));
                }
                if self.msg.len() < MAX_KISS_LEN {
                    self.msg.push(ch);
                } else {
                    self.overflow = true;
                }
                None
            }
        }
    }
}

impl Decoder for KissCodec {
    type Item = KissItem;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut used = 0;
        let mut found = None;
        for &b in src.iter() {
            used += 1;
            if let Some(item) = self.push_byte(b) {
                found = Some(item);
                break;
            }
        }
        let _ = src.split_to(used);
        Ok(found)
    }
}

impl Encoder<&[u8]> for KissCodec {
    type Error = Error;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&encapsulate(item));
        Ok(())
    }
}
