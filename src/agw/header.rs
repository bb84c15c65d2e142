//! AGW message header and the stream codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::Error;
use crate::util::{from_fixed, to_fixed};

/// Every message starts with this many bytes.
pub const HEADER_LEN: usize = 36;

/// Longest data part accepted from a client.
pub const MAX_DATA_LEN: usize = 4096;

/// Fixed header, little-endian on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgwHeader {
    /// Radio channel
    pub port: u8,
    reserved1: [u8; 3],
    /// Command or reply letter
    pub datakind: u8,
    reserved2: u8,
    pub pid: u8,
    reserved3: u8,
    /// NUL padded callsign
    pub call_from: [u8; 10],
    pub call_to: [u8; 10],
    /// Bytes following the header
    pub data_len: u32,
    pub user_reserved: u32,
}

impl AgwHeader {
    /// Creates a new header with everything else zero
    pub fn new(port: u8, datakind: u8) -> Self {
        AgwHeader { port, datakind, ..Default::default() }
    }

    pub fn call_from(&self) -> String {
        from_fixed(&self.call_from)
    }

    pub fn call_to(&self) -> String {
        from_fixed(&self.call_to)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        bincode::serialize(self).map_err(|e| Error::protocol(format!("Failed to serialize AGW header: {}", e)))
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        bincode::deserialize(buf).map_err(|e| Error::protocol(format!("Failed to deserialize AGW header: {}", e)))
    }
}

/// Header plus data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgwMessage {
    pub header: AgwHeader,
    pub data: Bytes,
}

impl AgwMessage {
    /// Creates a new message with no data
    pub fn new(port: u8, datakind: u8) -> Self {
        AgwMessage { header: AgwHeader::new(port, datakind), data: Bytes::new() }
    }

    /// Sets both callsigns. Each is cut to 9 characters.
    pub fn calls(mut self, from: &str, to: &str) -> Self {
        self.header.call_from = to_fixed(from);
        self.header.call_to = to_fixed(to);
        self
    }

    pub fn pid(mut self, pid: u8) -> Self {
        self.header.pid = pid;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self.header.data_len = self.data.len() as u32;
        self
    }

    /// The complete message as sent to a client.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(HEADER_LEN + self.data.len());
        put_message(self, &mut dst);
        dst.freeze()
    }
}

fn put_message(msg: &AgwMessage, dst: &mut BytesMut) {
    let h = &msg.header;
    // Same layout as the bincode form.
    dst.put_u8(h.port);
    dst.put_slice(&h.reserved1);
    dst.put_u8(h.datakind);
    dst.put_u8(h.reserved2);
    dst.put_u8(h.pid);
    dst.put_u8(h.reserved3);
    dst.put_slice(&h.call_from);
    dst.put_slice(&h.call_to);
    dst.put_u32_le(msg.data.len() as u32);
    dst.put_u32_le(h.user_reserved);
    dst.put_slice(&msg.data);
}

/// Splits a client byte stream into messages.
#[derive(Debug, Clone, Default)]
pub struct AgwCodec {
    /// Header of a message whose data has not all arrived
    pending: Option<AgwHeader>,
}

impl AgwCodec {
    /// Creates a new codec
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for AgwCodec {
    type Item = AgwMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending {
            Some(h) => h,
            None => {
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }
                let h = AgwHeader::from_bytes(&src[..HEADER_LEN])?;
                if h.data_len as usize > MAX_DATA_LEN {
                    return Err(Error::protocol(format!(
                        "AGW data length {} is out of range, command '{}'",
                        h.data_len,
                        char::from(h.datakind)
                    )));
                }
                src.advance(HEADER_LEN);
                h
            }
        };

        let len = header.data_len as usize;
        if src.len() < len {
            self.pending = Some(header);
            src.reserve(len - src.len());
            return Ok(None);
        }
        self.pending = None;
        let data = src.split_to(len).freeze();
        Ok(Some(AgwMessage { header, data }))
    }
}

impl Encoder<AgwMessage> for AgwCodec {
    type Error = Error;

    fn encode(&mut self, item: AgwMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(HEADER_LEN + item.data.len());
        put_message(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut h = AgwHeader::new(2, b'X');
        h.pid = 0xf0;
        h.call_from = to_fixed("W1AW-15");
        h.data_len = 0x0102_0304;
        let bytes = h.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[4], b'X');
        assert_eq!(bytes[6], 0xf0);
        assert_eq!(&bytes[8..15], b"W1AW-15");
        assert_eq!(&bytes[28..32], &[4, 3, 2, 1]);

        let back = AgwHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.call_from(), "W1AW-15");
        assert_eq!(back.call_to(), "");
    }

    #[test]
    fn test_message_bytes_match_bincode() {
        let msg = AgwMessage::new(1, b'D').calls("A", "B").pid(0xcf).data(&b"hi"[..]);
        let bytes = msg.to_bytes();
        assert_eq!(&bytes[..HEADER_LEN], &msg.header.to_bytes().unwrap()[..]);
        assert_eq!(&bytes[HEADER_LEN..], b"hi");
    }

    #[test]
    fn test_decode_in_pieces() {
        let wire = AgwMessage::new(0, b'M').calls("N0CALL", "CQ").data(&b"hello"[..]).to_bytes();
        let mut codec = AgwCodec::new();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&wire[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[20..40]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[40..]);
        buf.extend_from_slice(&AgwMessage::new(0, b'R').to_bytes());

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header.datakind, b'M');
        assert_eq!(msg.header.call_to(), "CQ");
        assert_eq!(&msg.data[..], b"hello");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header.datakind, b'R');
        assert!(msg.data.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversize_rejected() {
        let mut h = AgwHeader::new(0, b'D');
        h.data_len = (MAX_DATA_LEN + 1) as u32;
        let mut buf = BytesMut::from(&h.to_bytes().unwrap()[..]);
        assert!(AgwCodec::new().decode(&mut buf).is_err());

        h.data_len = MAX_DATA_LEN as u32;
        let mut buf = BytesMut::from(&h.to_bytes().unwrap()[..]);
        assert!(AgwCodec::new().decode(&mut buf).unwrap().is_none());
    }
}
