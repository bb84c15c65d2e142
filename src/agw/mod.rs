//! AGW network protocol
//!
//! The binary header protocol spoken by AGWPE compatible applications:
//! a fixed 36 byte little-endian header followed by optional data.

pub mod header;
pub mod monitor;
pub mod server;

pub use self::header::{AgwCodec, AgwHeader, AgwMessage, HEADER_LEN, MAX_DATA_LEN};
pub use self::monitor::{mon_addrs, mon_desc, monitor_message, raw_message};
pub use self::server::{
    link_established, link_terminated, outstanding_frames_reply, rec_conn_data, AgwContext, AgwServer,
};
