//! KISS TNC protocol
//!
//! Framing, command processing, and the three ways a KISS client can be
//! attached: TCP, a serial port, or a pseudo terminal.

pub mod frame;
pub mod net;
pub mod process;
#[cfg(target_os = "linux")]
pub mod pty;
pub mod serial;
pub mod session;

pub use self::frame::{encapsulate, unwrap, KissCodec, KissItem, FEND, FESC, TFEND, TFESC};
pub use self::net::KissTcpServer;
pub use self::process::{tnc_version, KissProcessor};
#[cfg(target_os = "linux")]
pub use self::pty::KissPty;
pub use self::serial::KissSerial;
pub use self::session::{KissContext, KissSession};
