//! AX25 TNC: the protocol core of a software TNC
//!
//! Frames heard by a modem come in through the data link queue, are shown
//! to KISS and AGW clients, offered to the digipeater and handed to the
//! link layer. Frames from clients go through the transmit queue to the
//! channel transmitters. FX.25 and IL2P add forward error correction on
//! the air.
pub mod core;

pub mod agw;
pub mod ax25;
pub mod digipeater;
pub mod dlq;
pub mod fec;
pub mod kiss;
pub mod mheard;
pub mod router;
pub mod symbols;
pub mod tnc;
pub mod tq;
pub mod util;
pub mod waypoint;

// Re-export commonly used items
pub use core::{Error, Result};
pub use tnc::Tnc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
