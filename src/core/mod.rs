//! Core types and configuration for the TNC
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, ErrorKind, Result};
pub use self::types::{
    AgwConfig,
    AudioLevel,
    CdigiConfig,
    CdigiRule,
    ChannelConfig,
    FecType,
    KissConfig,
    KissPortConfig,
    Medium,
    OutputKind,
    Priority,
    PtyKissConfig,
    SerialKissConfig,
    TncConfig,
    WaypointConfig,
    WaypointFormats,
};

/// Product name reported to client applications
pub const PRODUCT_NAME: &str = "AX25TNC";

/// Maximum number of radio channels (one KISS channel nibble)
pub const MAX_CHANS: usize = 16;

/// Default concurrent clients per TCP listener
pub const MAX_NET_CLIENTS: usize = 3;

/// Default KISS TCP port
pub const DEFAULT_KISS_PORT: u16 = 8001;

/// Default AGW TCP port
pub const DEFAULT_AGW_PORT: u16 = 8000;

/// Default symlink to the KISS pseudo terminal
pub const DEFAULT_PTY_SYMLINK: &str = "/tmp/kisstnc";

/// Default transmit timing, 10 ms units except persist
pub const DEFAULT_TXDELAY: u8 = 30;
pub const DEFAULT_PERSIST: u8 = 63;
pub const DEFAULT_SLOTTIME: u8 = 10;
pub const DEFAULT_TXTAIL: u8 = 10;
