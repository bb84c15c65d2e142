//! Forward error correction wrappers around AX.25 frames
//!
//! Both schemes are built on one Reed-Solomon codec over GF(256). FX.25
//! keeps the HDLC frame intact inside a block so that plain receivers
//! still hear it; IL2P replaces HDLC framing altogether.

pub mod fx25;
pub mod hdlc;
pub mod il2p;
pub mod rs;

pub use self::rs::ReedSolomon;
