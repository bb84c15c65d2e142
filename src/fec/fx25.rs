//! FX.25: an AX.25 frame wrapped in a Reed-Solomon block behind a 64-bit
//! correlation tag.
//!
//! On the air a block is the tag (8 bytes, least significant first), the
//! data part of the chosen profile, then the check bytes. The data part
//! holds the HDLC bit-stuffed frame with its FCS, padded with flag bits.

use crate::ax25::crc::{append_fcs, check_fcs};
use crate::ax25::MIN_PACKET_LEN;

use super::hdlc;
use super::rs::{fx25_codec, NN};

/// Largest data part of any profile.
pub const MAX_DATA: usize = 239;

/// Largest check part of any profile.
pub const MAX_CHECK: usize = 64;

/// Lowest and highest usable tag numbers.
pub const CTAG_MIN: usize = 0x01;
pub const CTAG_MAX: usize = 0x0b;

/// Maximum bit differences tolerated when matching a tag.
pub const CLOSE_ENOUGH: u32 = 8;

/// One correlation tag profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub tag: u64,
    /// Data bytes carried on the air
    pub k_data_radio: usize,
    /// Check bytes
    pub nroots: usize,
}

impl Profile {
    /// Data part of the full RS block.
    pub fn k_data_rs(&self) -> usize {
        NN - self.nroots
    }
}

const fn p(tag: u64, k_data_radio: usize, nroots: usize) -> Profile {
    Profile { tag, k_data_radio, nroots }
}

/// Tags 0x00..0x0F. Entries with no data are reserved or undefined.
pub const TAGS: [Profile; 16] = [
    p(0x566E_D271_7946_107E, 0, 0),
    p(0xB74D_B7DF_8A53_2F3E, 239, 16),
    p(0x26FF_60A6_00CC_8FDE, 128, 16),
    p(0xC7DC_0508_F3D9_B09E, 64, 16),
    p(0x8F05_6EB4_3696_60EE, 32, 16),
    p(0x6E26_0B1A_C583_5FAE, 223, 32),
    p(0xFF94_DC63_4F1C_FF4E, 128, 32),
    p(0x1EB7_B9CD_BC09_C00E, 64, 32),
    p(0xDBF8_69BD_2DBB_1776, 32, 32),
    p(0x3ADB_0C13_DEAE_2836, 191, 64),
    p(0xAB69_DB6A_5431_88D6, 128, 64),
    p(0x4A4A_BEC4_A724_B796, 64, 64),
    p(0x0293_D578_626B_67E6, 0, 0),
    p(0xE3B0_B0D6_917E_58A6, 0, 0),
    p(0x7202_67AF_1BE1_F846, 0, 0),
    p(0x9321_0201_E8F4_C706, 0, 0),
];

/// Profile for a usable tag number.
pub fn profile(ctag: usize) -> Option<&'static Profile> {
    if (CTAG_MIN..=CTAG_MAX).contains(&ctag) {
        TAGS.get(ctag)
    } else {
        None
    }
}

/// Finds the usable tag within [`CLOSE_ENOUGH`] bits of `value`.
pub fn tag_match(value: u64) -> Option<usize> {
    (CTAG_MIN..=CTAG_MAX).find(|&n| (value ^ TAGS[n].tag).count_ones() <= CLOSE_ENOUGH)
}

/// Chooses a tag for `dlen` bytes of stuffed data.
///
/// `100 + n` forces tag `n`. 16, 32 or 64 picks the shortest block with
/// that many check bytes. Any other positive value picks by size, with
/// more check bytes for the middle sizes. `None` when nothing fits.
pub fn pick_mode(fx_mode: i32, dlen: usize) -> Option<usize> {
    if fx_mode <= 0 {
        return None;
    }
    let forced = fx_mode - 100;
    if forced >= CTAG_MIN as i32 && forced <= CTAG_MAX as i32 {
        let n = forced as usize;
        return (dlen <= TAGS[n].k_data_radio).then_some(n);
    }
    if matches!(fx_mode, 16 | 32 | 64) {
        return (CTAG_MIN..=CTAG_MAX)
            .rev()
            .find(|&n| TAGS[n].nroots == fx_mode as usize && dlen <= TAGS[n].k_data_radio);
    }
    const PREFER: [usize; 6] = [0x04, 0x03, 0x06, 0x09, 0x05, 0x01];
    PREFER.into_iter().find(|&n| dlen <= TAGS[n].k_data_radio)
}

/// Encodes a frame (without FCS) for transmission.
///
/// Returns the tag number and the bytes to send: tag, data, check.
/// `None` when the frame is too large for any allowed profile, in which
/// case the caller falls back to plain AX.25.
pub fn send_frame(frame: &[u8], fx_mode: i32) -> Option<(usize, Vec<u8>)> {
    let mut with_fcs = frame.to_vec();
    append_fcs(&mut with_fcs);

    let (mut data, dlen) = hdlc::stuff(&with_fcs, MAX_DATA)?;
    let ctag = pick_mode(fx_mode, dlen)?;
    let prof = profile(ctag)?;
    let rs = fx25_codec(prof.nroots)?;

    data.truncate(prof.k_data_radio);
    let mut block = [0u8; NN];
    block[..prof.k_data_radio].copy_from_slice(&data);
    let mut check = vec![0u8; prof.nroots];
    rs.encode(&block[..prof.k_data_rs()], &mut check);

    let mut out = Vec::with_capacity(8 + prof.k_data_radio + prof.nroots);
    out.extend_from_slice(&prof.tag.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&check);
    Some((ctag, out))
}

/// Decodes the bytes following a matched tag: data part then check part.
///
/// Returns the frame without FCS and the number of corrected bytes. Fails
/// on an uncorrectable block, a correction in the padding, bad stuffing,
/// a frame shorter than two addresses and control, or an FCS mismatch.
pub fn rec_frame(ctag: usize, body: &[u8]) -> Option<(Vec<u8>, usize)> {
    let prof = profile(ctag)?;
    let rs = fx25_codec(prof.nroots)?;
    if body.len() < prof.k_data_radio + prof.nroots {
        return None;
    }

    let mut block = [0u8; NN];
    block[..prof.k_data_radio].copy_from_slice(&body[..prof.k_data_radio]);
    block[prof.k_data_rs()..]
        .copy_from_slice(&body[prof.k_data_radio..prof.k_data_radio + prof.nroots]);

    let fixed = rs.decode(&mut block, &[])?;
    if fixed.iter().any(|&pos| (prof.k_data_radio..prof.k_data_rs()).contains(&pos)) {
        return None;
    }

    let mut frame = hdlc::unstuff(&block[..prof.k_data_radio])?;
    if frame.len() < MIN_PACKET_LEN + 2 || !check_fcs(&frame) {
        return None;
    }
    frame.truncate(frame.len() - 2);
    Some((frame, fixed.len()))
}

/// Decodes a complete block as sent: tag, data and check.
pub fn rec_block(wire: &[u8]) -> Option<(Vec<u8>, usize)> {
    let tag = u64::from_le_bytes(wire.get(..8)?.try_into().ok()?);
    rec_frame(tag_match(tag)?, &wire[8..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ax25::{u_frame, CmdRes, FrameType};

    fn test_frame(info_len: usize) -> Vec<u8> {
        let info: Vec<u8> = (0..info_len).map(|i| b"Foo?Bar?"[i % 8]).collect();
        u_frame(&["TEST", "WB2OSZ-1"], CmdRes::Command, FrameType::UUi, 0, 0xf0, &info)
            .unwrap()
            .frame_bytes()
            .to_vec()
    }

    #[test]
    fn test_pick_mode() {
        assert_eq!(pick_mode(101, 239), Some(1));
        assert_eq!(pick_mode(101, 240), None);
        assert_eq!(pick_mode(105, 223), Some(5));
        assert_eq!(pick_mode(105, 224), None);
        assert_eq!(pick_mode(109, 191), Some(9));
        assert_eq!(pick_mode(109, 192), None);

        assert_eq!(pick_mode(16, 32), Some(4));
        assert_eq!(pick_mode(16, 64), Some(3));
        assert_eq!(pick_mode(16, 128), Some(2));
        assert_eq!(pick_mode(16, 239), Some(1));
        assert_eq!(pick_mode(16, 240), None);

        assert_eq!(pick_mode(32, 32), Some(8));
        assert_eq!(pick_mode(32, 64), Some(7));
        assert_eq!(pick_mode(32, 128), Some(6));
        assert_eq!(pick_mode(32, 223), Some(5));
        assert_eq!(pick_mode(32, 234), None);

        assert_eq!(pick_mode(64, 64), Some(11));
        assert_eq!(pick_mode(64, 128), Some(10));
        assert_eq!(pick_mode(64, 191), Some(9));
        assert_eq!(pick_mode(64, 192), None);

        assert_eq!(pick_mode(1, 32), Some(4));
        assert_eq!(pick_mode(1, 33), Some(3));
        assert_eq!(pick_mode(1, 64), Some(3));
        assert_eq!(pick_mode(1, 65), Some(6));
        assert_eq!(pick_mode(1, 128), Some(6));
        assert_eq!(pick_mode(1, 191), Some(9));
        assert_eq!(pick_mode(1, 223), Some(5));
        assert_eq!(pick_mode(1, 239), Some(1));
        assert_eq!(pick_mode(1, 240), None);

        assert_eq!(pick_mode(0, 10), None);
    }

    #[test]
    fn test_tag_match() {
        for n in CTAG_MIN..=CTAG_MAX {
            assert_eq!(tag_match(TAGS[n].tag), Some(n));
            assert_eq!(tag_match(TAGS[n].tag ^ 0xff), Some(n));
            assert_eq!(tag_match(TAGS[n].tag ^ 0x1ff), None);
        }
        assert_eq!(tag_match(TAGS[0].tag), None);
    }

    #[test]
    fn test_every_tag_roundtrip() {
        let frame = test_frame(8);
        for n in CTAG_MIN..=CTAG_MAX {
            let (ctag, wire) = send_frame(&frame, 100 + n as i32).unwrap();
            assert_eq!(ctag, n);
            assert_eq!(wire.len(), 8 + TAGS[n].k_data_radio + TAGS[n].nroots);
            let (decoded, fixed) = rec_block(&wire).unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(fixed, 0);
        }
    }

    #[test]
    fn test_correction() {
        let frame = test_frame(100);
        let (ctag, mut wire) = send_frame(&frame, 32).unwrap();
        assert_eq!(ctag, 6);
        for b in &mut wire[16..32] {
            *b = !*b;
        }
        let (decoded, fixed) = rec_block(&wire).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(fixed, 16);

        wire[40] ^= 0x55;
        assert!(rec_block(&wire).is_none());
    }

    #[test]
    fn test_too_large() {
        assert!(send_frame(&test_frame(250), 1).is_none());
        assert!(send_frame(&test_frame(100), 104).is_none());
    }

    #[test]
    fn test_short_body() {
        let (_, wire) = send_frame(&test_frame(8), 104).unwrap();
        assert!(rec_frame(4, &wire[8..wire.len() - 1]).is_none());
        assert!(rec_frame(0, &wire[8..]).is_none());
    }
}
