//! CRC-16/X.25, the HDLC frame check sequence.

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8408 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u16; 256] = build_table();

/// Continues a running CRC. Start with 0xFFFF and invert the result.
pub fn crc16_update(data: &[u8], seed: u16) -> u16 {
    data.iter().fold(seed, |crc, &b| {
        (crc >> 8) ^ CRC_TABLE[((crc ^ b as u16) & 0xff) as usize]
    })
}

/// Frame check sequence over a whole frame.
///
/// Transmitted least significant byte first.
pub fn fcs_calc(data: &[u8]) -> u16 {
    crc16_update(data, 0xffff) ^ 0xffff
}

/// Appends the FCS, low byte first.
pub fn append_fcs(frame: &mut Vec<u8>) {
    let fcs = fcs_calc(frame);
    frame.extend_from_slice(&fcs.to_le_bytes());
}

/// True if the last two bytes are a valid FCS for the rest.
pub fn check_fcs(frame_with_fcs: &[u8]) -> bool {
    if frame_with_fcs.len() < 2 {
        return false;
    }
    let (body, fcs) = frame_with_fcs.split_at(frame_with_fcs.len() - 2);
    fcs_calc(body) == u16::from_le_bytes([fcs[0], fcs[1]])
}
