//! Frame checksum
//!
//! Every WXT520 data frame ends in a three character checksum: a
//! CRC-16/ARC (polynomial 0x8005 reflected as 0xA001, init 0x0000) over the
//! frame body, packed six bits per character and offset into the printable
//! range starting at `@` (0x40).

/// Number of checksum characters at the end of a frame
pub const CHECKSUM_LEN: usize = 3;

/// Shortest trimmed frame that can carry a header and a checksum
pub const MIN_FRAME_LEN: usize = CHECKSUM_LEN + 1;

/// CRC-16/ARC
/// Polynomial: 0x8005, Init: 0x0000, RefIn: true, RefOut: true
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Pack a CRC into the three printable characters used on the wire
#[allow(clippy::cast_possible_truncation)]
pub fn encode(crc: u16) -> [u8; CHECKSUM_LEN] {
    [
        0x40 | (crc >> 12) as u8,
        0x40 | ((crc >> 6) & 0x3F) as u8,
        0x40 | (crc & 0x3F) as u8,
    ]
}

/// Checksum characters for a frame body (everything before the checksum)
pub fn compute(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    encode(crc16(payload))
}

/// Verify a raw line as read from the device.
///
/// Surrounding whitespace (the CR/LF terminator) is ignored. The last three
/// remaining bytes must equal the checksum of everything before them.
pub fn verify(frame: &[u8]) -> bool {
    let frame = frame.trim_ascii();
    if frame.len() < MIN_FRAME_LEN {
        return false;
    }

    let (body, received) = frame.split_at(frame.len() - CHECKSUM_LEN);
    compute(body) == received
}
