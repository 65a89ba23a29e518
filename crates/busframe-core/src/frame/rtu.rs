use crate::message::CRC_LEN;
use crate::{DecodeError, EncodeError, Message};

/// Smallest frame `decode_frame` accepts: address, function code, CRC.
pub const MIN_FRAME_LEN: usize = 4;

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC16_TABLE: [u16; 256] = build_crc16_table();

/// CRC-16/MODBUS: polynomial 0xA001 (reflected), initial 0xFFFF, no final XOR.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for byte in data {
        let idx = ((crc ^ (*byte as u16)) & 0x00FF) as usize;
        crc = (crc >> 8) ^ CRC16_TABLE[idx];
    }
    crc
}

/// Wire bytes for a checksum: register low byte first.
pub const fn crc_bytes(crc: u16) -> [u8; CRC_LEN] {
    crc.to_le_bytes()
}

/// Appends the checksum of the current ADU bytes to `msg`.
///
/// Leaves `msg` untouched when the two bytes do not fit.
pub fn append_crc(msg: &mut Message) -> Result<(), EncodeError> {
    if msg.remaining() < CRC_LEN {
        return Err(EncodeError::BufferTooSmall);
    }
    let crc = crc16(msg.adu());
    msg.extend_from_slice(&crc_bytes(crc))
}

/// True when the trailing checksum of `msg` matches the bytes before it.
pub fn check_crc(msg: &Message) -> bool {
    verify(msg.adu())
}

/// True when `frame` ends in the checksum of everything before it.
///
/// A frame needs at least one byte ahead of its checksum.
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() <= CRC_LEN {
        return false;
    }
    let (payload, trailer) = frame.split_at(frame.len() - CRC_LEN);
    u16::from_le_bytes([trailer[0], trailer[1]]) == crc16(payload)
}

/// Splits a checked frame into its slave address and PDU.
pub fn decode_frame(data: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    if data.len() < MIN_FRAME_LEN {
        return Err(DecodeError::InvalidLength);
    }
    if !verify(data) {
        return Err(DecodeError::InvalidCrc);
    }

    let payload = &data[..data.len() - CRC_LEN];
    Ok((payload[0], &payload[1..]))
}
