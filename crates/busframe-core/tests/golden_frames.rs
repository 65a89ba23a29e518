use busframe_core::frame::rtu::{self, append_crc};
use busframe_core::{DecodeError, Message, Net};

const READ_HOLDING_REQ: &[u8] = &[0x03, 0x00, 0x6B, 0x00, 0x03];
const RTU_READ_HOLDING: &[u8] = &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87];
const RTU_READ_TEN: &[u8] = &[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD];

#[test]
fn fc03_rtu_golden_encode() {
    let mut msg = Message::with_pdu(Net::Rtu, 0x11, READ_HOLDING_REQ).unwrap();
    append_crc(&mut msg).unwrap();
    assert_eq!(msg.adu(), RTU_READ_HOLDING);

    let mut msg = Message::with_pdu(Net::Enc, 0x01, &[0x03, 0x00, 0x00, 0x00, 0x0A]).unwrap();
    append_crc(&mut msg).unwrap();
    assert_eq!(msg.adu(), RTU_READ_TEN);
}

#[test]
fn received_golden_frame_decodes() {
    let msg = Message::from_adu(Net::Rtu, RTU_READ_HOLDING).unwrap();
    assert!(rtu::check_crc(&msg));

    let (address, pdu) = rtu::decode_frame(msg.adu()).unwrap();
    assert_eq!(address, 0x11);
    assert_eq!(pdu, READ_HOLDING_REQ);
}

#[test]
fn rtu_frame_crc_tamper_detected() {
    let mut tampered = RTU_READ_HOLDING.to_vec();
    tampered[2] ^= 0x01;

    assert_eq!(
        rtu::decode_frame(&tampered).unwrap_err(),
        DecodeError::InvalidCrc
    );
    assert!(!rtu::check_crc(&Message::from_adu(Net::Rtu, &tampered).unwrap()));
}
