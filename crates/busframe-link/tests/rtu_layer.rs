use busframe_core::{Message, Net};
use busframe_link::{
    LineEvent, LinkError, NetLayer, RtuConfig, RtuLayer, SerialMode, SerialParams, SerialRts,
    SimSerialLine,
};
use std::time::{Duration, Instant};

const READ_TEN: &[u8] = &[0x03, 0x00, 0x00, 0x00, 0x0A];
const READ_TEN_FRAME: &[u8] = &[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD];

fn prepared(layer: &impl NetLayer) -> Message {
    let mut msg = Message::with_pdu(Net::Rtu, 0x01, READ_TEN).unwrap();
    assert!(layer.prepare_to_send(&mut msg));
    msg
}

#[test]
fn settings_are_derived_from_identity() {
    let layer = RtuLayer::with_line("/dev/ttyS0", "19200N2", SimSerialLine::new(250)).unwrap();

    assert_eq!(layer.port(), "/dev/ttyS0");
    assert_eq!(layer.connection(), "/dev/ttyS0");
    assert_eq!(layer.settings(), "19200N2");
    assert_eq!(layer.baud(), 19200);
    assert_eq!(layer.parity(), 'N');
    assert_eq!(layer.stop_bits(), 2);
    assert_eq!(layer.one_byte_time(), 250);
    assert_eq!(layer.net(), Net::Rtu);
}

#[test]
fn one_byte_time_is_seeded_from_default_rts_delay() {
    let params = SerialParams::from_settings("19200E1");
    let config = RtuConfig::default()
        .with_serial_mode(SerialMode::Rs485)
        .with_rts(SerialRts::Down)
        .with_rts_delay(50);
    let layer =
        RtuLayer::with_line_config("/dev/ttyS1", "19200E1", SimSerialLine::for_params(&params), &config)
            .unwrap();

    assert_eq!(layer.one_byte_time(), 572);
    assert_eq!(layer.rts_delay().unwrap(), 50);
    assert_eq!(layer.rts(), SerialRts::Down);
    assert_eq!(layer.serial_mode(), SerialMode::Rs485);
}

#[test]
fn rts_window_wraps_the_write() {
    let delay = 200u32;
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(delay)).unwrap();
    layer.set_rts(SerialRts::Down).unwrap();
    assert!(layer.line().rts_level());
    layer.line_mut().clear();

    let msg = prepared(&layer);
    let started = Instant::now();
    let written = layer.send_raw_message(&msg).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(written, READ_TEN_FRAME.len());
    let minimum = u64::from(delay) * 2 + u64::from(layer.one_byte_time()) * msg.adu_size() as u64;
    assert!(elapsed >= Duration::from_micros(minimum), "elapsed {elapsed:?}");

    let events = layer.line().events();
    assert_eq!(events.len(), 3);
    match &events[0] {
        LineEvent::Rts { mode, level, .. } => {
            assert_eq!(*mode, SerialRts::Up);
            assert!(!*level);
        }
        other => panic!("expected rts event, got {other:?}"),
    }
    match &events[1] {
        LineEvent::Write { data, .. } => assert_eq!(data.as_slice(), READ_TEN_FRAME),
        other => panic!("expected write event, got {other:?}"),
    }
    match &events[2] {
        LineEvent::Rts { mode, level, .. } => {
            assert_eq!(*mode, SerialRts::Down);
            assert!(*level);
        }
        other => panic!("expected rts event, got {other:?}"),
    }

    let settle = events[1].at() - events[0].at();
    assert!(settle >= Duration::from_micros(u64::from(delay)));
    let hold = events[2].at() - events[1].at();
    let expected_hold = u64::from(delay) * (msg.adu_size() as u64 + 1);
    assert!(hold >= Duration::from_micros(expected_hold), "hold {hold:?}");

    assert_eq!(layer.rts(), SerialRts::Down);
    assert!(layer.line().rts_level());
}

#[test]
fn rts_up_mode_toggles_down_for_transmit() {
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "9600", SimSerialLine::new(10)).unwrap();
    layer.set_rts(SerialRts::Up).unwrap();
    layer.line_mut().clear();

    let msg = prepared(&layer);
    layer.send_raw_message(&msg).unwrap();

    let modes: Vec<SerialRts> = layer
        .line()
        .events()
        .iter()
        .filter_map(|event| match event {
            LineEvent::Rts { mode, .. } => Some(*mode),
            LineEvent::Write { .. } => None,
        })
        .collect();
    assert_eq!(modes, vec![SerialRts::Down, SerialRts::Up]);
}

#[test]
fn no_rts_control_writes_once() {
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(100)).unwrap();
    let msg = prepared(&layer);

    assert_eq!(layer.send_raw_message(&msg).unwrap(), 8);
    assert_eq!(layer.line().written(), READ_TEN_FRAME);
    assert_eq!(layer.line().events().len(), 1);
    assert!(matches!(layer.line().events()[0], LineEvent::Write { .. }));
}

#[test]
fn short_write_count_is_returned() {
    let line = SimSerialLine::new(0).with_write_limit(3);
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", line).unwrap();
    let msg = prepared(&layer);

    assert_eq!(layer.send_raw_message(&msg).unwrap(), 3);
    assert_eq!(layer.line().written(), &READ_TEN_FRAME[..3]);
}

#[test]
fn failed_write_still_restores_rts() {
    let line = SimSerialLine::new(10).failing_writes();
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", line).unwrap();
    layer.set_rts(SerialRts::Up).unwrap();
    layer.line_mut().clear();

    let msg = prepared(&layer);
    let err = layer.send_raw_message(&msg).unwrap_err();
    assert!(matches!(err, LinkError::Io(_)));

    assert_eq!(layer.line().events().len(), 2);
    assert_eq!(layer.rts(), SerialRts::Up);
    assert!(!layer.line().rts_level());
}

#[test]
fn unreadable_line_reports_unknown_and_refuses_timed_send() {
    let mut layer =
        RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10).unreadable()).unwrap();

    assert_eq!(layer.serial_mode(), SerialMode::Unknown);
    assert_eq!(layer.rts(), SerialRts::Unknown);

    let msg = prepared(&layer);
    let err = layer.send_raw_message(&msg).unwrap_err();
    assert!(matches!(err, LinkError::Unsupported(_)));
    assert!(layer.line().written().is_empty());
}

#[test]
fn missing_rts_support_is_reported_as_unsupported() {
    let mut layer =
        RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10).without_rts()).unwrap();

    let err = layer.set_rts(SerialRts::Down).unwrap_err();
    assert!(matches!(err, LinkError::Unsupported(_)));
    assert_eq!(layer.rts(), SerialRts::None);

    let msg = prepared(&layer);
    assert_eq!(layer.send_raw_message(&msg).unwrap(), 8);
}

#[test]
fn unknown_sentinels_cannot_be_set() {
    let mut layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10)).unwrap();

    assert!(matches!(
        layer.set_rts(SerialRts::Unknown).unwrap_err(),
        LinkError::InvalidMode(_)
    ));
    assert!(matches!(
        layer.set_serial_mode(SerialMode::Unknown).unwrap_err(),
        LinkError::InvalidMode(_)
    ));
    assert_eq!(layer.rts(), SerialRts::None);
    assert_eq!(layer.serial_mode(), SerialMode::Rs232);
}

#[test]
fn prepare_and_check_are_gated_on_rtu() {
    let layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10)).unwrap();

    let mut enc = Message::with_pdu(Net::Enc, 0x01, READ_TEN).unwrap();
    assert!(!layer.prepare_to_send(&mut enc));
    assert_eq!(enc.adu_size(), 6);

    let mut msg = prepared(&layer);
    assert_eq!(msg.adu(), READ_TEN_FRAME);
    assert!(layer.check_message(&msg));

    msg.adu_mut()[3] ^= 0x40;
    assert!(!layer.check_message(&msg));
}

#[test]
fn received_frame_is_checked() {
    let layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10)).unwrap();

    let mut msg = Message::new(Net::Rtu);
    msg.buffer_mut()[..READ_TEN_FRAME.len()].copy_from_slice(READ_TEN_FRAME);
    msg.set_adu_size(READ_TEN_FRAME.len()).unwrap();
    assert!(layer.check_message(&msg));

    msg.set_adu_size(READ_TEN_FRAME.len() - 1).unwrap();
    assert!(!layer.check_message(&msg));
}

#[test]
fn prepare_leaves_full_buffer_untouched() {
    let layer = RtuLayer::with_line("/dev/ttyS0", "19200E1", SimSerialLine::new(10)).unwrap();

    let mut full = Message::from_adu(Net::Rtu, &[0xAA; 255]).unwrap();
    let before = full.clone();
    assert_eq!(full.remaining(), 1);

    assert!(!layer.prepare_to_send(&mut full));
    assert_eq!(full.adu_size(), 255);
    assert_eq!(full, before);
}
