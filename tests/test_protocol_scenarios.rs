//! End-to-end host/remote exchanges over the public API

use wiimote_emu::backend::{MemoryMiiStorage, MockInputSource, MockTransport};
use wiimote_emu::config::Settings;
use wiimote_emu::wiimote::constants::*;
use wiimote_emu::wiimote::{ExtensionKey, ReadDataReply, ReportingMode, Wiimote};

const CHANNEL: u16 = 0x41;

type TestWiimote = Wiimote<MockTransport, MockInputSource, MemoryMiiStorage>;

fn connect() -> (TestWiimote, MockTransport, MockInputSource) {
    let transport = MockTransport::new();
    let input = MockInputSource::new();
    let device = Wiimote::new(
        0,
        transport.clone(),
        input.clone(),
        MemoryMiiStorage::new(),
        &Settings::default(),
    );

    // Open the channel and consume the announcement status report
    device.interrupt_channel(CHANNEL, &[0xA2, RT_RUMBLE, 0x00]).unwrap();
    device.update();
    let sent = transport.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data[1], RT_STATUS_REPORT);

    (device, transport, input)
}

fn out(device: &TestWiimote, bytes: &[u8]) {
    let mut data = vec![0xA2];
    data.extend_from_slice(bytes);
    device.interrupt_channel(CHANNEL, &data).unwrap();
}

/// Tick until the read queue is drained, collecting the replies
fn read_replies(device: &TestWiimote, transport: &MockTransport) -> Vec<Vec<u8>> {
    let mut replies = Vec::new();
    loop {
        device.update();
        let mut sent = transport.take();
        match sent.pop() {
            Some(packet) if packet.data[1] == RT_READ_DATA_REPLY => replies.push(packet.data),
            _ => return replies,
        }
    }
}

#[test]
fn test_write_then_read_eeprom() {
    let (device, transport, _) = connect();

    out(&device, &[RT_WRITE_DATA, 0x00, 0x00, 0x00, 0x00, 4, 1, 2, 3, 4]);
    assert_eq!(transport.take()[0].data, vec![0xA1, RT_ACK_DATA, 0, 0, RT_WRITE_DATA, 0]);

    out(&device, &[RT_READ_DATA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04]);
    let replies = read_replies(&device, &transport);
    assert_eq!(replies.len(), 1);

    let reply = &replies[0];
    assert_eq!(ReadDataReply::unpack_size_error(reply[4]), (3, 0));
    assert_eq!(&reply[5..7], &[0x00, 0x00]);
    assert_eq!(&reply[7..11], &[1, 2, 3, 4]);
    assert!(reply[11..].iter().all(|&b| b == 0));
}

#[test]
fn test_read_across_free_boundary() {
    let (device, transport, _) = connect();

    out(&device, &[RT_READ_DATA, 0x00, 0x00, 0x16, 0xF0, 0x00, 0x20]);
    let replies = read_replies(&device, &transport);
    assert_eq!(replies.len(), 1);

    let reply = &replies[0];
    assert_eq!(reply.len(), 23);
    assert_eq!(ReadDataReply::unpack_size_error(reply[4]), (0x0F, 0x08));
    assert_eq!(&reply[5..7], &[0x16, 0xF0]);
    assert!(reply[7..].iter().all(|&b| b == 0));
}

#[test]
fn test_large_read_in_chunks() {
    let (device, transport, _) = connect();

    // 42 bytes of calibration: ceil(42 / 16) = 3 ticks
    out(&device, &[RT_READ_DATA, 0x00, 0x00, 0x00, 0x00, 0x00, 42]);
    let replies = read_replies(&device, &transport);
    assert_eq!(replies.len(), 3);

    let mut data = Vec::new();
    for (i, reply) in replies.iter().enumerate() {
        let (size, error) = ReadDataReply::unpack_size_error(reply[4]);
        assert_eq!(error, 0);
        assert_eq!(u16::from_be_bytes([reply[5], reply[6]]), (i * 16) as u16);
        data.extend_from_slice(&reply[7..8 + usize::from(size)]);
    }
    assert_eq!(data, EEPROM_CALIBRATION.to_vec());
}

#[test]
fn test_reads_served_in_order() {
    let (device, transport, _) = connect();

    out(&device, &[RT_READ_DATA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x12]);
    out(&device, &[RT_READ_DATA, 0x04, 0xA4, 0x00, 0xFA, 0x00, 0x06]);
    let addresses: Vec<u16> = read_replies(&device, &transport)
        .iter()
        .map(|r| u16::from_be_bytes([r[5], r[6]]))
        .collect();
    assert_eq!(addresses, vec![0x0000, 0x0010, 0x00FA]);
}

#[test]
fn test_accel_ir_mode_report() {
    let (device, transport, _) = connect();

    out(&device, &[RT_IR_LOGIC, FLAG_ENABLE]);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x30, 1, 0x08]);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x33, 1, IR_MODE_EXTENDED]);
    out(&device, &[RT_REPORT_MODE, FLAG_CONTINUOUS, 0x33]);
    transport.take();

    device.update();
    let sent = transport.take();
    assert_eq!(sent.len(), 1);

    let report = &sent[0].data;
    assert_eq!(report.len(), 19);
    assert_eq!(&report[..2], &[0xA1, 0x33]);
    assert_eq!(&report[4..7], &[0x80, 0x80, 0x9A]);
    assert!(report[7..19].chunks(3).all(|dot| dot[2] & 0x0F == 10));
}

#[test]
fn test_out_of_range_mode_rejected() {
    let (device, transport, _) = connect();

    out(&device, &[RT_REPORT_MODE, FLAG_CONTINUOUS, 0x31]);
    transport.take();

    let result = device.interrupt_channel(CHANNEL, &[0xA2, RT_REPORT_MODE, FLAG_CONTINUOUS, 0x2F]);
    assert!(result.is_err());
    assert!(transport.is_empty());
    assert_eq!(device.state().mode, ReportingMode::CoreAccel);

    device.update();
    assert_eq!(transport.take()[0].data.len(), 7);
}

#[test]
fn test_key_window_three_writes() {
    let (device, transport, _) = connect();

    out(&device, &[RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0x40, 4, 0x10, 0x20, 0x30, 0x40]);
    assert_eq!(device.state().encryption.generation(), 0);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0x44, 4, 0x50, 0x60, 0x70, 0x80]);
    assert_eq!(device.state().encryption.generation(), 0);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0x48, 4, 0x90, 0xA0, 0xB0, 0xC0]);
    assert_eq!(device.state().encryption.generation(), 1);

    // Turn on encryption and read back the identification bytes
    out(&device, &[RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0xFA, 2, 0xA4, 0x20]);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0xF0, 1, EXT_ENCRYPTION_ENABLED]);
    transport.take();

    out(&device, &[RT_READ_DATA, 0x04, 0xA4, 0x00, 0xFA, 0x00, 0x02]);
    let replies = read_replies(&device, &transport);
    let mut id = replies[0][7..9].to_vec();

    let key = ExtensionKey::generate(&[
        0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90, 0xA0, 0xB0, 0xC0,
    ]);
    key.decrypt(&mut id, 0xFA);
    assert_eq!(id, vec![0xA4, 0x20]);
}

#[test]
fn test_snapshot_restores_pending_read() {
    let (device, transport, _) = connect();
    out(&device, &[RT_READ_DATA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20]);
    device.update();
    transport.take();

    let snapshot = device.save_state().unwrap();
    let replies_before = read_replies(&device, &transport);

    device.load_state(&snapshot).unwrap();
    let replies_after = read_replies(&device, &transport);
    assert_eq!(replies_before, replies_after);
    assert_eq!(replies_after.len(), 1);
}

#[test]
fn test_disconnect_then_reconnect() {
    let (device, transport, _) = connect();
    out(&device, &[RT_REPORT_MODE, FLAG_CONTINUOUS, 0x30]);
    device.control_channel(DISCONNECT_CHANNEL, &[]).unwrap();
    transport.take();

    device.update();
    assert!(transport.is_empty());

    // Reconnecting announces the remote again
    device.interrupt_channel(CHANNEL, &[0xA2, RT_RUMBLE, 0x00]).unwrap();
    device.update();
    assert_eq!(transport.take()[0].data[1], RT_STATUS_REPORT);
}

#[test]
fn test_non_finite_motion_sample_is_dropped() {
    let (device, transport, input) = connect();

    out(&device, &[RT_IR_LOGIC, FLAG_ENABLE]);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x30, 1, 0x08]);
    out(&device, &[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x33, 1, IR_MODE_EXTENDED]);
    out(&device, &[RT_REPORT_MODE, FLAG_CONTINUOUS, 0x33]);
    transport.take();

    input.update(|i| i.accel.x = f64::NAN);
    device.update();
    input.update(|i| i.accel.x = 0.0);
    for _ in 0..10 {
        device.update();
    }

    let sent = transport.take();
    let report = &sent.last().unwrap().data;
    assert_eq!(report[1], 0x33);
    assert!(report[7..19].iter().any(|&b| b != 0xFF));

    let snapshot = device.save_state().unwrap();
    device.load_state(&snapshot).unwrap();
    assert_eq!(device.save_state().unwrap(), snapshot);
}

#[test]
fn test_key_window_single_wide_write() {
    let key: Vec<u8> = (1..=16).collect();
    let mut window = [0u8; 12];
    window.copy_from_slice(&key[..12]);

    let (device, _, _) = connect();
    let mut write = vec![RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0x40, 16];
    write.extend_from_slice(&key);
    out(&device, &write);
    let encryption = device.state().encryption;
    assert_eq!(encryption.generation(), 1);
    assert_eq!(*encryption.key(), ExtensionKey::generate(&window));

    // Starting four bytes early still rewrites the whole window
    let (device, _, _) = connect();
    let mut write = vec![RT_WRITE_DATA, 0x04, 0xA4, 0x00, 0x3C, 16, 0, 0, 0, 0];
    write.extend_from_slice(&key[..12]);
    out(&device, &write);
    let encryption = device.state().encryption;
    assert_eq!(encryption.generation(), 1);
    assert_eq!(*encryption.key(), ExtensionKey::generate(&window));
}
