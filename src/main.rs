//! Wii Remote emulator - demo application
//!
//! Runs the emulator against logging mock backends and plays the part of a
//! host: it connects, reads the calibration data, turns on the IR camera
//! and streams accelerometer + IR reports for a few seconds.
//!
//! Every packet the emulated remote sends is logged by the mock transport
//! (`RUST_LOG=info` to see them).

use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wiimote_emu::backend::{FileMiiStorage, MockInputSource, MockTransport};
use wiimote_emu::config::Config;
use wiimote_emu::manager::{ChannelKind, EmulatorManager, InboundPacket};
use wiimote_emu::wiimote::constants::*;
use wiimote_emu::wiimote::types::ControllerInput;

/// L2CAP channel IDs the demo host uses
const CONTROL_CHANNEL: u16 = 0x0040;
const INTERRUPT_CHANNEL: u16 = 0x0041;

/// HID header of an interrupt channel output report
const DATA_OUTPUT: u8 = (HID_TYPE_DATA << 4) | HID_PARAM_OUTPUT;
const SET_REPORT_OUTPUT: u8 = (HID_TYPE_SET_REPORT << 4) | HID_PARAM_OUTPUT;

/// Host side of the connection sequence: LEDs, calibration read, IR camera
/// setup in extended mode, then continuous 0x33 reports
fn handshake_script() -> Vec<(ChannelKind, u16, Vec<u8>)> {
    let interrupt = |bytes: &[u8]| {
        let mut data = vec![DATA_OUTPUT];
        data.extend_from_slice(bytes);
        (ChannelKind::Interrupt, INTERRUPT_CHANNEL, data)
    };

    vec![
        (ChannelKind::Control, CONTROL_CHANNEL, vec![SET_REPORT_OUTPUT, RT_LEDS, 0x10]),
        interrupt(&[RT_REQUEST_STATUS, 0x00]),
        interrupt(&[RT_READ_DATA, 0x00, 0x00, 0x00, 0x16, 0x00, 0x0A]),
        interrupt(&[RT_READ_DATA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A]),
        interrupt(&[RT_IR_PIXEL_CLOCK, FLAG_ENABLE]),
        interrupt(&[RT_IR_LOGIC, FLAG_ENABLE]),
        interrupt(&[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x30, 1, 0x01]),
        interrupt(&[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x33, 1, IR_MODE_EXTENDED]),
        interrupt(&[RT_WRITE_DATA, 0x04, 0xB0, 0x00, 0x30, 1, 0x08]),
        interrupt(&[RT_REPORT_MODE, FLAG_CONTINUOUS, 0x33]),
    ]
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Wii Remote Emulator ===");
    println!();

    let config = match Config::load_default() {
        Ok(config) => {
            println!("✓ Loaded configuration from configs/default.toml");
            config
        }
        Err(e) => {
            warn!("Falling back to built-in configuration: {}", e);
            Config::default()
        }
    };

    let transport = MockTransport::new();
    let input = MockInputSource::new();
    input.set(ControllerInput { battery: config.settings.battery, ..Default::default() });

    let emulated: Vec<usize> = config.emulated_slots().collect();
    let mut manager = EmulatorManager::new(config);
    for index in &emulated {
        manager
            .attach(
                *index,
                Arc::new(transport.clone()),
                Box::new(input.clone()),
                Box::new(FileMiiStorage::beside_executable()),
            )
            .with_context(|| format!("attaching slot {}", index))?;
    }
    let Some(&slot) = emulated.first() else {
        println!("No emulated slots configured, nothing to do");
        return Ok(());
    };

    manager.start().context("starting manager")?;

    info!("Playing host handshake on slot {}", slot);
    for (kind, channel, data) in handshake_script() {
        manager.submit(InboundPacket { slot, channel, kind, data })?;
        thread::sleep(Duration::from_millis(20));
    }

    // Press A and wave the remote around for a while
    input.update(|i| i.buttons.a = true);
    for step in 0..100 {
        let phase = f64::from(step) / 100.0 * std::f64::consts::TAU;
        input.update(|i| {
            i.ir.x = phase.sin() * 0.5;
            i.ir.y = phase.cos() * 0.3;
            i.shake[0] = step % 25 < 10;
        });
        thread::sleep(Duration::from_millis(20));
    }

    // Disconnect
    manager.submit(InboundPacket {
        slot,
        channel: DISCONNECT_CHANNEL,
        kind: ChannelKind::Control,
        data: Vec::new(),
    })?;
    thread::sleep(Duration::from_millis(50));
    manager.stop();

    let sent = transport.sent();
    let data_reports = sent.iter().filter(|p| p.data.get(1) == Some(&0x33)).count();
    println!();
    println!("Sent {} packets ({} data reports in mode 0x33)", sent.len(), data_reports);

    Ok(())
}
