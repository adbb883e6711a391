//! Emulated Wii Remote
//!
//! `Wiimote` owns the complete state of one controller slot behind a single
//! lock, so the tick scheduler and the packet callbacks can run on
//! different threads.
//!
//! ## Tick protocol
//!
//! Each `update()` sends at most one packet:
//! 1. nothing while no channel is open
//! 2. the next chunk of a pending register read, or
//! 3. a pending status report (which also pauses data reporting), or
//! 4. a data report in the current reporting mode, if auto-reporting is on

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use crate::backend::{InputSource, MiiStorage, Transport};
use crate::config::Settings;
use crate::wiimote::constants::*;
use crate::wiimote::dispatcher::{handle_output_report, request_status, ProtocolError};
use crate::wiimote::encryption::ExtensionEncryption;
use crate::wiimote::read_queue::ReadRequestQueue;
use crate::wiimote::registers::RegisterFile;
use crate::wiimote::report::build_data_report;
use crate::wiimote::sensors::SensorSimulator;
use crate::wiimote::snapshot::{self, SnapshotError};
use crate::wiimote::types::{InputReport, ReadDataReply, ReportingMode, Status};

/// Yamaha ADPCM decoder state of the speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdpcmState {
    pub predictor: i32,
    pub step: i32,
}

impl Default for AdpcmState {
    fn default() -> Self {
        Self { predictor: 0, step: 127 }
    }
}

/// Everything that makes up one remote, as persisted in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Zero-based slot
    pub index: usize,
    pub mode: ReportingMode,
    /// HID channel reports go out on; 0 while disconnected
    pub channel: u16,
    pub auto_report: bool,
    pub rumble: bool,
    pub speaker_mute: bool,
    pub need_status: bool,
    /// Rotate the d-pad for sideways play
    pub sideways: bool,
    pub status: Status,
    pub registers: RegisterFile,
    pub encryption: ExtensionEncryption,
    pub read_queue: ReadRequestQueue,
    pub sensors: SensorSimulator,
    pub adpcm: AdpcmState,
}

impl DeviceState {
    pub fn new(index: usize) -> Self {
        let mut state = Self {
            index,
            mode: ReportingMode::Core,
            channel: 0,
            auto_report: false,
            rumble: false,
            speaker_mute: false,
            need_status: true,
            sideways: false,
            status: Status::default(),
            registers: RegisterFile::new(),
            encryption: ExtensionEncryption::new(),
            read_queue: ReadRequestQueue::new(),
            sensors: SensorSimulator::default(),
            adpcm: AdpcmState::default(),
        };
        state.reset();
        state
    }

    pub fn with_settings(index: usize, settings: &Settings) -> Self {
        let mut state = Self::new(index);
        state.sideways = settings.sideways;
        state.sensors = SensorSimulator::new(settings.sensor_bar_on_top, settings.shake_intensity);
        state
    }

    /// Return to power-on defaults. Slot, orientation and sensor settings
    /// survive; pending reads are dropped.
    pub fn reset(&mut self) {
        self.mode = ReportingMode::Core;
        self.channel = 0;
        self.auto_report = false;
        self.rumble = false;
        self.speaker_mute = false;
        // The first tick after a reset announces the remote with a status report
        self.need_status = true;

        self.registers.reset();
        self.encryption = ExtensionEncryption::new();
        self.status = Status { battery: DEFAULT_BATTERY, ..Default::default() };
        self.read_queue.clear();
        self.adpcm = AdpcmState::default();
    }
}

struct Inner<I, S> {
    state: DeviceState,
    input: I,
    storage: S,
}

/// One emulated controller bound to its collaborators
pub struct Wiimote<T, I, S> {
    index: usize,
    transport: T,
    inner: Mutex<Inner<I, S>>,
}

impl<T: Transport, I: InputSource, S: MiiStorage> Wiimote<T, I, S> {
    pub fn new(index: usize, transport: T, input: I, storage: S, settings: &Settings) -> Self {
        info!("Creating {}", Self::slot_name(index));
        Self {
            index,
            transport,
            inner: Mutex::new(Inner {
                state: DeviceState::with_settings(index, settings),
                input,
                storage,
            }),
        }
    }

    fn slot_name(index: usize) -> String {
        format!("Wiimote Emu {}", index + 1)
    }

    pub fn name(&self) -> String {
        Self::slot_name(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn lock(&self) -> MutexGuard<'_, Inner<I, S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, channel: u16, report: &InputReport) {
        if let Err(e) = self.transport.send(self.index, channel, &report.to_bytes()) {
            warn!("{}: failed to send report: {}", self.name(), e);
        }
    }

    /// Copy of the current state
    pub fn state(&self) -> DeviceState {
        self.lock().state.clone()
    }

    pub fn rumble(&self) -> bool {
        self.lock().state.rumble
    }

    /// Reset to power-on defaults, dropping any pending reads
    pub fn reset(&self) {
        debug!("{}: reset", self.name());
        self.lock().state.reset();
    }

    /// One tick of the report loop
    pub fn update(&self) {
        let mut inner = self.lock();
        if inner.state.channel == 0 {
            return;
        }

        let input = inner.input.poll();
        let state = &mut inner.state;
        let channel = state.channel;
        state.status.buttons = input.buttons.to_bits(state.sideways);

        if let Some(chunk) = state.read_queue.step() {
            let reply = ReadDataReply {
                buttons: state.status.buttons,
                address: chunk.address,
                data: chunk.data,
            };
            self.send(channel, &InputReport::ReadReply(reply));
            return;
        }

        if state.need_status {
            let status = request_status(state);
            // A host that gets an unrequested status report expects data
            // reports to stop until it sets the reporting mode again
            state.auto_report = false;
            state.need_status = false;
            self.send(channel, &InputReport::Status(status));
            return;
        }

        state.status.battery = input.battery;
        state.sensors.update(&input);
        let packet = build_data_report(
            state.mode,
            state.status.buttons,
            &mut state.sensors,
            &input.ir,
            &state.registers,
        );

        if state.auto_report {
            self.send(channel, &InputReport::Data(packet));
        }
    }

    /// Packet from the host on the interrupt channel
    pub fn interrupt_channel(&self, channel: u16, data: &[u8]) -> Result<(), ProtocolError> {
        let mut inner = self.lock();
        inner.state.channel = channel;

        let (kind, param, body) = self.split_header(data)?;
        if kind != HID_TYPE_DATA || param != HID_PARAM_OUTPUT {
            return Err(self.unexpected_packet(kind, param));
        }

        let Inner { state, storage, .. } = &mut *inner;
        if let Some(reply) = handle_output_report(state, body, storage)? {
            self.send(channel, &reply);
        }
        Ok(())
    }

    /// Packet from the host on the control channel. Channel 99 signals a
    /// disconnect and resets the remote.
    pub fn control_channel(&self, channel: u16, data: &[u8]) -> Result<(), ProtocolError> {
        if channel == DISCONNECT_CHANNEL {
            info!("{}: disconnected", self.name());
            self.reset();
            return Ok(());
        }

        let mut inner = self.lock();
        inner.state.channel = channel;

        let (kind, param, body) = self.split_header(data)?;
        if kind != HID_TYPE_SET_REPORT || param != HID_PARAM_OUTPUT {
            return Err(self.unexpected_packet(kind, param));
        }

        let Inner { state, storage, .. } = &mut *inner;
        let result = handle_output_report(state, body, storage);
        if let Ok(Some(reply)) = &result {
            self.send(channel, reply);
        }
        self.send(channel, &InputReport::Handshake(HID_HANDSHAKE_SUCCESS));
        result.map(|_| ())
    }

    fn split_header<'a>(&self, data: &'a [u8]) -> Result<(u8, u8, &'a [u8]), ProtocolError> {
        match data.split_first() {
            Some((&header, body)) => Ok((header >> 4, header & 0x0F, body)),
            None => {
                let e = ProtocolError::Truncated { command: 0, len: 0 };
                error!("{}: {}", self.name(), e);
                Err(e)
            }
        }
    }

    fn unexpected_packet(&self, kind: u8, param: u8) -> ProtocolError {
        let e = ProtocolError::UnknownPacketType { kind, param };
        error!("{}: {}", self.name(), e);
        e
    }

    /// True while the input source reports any button held
    pub fn check_for_button_press(&self) -> bool {
        let mut inner = self.lock();
        inner.input.poll().buttons.any()
    }

    /// Serialize the full device state
    pub fn save_state(&self) -> Result<Vec<u8>, SnapshotError> {
        snapshot::save(&self.lock().state)
    }

    /// Replace the device state with a snapshot taken from the same slot
    pub fn load_state(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let state = snapshot::restore(bytes)?;
        if state.index != self.index {
            return Err(SnapshotError::Corrupt(format!(
                "snapshot belongs to slot {}, not {}",
                state.index, self.index
            )));
        }
        self.lock().state = state;
        debug!("{}: state restored", self.name());
        Ok(())
    }
}
