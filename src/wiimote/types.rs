//! Wii Remote type definitions
//!
//! This module defines the basic data types used throughout the wiimote module:
//! reporting modes and their field layouts, button and motion input, and the
//! outbound packets with explicit pack routines over byte slices.

use serde::{Deserialize, Serialize};

use crate::wiimote::constants::*;

// ============================================================================
// Reporting Modes
// ============================================================================

/// Data reporting mode negotiated by the host with the report mode command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportingMode {
    /// 0x30: core buttons
    Core = 0x30,
    /// 0x31: core buttons and accelerometer
    CoreAccel = 0x31,
    /// 0x32: core buttons with 8 extension bytes
    CoreExt8 = 0x32,
    /// 0x33: core buttons and accelerometer with 12 IR bytes
    CoreAccelIr12 = 0x33,
    /// 0x34: core buttons with 19 extension bytes
    CoreExt19 = 0x34,
    /// 0x35: core buttons and accelerometer with 16 extension bytes
    CoreAccelExt16 = 0x35,
    /// 0x36: core buttons with 10 IR bytes and 9 extension bytes
    CoreIr10Ext9 = 0x36,
    /// 0x37: core buttons and accelerometer with 10 IR bytes and 6 extension bytes
    CoreAccelIr10Ext6 = 0x37,
}

impl ReportingMode {
    pub const ALL: [ReportingMode; 8] = [
        ReportingMode::Core,
        ReportingMode::CoreAccel,
        ReportingMode::CoreExt8,
        ReportingMode::CoreAccelIr12,
        ReportingMode::CoreExt19,
        ReportingMode::CoreAccelExt16,
        ReportingMode::CoreIr10Ext9,
        ReportingMode::CoreAccelIr10Ext6,
    ];

    /// Decode a mode byte; `None` for anything outside 0x30..=0x37
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.id() == id)
    }

    /// Report ID placed in the second byte of every data report
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Field offsets of this mode's data report
    pub fn layout(self) -> ReportLayout {
        // Offsets count from the start of the packet, preamble included.
        // A zero offset means the field is absent.
        let (core, accel, ir, ext, size) = match self {
            ReportingMode::Core => (2, 0, 0, 0, 4),
            ReportingMode::CoreAccel => (2, 4, 0, 0, 7),
            ReportingMode::CoreExt8 => (2, 0, 0, 4, 12),
            ReportingMode::CoreAccelIr12 => (2, 4, 7, 0, 19),
            ReportingMode::CoreExt19 => (2, 0, 0, 4, 23),
            ReportingMode::CoreAccelExt16 => (2, 4, 0, 7, 23),
            ReportingMode::CoreIr10Ext9 => (2, 0, 4, 14, 23),
            ReportingMode::CoreAccelIr10Ext6 => (2, 4, 7, 17, 23),
        };
        ReportLayout { core, accel, ir, ext, size }
    }
}

impl Default for ReportingMode {
    fn default() -> Self {
        Self::Core
    }
}

/// Byte offsets of each field group inside a data report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub core: usize,
    pub accel: usize,
    pub ir: usize,
    pub ext: usize,
    /// Total packet length
    pub size: usize,
}

impl ReportLayout {
    pub fn has_accel(&self) -> bool {
        self.accel != 0
    }

    pub fn has_ir(&self) -> bool {
        self.ir != 0
    }

    pub fn has_ext(&self) -> bool {
        self.ext != 0
    }

    /// Bytes available to the IR field before the next field starts
    pub fn ir_len(&self) -> usize {
        if !self.has_ir() {
            return 0;
        }
        let end = if self.has_ext() { self.ext } else { self.size };
        end - self.ir
    }

    /// Bytes available to the extension field
    pub fn ext_len(&self) -> usize {
        if self.has_ext() {
            self.size - self.ext
        } else {
            0
        }
    }
}

// ============================================================================
// Buttons
// ============================================================================

pub const PAD_LEFT: u16 = 0x0001;
pub const PAD_RIGHT: u16 = 0x0002;
pub const PAD_DOWN: u16 = 0x0004;
pub const PAD_UP: u16 = 0x0008;
pub const BUTTON_PLUS: u16 = 0x0010;
pub const BUTTON_TWO: u16 = 0x0100;
pub const BUTTON_ONE: u16 = 0x0200;
pub const BUTTON_B: u16 = 0x0400;
pub const BUTTON_A: u16 = 0x0800;
pub const BUTTON_MINUS: u16 = 0x1000;
pub const BUTTON_HOME: u16 = 0x8000;

/// Bits of the core button word that carry accelerometer precision instead of buttons
pub const ACCEL_X_LSB_MASK: u16 = 0x0060;
pub const ACCEL_Y_LSB_MASK: u16 = 0x2000;
pub const ACCEL_Z_LSB_MASK: u16 = 0x4000;

/// Generic button states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buttons {
    pub a: bool,
    pub b: bool,
    pub one: bool,
    pub two: bool,
    pub plus: bool,
    pub minus: bool,
    pub home: bool,

    // D-pad
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Buttons {
    /// Pack into the core button word.
    ///
    /// When held sideways the d-pad is rotated a quarter turn so that
    /// "up" on the pad reads as "right" to the host.
    pub fn to_bits(&self, sideways: bool) -> u16 {
        let mut bits = 0;
        for (pressed, mask) in [
            (self.a, BUTTON_A),
            (self.b, BUTTON_B),
            (self.one, BUTTON_ONE),
            (self.two, BUTTON_TWO),
            (self.minus, BUTTON_MINUS),
            (self.plus, BUTTON_PLUS),
            (self.home, BUTTON_HOME),
        ] {
            if pressed {
                bits |= mask;
            }
        }

        let dpad = if sideways {
            [PAD_RIGHT, PAD_LEFT, PAD_UP, PAD_DOWN]
        } else {
            [PAD_UP, PAD_DOWN, PAD_LEFT, PAD_RIGHT]
        };
        for (pressed, mask) in [self.up, self.down, self.left, self.right].into_iter().zip(dpad) {
            if pressed {
                bits |= mask;
            }
        }

        bits
    }

    pub fn any(&self) -> bool {
        self.to_bits(false) != 0
    }
}

// ============================================================================
// Motion Input
// ============================================================================

/// Accelerometer data (linear acceleration in Gs)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Accelerometer {
    /// Resting flat: gravity on +Z
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 1.0 }
    }
}

impl Accelerometer {
    pub fn axis(&self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn set_axis(&mut self, index: usize, value: f64) {
        match index {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
    }
}

/// Where the remote points at the sensor bar (normalized -1.0 to 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IrPointer {
    /// Horizontal (-1.0 = left, 1.0 = right)
    pub x: f64,

    /// Vertical (-1.0 = down, 1.0 = up)
    pub y: f64,

    /// Distance offset; positive moves the LEDs apart
    pub z: f64,
}

/// Everything the input source provides for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerInput {
    pub buttons: Buttons,
    pub accel: Accelerometer,
    pub ir: IrPointer,
    /// Per-axis (X, Y, Z) shake requests
    pub shake: [bool; 3],
    /// Raw battery byte, 0x00-0xFF
    pub battery: u8,
}

impl Default for ControllerInput {
    fn default() -> Self {
        Self {
            buttons: Buttons::default(),
            accel: Accelerometer::default(),
            ir: IrPointer::default(),
            shake: [false; 3],
            battery: DEFAULT_BATTERY,
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Coarse battery level the host UI displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatteryLevel {
    Critical = 1,
    Low = 2,
    Medium = 3,
    Full = 4,
}

impl BatteryLevel {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00..=0x32 => BatteryLevel::Critical,
            0x33..=0x43 => BatteryLevel::Low,
            0x44..=0x54 => BatteryLevel::Medium,
            _ => BatteryLevel::Full,
        }
    }
}

/// Device status summary, sent as the 0x20 status report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub buttons: u16,
    pub extension: bool,
    pub speaker: bool,
    pub ir: bool,
    /// Player LEDs, low 4 bits
    pub leds: u8,
    /// Raw battery byte
    pub battery: u8,
}

impl Status {
    pub fn battery_level(&self) -> BatteryLevel {
        BatteryLevel::from_raw(self.battery)
    }

    /// Status report packet.
    ///
    /// | Offset | Content |
    /// |--------|---------|
    /// | 0-1    | preamble, 0x20 |
    /// | 2-3    | buttons (LE) |
    /// | 4      | bit0 battery low, bit1 extension, bit2 speaker, bit3 IR, bits4-7 LEDs |
    /// | 5-6    | reserved |
    /// | 7      | battery |
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut flags = (self.leds & 0x0F) << 4;
        if self.battery_level() == BatteryLevel::Critical {
            flags |= 0x01;
        }
        if self.extension {
            flags |= 0x02;
        }
        if self.speaker {
            flags |= 0x04;
        }
        if self.ir {
            flags |= 0x08;
        }

        let [lo, hi] = self.buttons.to_le_bytes();
        [INPUT_REPORT_PREAMBLE, RT_STATUS_REPORT, lo, hi, flags, 0, 0, self.battery]
    }
}

// ============================================================================
// Outbound Packets
// ============================================================================

/// Acknowledgment of an output report (0x22)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub buttons: u16,
    pub report_id: u8,
    pub error: u8,
}

impl Ack {
    /// `A1 22 <buttons LE> <report id> <error>`
    pub fn to_bytes(&self) -> [u8; 6] {
        let [lo, hi] = self.buttons.to_le_bytes();
        [INPUT_REPORT_PREAMBLE, RT_ACK_DATA, lo, hi, self.report_id, self.error]
    }
}

/// One chunk of a register read (0x21)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDataReply {
    pub buttons: u16,
    /// Address of the first byte in this chunk, as the host sent it
    pub address: u32,
    /// `None` signals a read error
    pub data: Option<Vec<u8>>,
}

impl ReadDataReply {
    /// Read-data reply packet.
    ///
    /// | Offset | Content |
    /// |--------|---------|
    /// | 0-1    | preamble, 0x21 |
    /// | 2-3    | buttons (LE) |
    /// | 4      | high nibble size-1, low nibble error |
    /// | 5-6    | low 16 address bits (BE) |
    /// | 7-22   | data, zero padded |
    pub fn to_bytes(&self) -> [u8; MAX_PAYLOAD] {
        let mut packet = [0u8; MAX_PAYLOAD];
        packet[0] = INPUT_REPORT_PREAMBLE;
        packet[1] = RT_READ_DATA_REPLY;
        packet[2..4].copy_from_slice(&self.buttons.to_le_bytes());
        packet[5..7].copy_from_slice(&(self.address as u16).to_be_bytes());

        match &self.data {
            Some(data) if !data.is_empty() => {
                let amount = data.len().min(MAX_TRANSFER);
                packet[4] = ((amount - 1) as u8) << 4;
                packet[7..7 + amount].copy_from_slice(&data[..amount]);
            }
            _ => {
                packet[4] = (READ_ERROR_SIZE_NIBBLE << 4) | READ_ERROR_OUT_OF_BOUNDS;
            }
        }

        packet
    }

    /// Decode the packed size nibble (byte count minus one) and error nibble
    pub fn unpack_size_error(byte: u8) -> (u8, u8) {
        (byte >> 4, byte & 0x0F)
    }
}

/// A packet the device sends to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReport {
    Ack(Ack),
    Status(Status),
    ReadReply(ReadDataReply),
    /// SET_REPORT handshake on the control channel
    Handshake(u8),
    /// Periodic data report, already laid out per reporting mode
    Data(Vec<u8>),
}

impl InputReport {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            InputReport::Ack(ack) => ack.to_bytes().to_vec(),
            InputReport::Status(status) => status.to_bytes().to_vec(),
            InputReport::ReadReply(reply) => reply.to_bytes().to_vec(),
            InputReport::Handshake(result) => vec![(HID_TYPE_HANDSHAKE << 4) | result],
            InputReport::Data(data) => data.clone(),
        }
    }
}
