//! Wii Remote protocol constants
//!
//! This module contains all the constants needed to emulate the Wii Remote link:
//! - HID transaction header values
//! - Output (host -> remote) and input (remote -> host) report IDs
//! - Register file sizes and address map
//! - Factory calibration blocks copied into EEPROM on reset

// ============================================================================
// HID Transaction Header
// ============================================================================

/// HANDSHAKE transaction type (high nibble of the header byte)
pub const HID_TYPE_HANDSHAKE: u8 = 0x0;

/// SET_REPORT transaction type, used on the control channel
pub const HID_TYPE_SET_REPORT: u8 = 0x5;

/// DATA transaction type, used on the interrupt channel
pub const HID_TYPE_DATA: u8 = 0xA;

/// Parameter: report travels remote -> host
pub const HID_PARAM_INPUT: u8 = 0x1;

/// Parameter: report travels host -> remote
pub const HID_PARAM_OUTPUT: u8 = 0x2;

/// Handshake result sent back after a SET_REPORT
pub const HID_HANDSHAKE_SUCCESS: u8 = 0x0;

/// First byte of every packet we send (DATA | INPUT)
pub const INPUT_REPORT_PREAMBLE: u8 = (HID_TYPE_DATA << 4) | HID_PARAM_INPUT;

/// Channel ID the host uses to signal that the remote was disconnected
pub const DISCONNECT_CHANNEL: u16 = 99;

// ============================================================================
// Output Reports (host -> remote)
// ============================================================================

pub const RT_RUMBLE: u8 = 0x10;
pub const RT_LEDS: u8 = 0x11;
pub const RT_REPORT_MODE: u8 = 0x12;
pub const RT_IR_PIXEL_CLOCK: u8 = 0x13;
pub const RT_SPEAKER_ENABLE: u8 = 0x14;
pub const RT_REQUEST_STATUS: u8 = 0x15;
pub const RT_WRITE_DATA: u8 = 0x16;
pub const RT_READ_DATA: u8 = 0x17;
pub const RT_WRITE_SPEAKER_DATA: u8 = 0x18;
pub const RT_SPEAKER_MUTE: u8 = 0x19;
pub const RT_IR_LOGIC: u8 = 0x1A;

/// Flag bit shared by every output report: rumble motor on
pub const FLAG_RUMBLE: u8 = 0x01;

/// Flag bit: host wants an acknowledgment for this report
pub const FLAG_ACK: u8 = 0x02;

/// Flag bit: enable the addressed feature (speaker, IR logic, mute...)
pub const FLAG_ENABLE: u8 = 0x04;

/// Flag bit in the report mode command: keep sending data reports
pub const FLAG_CONTINUOUS: u8 = 0x02;

// ============================================================================
// Input Reports (remote -> host)
// ============================================================================

pub const RT_STATUS_REPORT: u8 = 0x20;
pub const RT_READ_DATA_REPLY: u8 = 0x21;
pub const RT_ACK_DATA: u8 = 0x22;

/// Largest input report we ever build (preamble + 21 payload bytes)
pub const MAX_PAYLOAD: usize = 23;

/// Register writes and read-reply chunks carry at most this many bytes
pub const MAX_TRANSFER: usize = 16;

/// Speaker data reports carry at most this many sample bytes
pub const MAX_SPEAKER_DATA: usize = 20;

/// Read-reply error code for reads of reserved or unmapped memory
pub const READ_ERROR_OUT_OF_BOUNDS: u8 = 0x08;

/// Size nibble the remote reports together with a read error
pub const READ_ERROR_SIZE_NIBBLE: u8 = 0x0F;

// ============================================================================
// Register File
// ============================================================================

pub const EEPROM_SIZE: usize = 16 * 1024;

/// End of the freely readable EEPROM area; anything past it is reserved
pub const EEPROM_FREE_SIZE: usize = 0x1700;

pub const REG_SPEAKER_SIZE: usize = 10;
pub const REG_EXT_SIZE: usize = 0x100;
pub const REG_IR_SIZE: usize = 0x34;

/// Address spaces selected by the write/read command flags
pub const SPACE_EEPROM: u8 = 0;
pub const SPACE_REGS1: u8 = 1;
pub const SPACE_REGS2: u8 = 2;

/// Upper address byte of each control register block
pub const REG_BLOCK_SPEAKER: u32 = 0xA2;
pub const REG_BLOCK_EXTENSION: u32 = 0xA4;
pub const REG_BLOCK_IR: u32 = 0xB0;

/// Bit the host may set in any register address; the remote ignores it
pub const ADDRESS_IGNORED_BIT: u32 = 0x01_0000;

/// Mii data block inside the EEPROM (persisted by an external store)
pub const MII_BLOCK_START: usize = 0x0FCA;
pub const MII_BLOCK_END: usize = 0x12C0;

// Extension register layout
pub const EXT_ENCRYPTION_KEY: usize = 0x40;
pub const EXT_KEY_WINDOW_LEN: usize = 12;
pub const EXT_ENCRYPTION: usize = 0xF0;

/// Value of the encryption byte that turns on encrypted extension reads
pub const EXT_ENCRYPTION_ENABLED: u8 = 0xAA;

// IR register layout
pub const IR_ENABLE_OFFSET: usize = 0x30;
pub const IR_MODE_OFFSET: usize = 0x33;

pub const IR_MODE_BASIC: u8 = 1;
pub const IR_MODE_EXTENDED: u8 = 3;
pub const IR_MODE_FULL: u8 = 5;

// Speaker register layout
pub const SPEAKER_FORMAT: usize = 0x02;
pub const SPEAKER_SAMPLE_RATE: usize = 0x03;
pub const SPEAKER_VOLUME: usize = 0x05;
pub const SPEAKER_PLAY: usize = 0x08;

// ============================================================================
// Sensors
// ============================================================================

/// Accelerometer reading for 0 g on an axis (8-bit scale)
pub const ACCEL_ZERO_G: u8 = 0x80;

/// Accelerometer reading for 1 g on an axis (8-bit scale)
pub const ACCEL_ONE_G: u8 = 0x9A;

pub const ACCEL_RANGE: u8 = ACCEL_ONE_G - ACCEL_ZERO_G;

/// Accelerometer values carry 10 bits once the low bits are folded in
pub const ACCEL_MAX: i32 = 0x3FF;

pub const CAMERA_WIDTH: u16 = 1024;
pub const CAMERA_HEIGHT: u16 = 768;

/// Raw battery byte reported after a reset
pub const DEFAULT_BATTERY: u8 = 0x66;

// ============================================================================
// Factory Calibration
// ============================================================================

/// IR and accelerometer calibration, copied to EEPROM offset 0.
/// The IR checksum bytes are zeroed; the accelerometer ones are required.
#[rustfmt::skip]
pub const EEPROM_CALIBRATION: [u8; 42] = [
    // IR
    0xA1, 0xAA, 0x8B, 0x99, 0xAE, 0x9E, 0x78, 0x30, 0xA7, 0x00, 0x00,
    0xA1, 0xAA, 0x8B, 0x99, 0xAE, 0x9E, 0x78, 0x30, 0xA7, 0x00, 0x00,
    // Accelerometer
    ACCEL_ZERO_G, ACCEL_ZERO_G, ACCEL_ZERO_G, 0, ACCEL_ONE_G, ACCEL_ONE_G, ACCEL_ONE_G, 0, 0, 0xA3,
    ACCEL_ZERO_G, ACCEL_ZERO_G, ACCEL_ZERO_G, 0, ACCEL_ONE_G, ACCEL_ONE_G, ACCEL_ONE_G, 0, 0, 0xA3,
];

pub const EEPROM_BLOCK_16D0_OFFSET: usize = 0x16D0;

/// Constant block at EEPROM 0x16D0, present on every retail remote
pub const EEPROM_BLOCK_16D0: [u8; 24] = [
    0x00, 0x00, 0x00, 0xFF, 0x11, 0xEE, 0x00, 0x00, 0x33, 0xCC, 0x44, 0xBB, 0x00, 0x00, 0x66, 0x99,
    0x77, 0x88, 0x00, 0x00, 0x2B, 0x01, 0xE8, 0x13,
];

// ============================================================================
// Timing
// ============================================================================

/// Ticks per second the host expects data reports at
pub const DEFAULT_TICK_RATE_HZ: u32 = 200;

/// Number of controller slots
pub const MAX_WIIMOTES: usize = 4;
