//! Accelerometer and IR camera simulation
//!
//! Turns normalized motion input into the byte fields of a data report:
//! 10-bit accelerometer samples and IR camera dot positions.

use log::warn;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::wiimote::constants::*;
use crate::wiimote::types::{
    Accelerometer, ControllerInput, IrPointer, ACCEL_X_LSB_MASK, ACCEL_Y_LSB_MASK, ACCEL_Z_LSB_MASK,
};

/// Frames per up/down shake cycle
const SHAKE_STEP_MAX: u8 = 15;

const LOW_PASS_CUTOFF_HZ: f64 = 5.0;

/// Period of one data report at the host's 60 Hz poll rate
const FILTER_PERIOD: f64 = 1.0 / 60.0;

// Camera view bounds, in projected units
const BOUND_UP: f64 = -0.315447;
const BOUND_DOWN: f64 = 0.85;
const BOUND_LEFT: f64 = 0.78820266;
const BOUND_RIGHT: f64 = -0.78820266;

/// Half-spacing of the inner and outer LED pairs of the sensor bar
const LED_DISTANCE_INNER: f64 = 100.0 / CAMERA_WIDTH as f64;
const LED_DISTANCE_OUTER: f64 = 1.2 * LED_DISTANCE_INNER;

/// Dot size reported in extended IR mode
const IR_DOT_SIZE: u8 = 10;

/// Coordinate marking a dot the camera cannot see
pub const IR_INVALID: u16 = 0xFFFF;

pub const IR_BASIC_LEN: usize = 10;
pub const IR_EXTENDED_LEN: usize = 12;

/// One tracked IR dot in camera pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrDot {
    pub x: u16,
    pub y: u16,
}

impl IrDot {
    pub const INVALID: IrDot = IrDot { x: IR_INVALID, y: IR_INVALID };

    pub fn is_visible(&self) -> bool {
        self.x < CAMERA_WIDTH && self.y < CAMERA_HEIGHT
    }
}

fn low_pass(var: &mut f64, new_value: f64, period: f64) {
    let rc = 1.0 / LOW_PASS_CUTOFF_HZ;
    let alpha = period / (period + rc);
    *var = new_value * alpha + *var * (1.0 - alpha);
}

/// Clamp a normalized axis to the 10-bit sample range
pub fn accel_to_raw(value: f64) -> u16 {
    let raw = (4.0 * (value * f64::from(ACCEL_RANGE) + f64::from(ACCEL_ZERO_G))) as i32;
    raw.clamp(0, ACCEL_MAX) as u16
}

/// Motion state of one remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSimulator {
    accel: Accelerometer,

    // Low-pass filtered camera roll
    ir_sin: f64,
    ir_cos: f64,

    shake_step: [u8; 3],

    pub sensor_bar_on_top: bool,
    pub shake_intensity: f64,
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self {
            accel: Accelerometer::default(),
            ir_sin: 0.0,
            ir_cos: 1.0,
            shake_step: [0; 3],
            sensor_bar_on_top: true,
            shake_intensity: 1.0,
        }
    }
}

impl SensorSimulator {
    pub fn new(sensor_bar_on_top: bool, shake_intensity: f64) -> Self {
        Self { sensor_bar_on_top, shake_intensity, ..Default::default() }
    }

    pub fn accel(&self) -> &Accelerometer {
        &self.accel
    }

    pub fn shake_step(&self) -> [u8; 3] {
        self.shake_step
    }

    /// Take this tick's motion input, then overlay any requested shake
    ///
    /// A non-finite axis sample keeps the previous value for that axis.
    pub fn update(&mut self, input: &ControllerInput) {
        for axis in 0..3 {
            let value = input.accel.axis(axis);
            if value.is_finite() {
                self.accel.set_axis(axis, value);
            } else {
                warn!("Dropping non-finite accelerometer sample on axis {}", axis);
            }
        }

        for axis in 0..3 {
            if input.shake[axis] {
                let phase = TAU * f64::from(self.shake_step[axis]) / f64::from(SHAKE_STEP_MAX);
                self.accel.set_axis(axis, phase.sin() * self.shake_intensity);
                self.shake_step[axis] = (self.shake_step[axis] + 1) % SHAKE_STEP_MAX;
            } else {
                self.shake_step[axis] = 0;
            }
        }
    }

    /// Write the accelerometer field (3 bytes) and fold the low bits into
    /// the two core button bytes
    pub fn encode_accel(&self, core: &mut [u8], accel: &mut [u8]) {
        let x = accel_to_raw(self.accel.x);
        let y = accel_to_raw(self.accel.y);
        let z = accel_to_raw(self.accel.z);

        accel[0] = (x >> 2) as u8;
        accel[1] = (y >> 2) as u8;
        accel[2] = (z >> 2) as u8;

        let low = ((x & 0x3) << ACCEL_X_LSB_MASK.trailing_zeros()) & ACCEL_X_LSB_MASK
            | (((y >> 1) & 0x1) << ACCEL_Y_LSB_MASK.trailing_zeros()) & ACCEL_Y_LSB_MASK
            | (((z >> 1) & 0x1) << ACCEL_Z_LSB_MASK.trailing_zeros()) & ACCEL_Z_LSB_MASK;
        let [lo, hi] = low.to_le_bytes();
        core[0] |= lo;
        core[1] |= hi;
    }

    /// Project the four sensor bar LEDs into camera pixels.
    ///
    /// Roll comes from the accelerometer when the report carries it, and is
    /// low-pass filtered so the dots rotate smoothly.
    pub fn project_ir(&mut self, pointer: &IrPointer, use_accel: bool) -> [IrDot; 4] {
        let (mut nsin, mut ncos) = (0.0, 1.0);
        if use_accel {
            let (ax, az) = (self.accel.x, self.accel.z);
            let len = (ax * ax + az * az).sqrt();
            if len != 0.0 {
                nsin = ax / len;
                ncos = az / len;
            }
        }

        if nsin.is_finite() && ncos.is_finite() {
            low_pass(&mut self.ir_sin, nsin, FILTER_PERIOD);
            low_pass(&mut self.ir_cos, ncos, FILTER_PERIOD);
        }

        let center_x =
            pointer.x * (BOUND_RIGHT - BOUND_LEFT) / 2.0 + (BOUND_LEFT + BOUND_RIGHT) / 2.0;
        let center_y = if self.sensor_bar_on_top {
            pointer.y * (BOUND_UP - BOUND_DOWN) / 2.0 + (BOUND_UP + BOUND_DOWN) / 2.0
        } else {
            pointer.y * (BOUND_UP - BOUND_DOWN) / 2.0 - (BOUND_UP + BOUND_DOWN) / 2.0
        };

        let spread = pointer.z * 0.5 + 1.0;
        let offsets = [
            -spread * LED_DISTANCE_INNER,
            spread * LED_DISTANCE_INNER,
            -spread * LED_DISTANCE_OUTER,
            spread * LED_DISTANCE_OUTER,
        ];

        // Aspect scale composed with the roll rotation. The ratio is taken
        // in whole pixels, so it is 1.
        let aspect = f64::from(CAMERA_WIDTH / CAMERA_HEIGHT);
        let (sin, cos) = (self.ir_sin, self.ir_cos);

        let mut dots = [IrDot::INVALID; 4];
        for (dot, offset) in dots.iter_mut().zip(offsets) {
            let vx = center_x + offset;
            let vy = center_y;
            let x = cos * vx - sin * vy;
            let y = aspect * (sin * vx + cos * vy);

            if !(-1.0..=1.0).contains(&x) || !(-1.0..=1.0).contains(&y) {
                continue;
            }
            *dot = IrDot {
                x: ((x + 1.0) / 2.0 * f64::from(CAMERA_WIDTH - 1)).round() as u16,
                y: ((y + 1.0) / 2.0 * f64::from(CAMERA_HEIGHT - 1)).round() as u16,
            };
        }
        dots
    }

    /// Encode dots in the IR register's selected format. Returns false if the
    /// mode is unsupported or does not fit in `out`.
    pub fn encode_ir(dots: &[IrDot; 4], ir_mode: u8, out: &mut [u8]) -> bool {
        match ir_mode {
            IR_MODE_BASIC if out.len() >= IR_BASIC_LEN => {
                encode_ir_basic(dots, &mut out[..IR_BASIC_LEN]);
                true
            }
            IR_MODE_EXTENDED if out.len() >= IR_EXTENDED_LEN => {
                encode_ir_extended(dots, &mut out[..IR_EXTENDED_LEN]);
                true
            }
            IR_MODE_FULL => {
                warn!("Full IR format requested; not supported by this report layout");
                false
            }
            IR_MODE_BASIC | IR_MODE_EXTENDED => {
                warn!("IR mode {} does not fit in a {}-byte field", ir_mode, out.len());
                false
            }
            _ => false,
        }
    }
}

/// Two 5-byte blocks, each holding a pair of dots with shared high bits:
/// `x1 y1 [y1hi:2 x1hi:2 y2hi:2 x2hi:2] x2 y2`
fn encode_ir_basic(dots: &[IrDot; 4], out: &mut [u8]) {
    out.fill(0xFF);
    for (pair, block) in dots.chunks(2).zip(out.chunks_mut(5)) {
        let (first, second) = (pair[0], pair[1]);
        if first.is_visible() {
            block[0] = first.x as u8;
            block[1] = first.y as u8;
            block[2] = (block[2] & 0x0F)
                | (((first.x >> 8) & 0x3) as u8) << 4
                | (((first.y >> 8) & 0x3) as u8) << 6;
        }
        if second.is_visible() {
            block[3] = second.x as u8;
            block[4] = second.y as u8;
            block[2] = (block[2] & 0xF0)
                | ((second.x >> 8) & 0x3) as u8
                | (((second.y >> 8) & 0x3) as u8) << 2;
        }
    }
}

/// Four 3-byte blocks: `x y [yhi:2 xhi:2 size:4]`
fn encode_ir_extended(dots: &[IrDot; 4], out: &mut [u8]) {
    out.fill(0xFF);
    for (dot, block) in dots.iter().zip(out.chunks_mut(3)) {
        if dot.is_visible() {
            block[0] = dot.x as u8;
            block[1] = dot.y as u8;
            block[2] = IR_DOT_SIZE
                | (((dot.x >> 8) & 0x3) as u8) << 4
                | (((dot.y >> 8) & 0x3) as u8) << 6;
        }
    }
}
