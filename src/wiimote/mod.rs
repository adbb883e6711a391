//! Wii Remote protocol emulation
//!
//! This module provides the complete emulated remote:
//! - Register file and extension encryption
//! - Output report decoding and dispatch
//! - Chunked register reads
//! - Accelerometer and IR camera simulation
//! - Data report assembly and the per-tick report loop

pub mod constants;
pub mod types;
pub mod registers;
pub mod encryption;
pub mod read_queue;
pub mod sensors;
pub mod dispatcher;
pub mod report;
pub mod device;
pub mod snapshot;

// Re-export commonly used items
pub use constants::*;
pub use types::*;
pub use device::{AdpcmState, DeviceState, Wiimote};
pub use dispatcher::{OutputCommand, OutputReport, ProtocolError};
pub use encryption::{ExtensionEncryption, ExtensionKey};
pub use read_queue::{ReadChunk, ReadRequest, ReadRequestQueue};
pub use registers::{Region, RegisterError, RegisterFile};
pub use sensors::SensorSimulator;
pub use snapshot::SnapshotError;
