//! wiimote-emu: Wii Remote protocol emulator
//!
//! This library emulates the host-facing side of a Wii Remote: its register
//! file, its output report handling and its periodic input reports, driven
//! by pluggable transport, input and storage backends.

pub mod backend;
pub mod config;
pub mod manager;
pub mod wiimote;

// Re-export commonly used items
pub use backend::{InputSource, MiiStorage, Transport};
pub use config::{Config, Settings};
pub use manager::{ChannelKind, EmulatorManager, InboundPacket};
pub use wiimote::{ControllerInput, ReportingMode, Wiimote};
