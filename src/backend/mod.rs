//! Collaborator interfaces of the emulator
//!
//! The protocol core only knows three things about the outside world:
//! where to send packets, where button and motion input comes from, and
//! where the Mii block of the EEPROM is persisted.

pub mod mii_storage;
pub mod mock_input;
pub mod mock_transport;

pub use mii_storage::{FileMiiStorage, MemoryMiiStorage};
pub use mock_input::MockInputSource;
pub use mock_transport::{MockTransport, SentPacket};

use thiserror::Error;

use crate::wiimote::types::ControllerInput;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packet link to the host
pub trait Transport: Send + Sync {
    /// Send one input report to the host on `channel`
    fn send(&self, slot: usize, channel: u16, packet: &[u8]) -> Result<(), BackendError>;
}

/// Source of button and motion state, queried once per tick
pub trait InputSource: Send {
    fn poll(&mut self) -> ControllerInput;
}

/// External store for the Mii block of the EEPROM
pub trait MiiStorage: Send {
    /// Stored block, or `None` if nothing was saved yet
    fn load(&mut self) -> Result<Option<Vec<u8>>, BackendError>;

    fn save(&mut self, data: &[u8]) -> Result<(), BackendError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, slot: usize, channel: u16, packet: &[u8]) -> Result<(), BackendError> {
        (**self).send(slot, channel, packet)
    }
}

impl<I: InputSource + ?Sized> InputSource for Box<I> {
    fn poll(&mut self) -> ControllerInput {
        (**self).poll()
    }
}

impl<S: MiiStorage + ?Sized> MiiStorage for Box<S> {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).load()
    }

    fn save(&mut self, data: &[u8]) -> Result<(), BackendError> {
        (**self).save(data)
    }
}
