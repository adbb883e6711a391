//! Mock transport for testing.
//!
//! This backend logs outgoing packets instead of putting them on a link,
//! and records them so tests can assert on exactly what the host would
//! have received.

use log::info;
use std::sync::{Arc, Mutex};

use crate::backend::{BackendError, Transport};

/// One packet handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub slot: usize,
    pub channel: u16,
    pub data: Vec<u8>,
}

/// Mock transport that logs and records packets instead of sending them.
///
/// Clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentPacket>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first
    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove and return everything sent so far
    pub fn take(&self) -> Vec<SentPacket> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MockTransport {
    fn send(&self, slot: usize, channel: u16, packet: &[u8]) -> Result<(), BackendError> {
        info!("[MOCK TRANSPORT] slot {} channel {}: {:02X?}", slot, channel, packet);
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentPacket { slot, channel, data: packet.to_vec() });
        Ok(())
    }
}
