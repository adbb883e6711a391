//! Pending register reads
//!
//! A read command can ask for up to 64 KiB but each reply packet carries at
//! most 16 bytes, so reads are queued and drained one chunk per tick in the
//! order they arrived.

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::wiimote::constants::MAX_TRANSFER;

/// One register read being served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Address of the next chunk, as the host addressed it
    pub address: u32,
    /// Bytes still to send
    pub size: usize,
    /// Bytes already sent
    pub position: usize,
    pub data: Vec<u8>,
}

impl ReadRequest {
    pub fn new(address: u32, data: Vec<u8>) -> Self {
        Self { address, size: data.len(), position: 0, data }
    }

    /// A zero-length request answers with a read error
    pub fn is_error(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot consistency: cursor + remaining always equals the buffer length
    pub fn is_consistent(&self) -> bool {
        self.position.checked_add(self.size) == Some(self.data.len())
    }
}

/// What a queue step produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    pub address: u32,
    /// `None` for a read error reply
    pub data: Option<Vec<u8>>,
}

/// FIFO of pending reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequestQueue {
    requests: VecDeque<ReadRequest>,
}

impl ReadRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a read of `data` (already copied out of the register file).
    /// Empty data still queues, and produces one error reply.
    pub fn enqueue(&mut self, address: u32, data: Vec<u8>) {
        trace!("Queued read of {} bytes at 0x{:06X}", data.len(), address);
        self.requests.push_back(ReadRequest::new(address, data));
    }

    /// Produce the next chunk of the oldest request, popping it once drained
    pub fn step(&mut self) -> Option<ReadChunk> {
        let request = self.requests.front_mut()?;

        if request.is_error() {
            let address = request.address;
            self.requests.pop_front();
            return Some(ReadChunk { address, data: None });
        }

        let amount = request.size.min(MAX_TRANSFER);
        let chunk = ReadChunk {
            address: request.address,
            data: Some(request.data[request.position..request.position + amount].to_vec()),
        };

        request.size -= amount;
        request.position += amount;
        request.address = request.address.wrapping_add(amount as u32);

        if request.size == 0 {
            self.requests.pop_front();
        }

        Some(chunk)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Drop every pending request, releasing the buffers
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadRequest> {
        self.requests.iter()
    }
}
