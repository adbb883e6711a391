//! Device save states
//!
//! A snapshot is the complete `DeviceState` encoded as JSON: flags, mode,
//! channel, sensor filter and shake state, status, ADPCM state, extension
//! key, every register region and the pending read requests with their
//! buffers. Restoring validates the buffers before the state is accepted.

use thiserror::Error;

use crate::wiimote::device::DeviceState;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

pub fn save(state: &DeviceState) -> Result<Vec<u8>, SnapshotError> {
    Ok(serde_json::to_vec(state)?)
}

pub fn restore(bytes: &[u8]) -> Result<DeviceState, SnapshotError> {
    let state: DeviceState = serde_json::from_slice(bytes)?;
    validate(&state)?;
    Ok(state)
}

fn validate(state: &DeviceState) -> Result<(), SnapshotError> {
    state.registers.validate().map_err(SnapshotError::Corrupt)?;

    if let Some(request) = state.read_queue.iter().find(|r| !r.is_consistent()) {
        return Err(SnapshotError::Corrupt(format!(
            "read request at 0x{:06X}: position {} + size {} does not match {} buffered bytes",
            request.address,
            request.position,
            request.size,
            request.data.len()
        )));
    }
    Ok(())
}
