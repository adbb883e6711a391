//! Output report handling
//!
//! Host commands are decoded once into [`OutputCommand`] and then applied to
//! the device state. Each command may produce one immediate reply
//! (acknowledgment or status report); register reads are queued and served
//! by the tick loop instead.
//!
//! Output report layout (after the HID header byte):
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0      | report ID (0x10-0x1A) |
//! | 1      | flags: bit0 rumble, bit1 ack requested, bit2 enable |
//! | 2..    | command specific |

use log::{debug, error, trace, warn};
use thiserror::Error;

use crate::backend::MiiStorage;
use crate::wiimote::constants::*;
use crate::wiimote::device::DeviceState;
use crate::wiimote::registers::{decode_address, Region, RegisterError};
use crate::wiimote::types::{Ack, InputReport, ReportingMode, Status};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown output report 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("Unsupported reporting mode 0x{0:02X}")]
    UnsupportedReportingMode(u8),

    #[error("Write of {0} bytes exceeds the 16 byte limit")]
    WriteTooLarge(u8),

    #[error("Speaker data of {0} bytes exceeds the 20 byte limit")]
    SpeakerDataTooLarge(u8),

    #[error("Output report 0x{command:02X} truncated to {len} bytes")]
    Truncated { command: u8, len: usize },

    #[error("Unexpected HID packet type 0x{kind:X} with parameter 0x{param:X}")]
    UnknownPacketType { kind: u8, param: u8 },

    #[error(transparent)]
    Register(#[from] RegisterError),
}

/// Decoded body of an output report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputReport {
    Rumble,
    Leds { leds: u8 },
    ReportMode { continuous: bool, mode: u8 },
    IrPixelClock { enable: bool },
    SpeakerEnable { enable: bool },
    RequestStatus,
    WriteData { space: u8, address: u32, data: Vec<u8> },
    ReadData { space: u8, address: u32, size: u16 },
    SpeakerData { data: Vec<u8> },
    SpeakerMute { enable: bool },
    IrLogic { enable: bool },
}

/// One host command with its shared flag bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCommand {
    pub report_id: u8,
    pub rumble: bool,
    /// Host asked for an acknowledgment (only honored by ack-optional commands)
    pub ack: bool,
    pub report: OutputReport,
}

fn require(bytes: &[u8], len: usize) -> Result<(), ProtocolError> {
    if bytes.len() < len {
        return Err(ProtocolError::Truncated {
            command: bytes.first().copied().unwrap_or(0),
            len: bytes.len(),
        });
    }
    Ok(())
}

fn be24(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

impl OutputCommand {
    /// Decode an output report body (HID header already stripped)
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        require(bytes, 2)?;
        let report_id = bytes[0];
        let flags = bytes[1];
        let enable = flags & FLAG_ENABLE != 0;

        let report = match report_id {
            RT_RUMBLE => OutputReport::Rumble,
            RT_LEDS => OutputReport::Leds { leds: flags >> 4 },
            RT_REPORT_MODE => {
                require(bytes, 3)?;
                OutputReport::ReportMode {
                    continuous: flags & FLAG_CONTINUOUS != 0,
                    mode: bytes[2],
                }
            }
            RT_IR_PIXEL_CLOCK => OutputReport::IrPixelClock { enable },
            RT_SPEAKER_ENABLE => OutputReport::SpeakerEnable { enable },
            RT_REQUEST_STATUS => OutputReport::RequestStatus,
            RT_WRITE_DATA => {
                require(bytes, 6)?;
                let size = bytes[5];
                if usize::from(size) > MAX_TRANSFER {
                    return Err(ProtocolError::WriteTooLarge(size));
                }
                require(bytes, 6 + usize::from(size))?;
                OutputReport::WriteData {
                    space: (flags >> 1) & 0x3,
                    address: be24(&bytes[2..5]),
                    data: bytes[6..6 + usize::from(size)].to_vec(),
                }
            }
            RT_READ_DATA => {
                require(bytes, 7)?;
                OutputReport::ReadData {
                    space: (flags >> 1) & 0x3,
                    address: be24(&bytes[2..5]),
                    size: u16::from_be_bytes([bytes[5], bytes[6]]),
                }
            }
            RT_WRITE_SPEAKER_DATA => {
                let len = flags >> 3;
                if usize::from(len) > MAX_SPEAKER_DATA {
                    return Err(ProtocolError::SpeakerDataTooLarge(len));
                }
                require(bytes, 2 + usize::from(len))?;
                OutputReport::SpeakerData { data: bytes[2..2 + usize::from(len)].to_vec() }
            }
            RT_SPEAKER_MUTE => OutputReport::SpeakerMute { enable },
            RT_IR_LOGIC => OutputReport::IrLogic { enable },
            other => return Err(ProtocolError::UnknownCommand(other)),
        };

        Ok(Self { report_id, rumble: flags & FLAG_RUMBLE != 0, ack: flags & FLAG_ACK != 0, report })
    }
}

/// Apply a raw output report to the device.
///
/// The rumble bit is latched from every report that carries a flags byte,
/// even one that then fails to decode. Failures are logged on the error
/// channel and returned; none of them leave the state half-updated.
pub fn handle_output_report(
    state: &mut DeviceState,
    bytes: &[u8],
    storage: &mut dyn MiiStorage,
) -> Result<Option<InputReport>, ProtocolError> {
    if let Some(flags) = bytes.get(1) {
        state.rumble = flags & FLAG_RUMBLE != 0;
    }

    let result = OutputCommand::parse(bytes).and_then(|command| dispatch(state, &command, storage));
    if let Err(e) = &result {
        error!("Wiimote {}: {}", state.index + 1, e);
    }
    result
}

/// Apply one decoded command
pub fn dispatch(
    state: &mut DeviceState,
    command: &OutputCommand,
    storage: &mut dyn MiiStorage,
) -> Result<Option<InputReport>, ProtocolError> {
    debug!("Wiimote {}: output report {:?}", state.index + 1, command.report);
    state.rumble = command.rumble;

    let acknowledge = match &command.report {
        OutputReport::Rumble => false,
        OutputReport::Leds { leds } => {
            state.status.leds = *leds;
            true
        }
        OutputReport::ReportMode { continuous, mode } => {
            let mode = ReportingMode::from_id(*mode)
                .ok_or(ProtocolError::UnsupportedReportingMode(*mode))?;
            state.mode = mode;
            state.auto_report = *continuous;
            true
        }
        OutputReport::IrPixelClock { .. } => command.ack,
        OutputReport::SpeakerEnable { enable } => {
            state.status.speaker = *enable;
            command.ack
        }
        OutputReport::RequestStatus => {
            return Ok(Some(InputReport::Status(request_status(state))));
        }
        OutputReport::WriteData { space, address, data } => {
            write_data(state, *space, *address, data, storage);
            true
        }
        OutputReport::ReadData { space, address, size } => {
            read_data(state, *space, *address, *size, storage);
            false
        }
        OutputReport::SpeakerData { data } => {
            if !state.speaker_mute {
                trace!("Wiimote {}: {} speaker bytes consumed", state.index + 1, data.len());
            }
            false
        }
        OutputReport::SpeakerMute { enable } => {
            state.speaker_mute = *enable;
            command.ack
        }
        OutputReport::IrLogic { enable } => {
            state.status.ir = *enable;
            command.ack
        }
    };

    Ok(acknowledge.then(|| {
        InputReport::Ack(Ack {
            buttons: state.status.buttons,
            report_id: command.report_id,
            error: 0,
        })
    }))
}

/// Refresh and return the status summary. No extension is ever attached.
pub fn request_status(state: &mut DeviceState) -> Status {
    state.status.extension = false;
    state.status
}

fn in_mii_block(region: Region, offset: usize) -> bool {
    region == Region::Eeprom && (MII_BLOCK_START..MII_BLOCK_END).contains(&offset)
}

fn write_data(
    state: &mut DeviceState,
    space: u8,
    address: u32,
    data: &[u8],
    storage: &mut dyn MiiStorage,
) {
    let target = match decode_address(space, address) {
        Ok(target) => target,
        Err(e) => {
            warn!("Wiimote {}: write ignored: {}", state.index + 1, e);
            return;
        }
    };

    let range = match state.registers.write(target.region, target.offset, data) {
        Ok(range) => range,
        Err(e) => {
            warn!("Wiimote {}: write rejected: {}", state.index + 1, e);
            return;
        }
    };

    match target.region {
        Region::Eeprom if in_mii_block(target.region, target.offset) => {
            if let Err(e) = storage.save(state.registers.mii_block()) {
                warn!("Wiimote {}: failed to store Mii block: {}", state.index + 1, e);
            }
        }
        Region::Extension => {
            if state.encryption.on_write(range, state.registers.extension_key()) {
                debug!(
                    "Wiimote {}: extension key regenerated (generation {})",
                    state.index + 1,
                    state.encryption.generation()
                );
            }
        }
        _ => {}
    }
}

fn load_mii_block(state: &mut DeviceState, storage: &mut dyn MiiStorage) {
    match storage.load() {
        Ok(Some(block)) if block.len() == MII_BLOCK_END - MII_BLOCK_START => {
            state.registers.mii_block_mut().copy_from_slice(&block);
        }
        Ok(Some(block)) => {
            warn!(
                "Wiimote {}: stored Mii block has {} bytes, ignoring",
                state.index + 1,
                block.len()
            );
        }
        Ok(None) => {}
        Err(e) => warn!("Wiimote {}: failed to load Mii block: {}", state.index + 1, e),
    }
}

/// Copy the requested bytes and queue them. Any failure queues an empty
/// request, which the tick loop turns into an error reply.
fn read_data(
    state: &mut DeviceState,
    space: u8,
    address: u32,
    size: u16,
    storage: &mut dyn MiiStorage,
) {
    let size = usize::from(size);

    let data = match decode_address(space, address) {
        Err(e) => {
            warn!("Wiimote {}: read of unmapped memory: {}", state.index + 1, e);
            Vec::new()
        }
        Ok(target) if target.region == Region::Eeprom => {
            if target.offset + size > EEPROM_FREE_SIZE {
                debug!("Wiimote {}: EEPROM read past 0x{:04X}", state.index + 1, EEPROM_FREE_SIZE);
                Vec::new()
            } else {
                if in_mii_block(target.region, target.offset) {
                    load_mii_block(state, storage);
                }
                state
                    .registers
                    .read(target.region, target.offset, size)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            }
        }
        Ok(target) => match state.registers.read(target.region, target.offset, size) {
            Ok(bytes) => {
                let mut bytes = bytes.to_vec();
                if target.region == Region::Extension && state.registers.extension_encrypted() {
                    state.encryption.transform(&mut bytes, target.offset);
                }
                bytes
            }
            Err(e) => {
                warn!("Wiimote {}: {}", state.index + 1, e);
                Vec::new()
            }
        },
    };

    // Replies echo the address as the host sent it
    state.read_queue.enqueue(address, data);
}
