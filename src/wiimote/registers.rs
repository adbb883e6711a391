//! Wii Remote register file
//!
//! The remote exposes one 24-bit address space split into regions:
//!
//! | Space | Address Range | Content |
//! |-------|---------------|---------|
//! | EEPROM | 0x000000-0x003FFF | calibration, Mii block, free area up to 0x16FF |
//! | registers | 0xA2xxxx | speaker (10 bytes) |
//! | registers | 0xA4xxxx | extension (256 bytes, second byte ignored) |
//! | registers | 0xB0xxxx | IR camera (52 bytes) |
//!
//! Every access is bounds-checked against its region; a failing access never
//! touches memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

use crate::wiimote::constants::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("{region} access out of bounds: offset 0x{offset:04X}, length {len}")]
    OutOfBounds { region: Region, offset: usize, len: usize },

    #[error("No register mapped at address 0x{0:06X}")]
    UnmappedAddress(u32),
}

/// Memory regions of the register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Eeprom,
    Speaker,
    Extension,
    Ir,
}

impl Region {
    /// Declared size of the region in bytes
    pub const fn size(self) -> usize {
        match self {
            Region::Eeprom => EEPROM_SIZE,
            Region::Speaker => REG_SPEAKER_SIZE,
            Region::Extension => REG_EXT_SIZE,
            Region::Ir => REG_IR_SIZE,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Eeprom => "EEPROM",
            Region::Speaker => "speaker register",
            Region::Extension => "extension register",
            Region::Ir => "IR register",
        };
        f.write_str(name)
    }
}

/// A decoded register address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAddress {
    pub region: Region,
    pub offset: usize,
    /// Address after masking, used for encryption positions
    pub effective: u32,
}

/// Map a (space, 24-bit address) pair from a read/write command to a region.
///
/// Bit 0x010000 is ignored everywhere. In the extension block the second
/// address byte is ignored too, so 0xA4xxYY aliases 0xA400YY.
pub fn decode_address(space: u8, address: u32) -> Result<RegisterAddress, RegisterError> {
    let mut address = address & 0x00FF_FFFF & !ADDRESS_IGNORED_BIT;

    match space {
        SPACE_EEPROM => Ok(RegisterAddress {
            region: Region::Eeprom,
            offset: address as usize,
            effective: address,
        }),
        SPACE_REGS1 | SPACE_REGS2 => {
            if address >> 16 == REG_BLOCK_EXTENSION {
                address &= 0xFF_00FF;
            }
            let region = match address >> 16 {
                REG_BLOCK_SPEAKER => Region::Speaker,
                REG_BLOCK_EXTENSION => Region::Extension,
                REG_BLOCK_IR => Region::Ir,
                _ => return Err(RegisterError::UnmappedAddress(address)),
            };
            Ok(RegisterAddress {
                region,
                offset: (address & 0xFF) as usize,
                effective: address,
            })
        }
        _ => Err(RegisterError::UnmappedAddress(address)),
    }
}

/// Address-mapped memory of one remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    eeprom: Vec<u8>,
    speaker: Vec<u8>,
    extension: Vec<u8>,
    ir: Vec<u8>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut registers = Self {
            eeprom: vec![0; EEPROM_SIZE],
            speaker: vec![0; REG_SPEAKER_SIZE],
            extension: vec![0; REG_EXT_SIZE],
            ir: vec![0; REG_IR_SIZE],
        };
        registers.reset();
        registers
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every region, then restore the factory calibration blocks
    pub fn reset(&mut self) {
        for region in [&mut self.eeprom, &mut self.speaker, &mut self.extension, &mut self.ir] {
            region.fill(0);
        }

        self.eeprom[..EEPROM_CALIBRATION.len()].copy_from_slice(&EEPROM_CALIBRATION);
        let block = EEPROM_BLOCK_16D0_OFFSET..EEPROM_BLOCK_16D0_OFFSET + EEPROM_BLOCK_16D0.len();
        self.eeprom[block].copy_from_slice(&EEPROM_BLOCK_16D0);
    }

    fn region(&self, region: Region) -> &[u8] {
        match region {
            Region::Eeprom => &self.eeprom,
            Region::Speaker => &self.speaker,
            Region::Extension => &self.extension,
            Region::Ir => &self.ir,
        }
    }

    fn region_mut(&mut self, region: Region) -> &mut [u8] {
        match region {
            Region::Eeprom => &mut self.eeprom,
            Region::Speaker => &mut self.speaker,
            Region::Extension => &mut self.extension,
            Region::Ir => &mut self.ir,
        }
    }

    fn check(region: Region, offset: usize, len: usize) -> Result<Range<usize>, RegisterError> {
        match offset.checked_add(len) {
            Some(end) if end <= region.size() => Ok(offset..end),
            _ => Err(RegisterError::OutOfBounds { region, offset, len }),
        }
    }

    /// Copy `bytes` into the region, returning the touched range
    pub fn write(
        &mut self,
        region: Region,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Range<usize>, RegisterError> {
        let range = Self::check(region, offset, bytes.len())?;
        self.region_mut(region)[range.clone()].copy_from_slice(bytes);
        Ok(range)
    }

    /// Borrow `size` bytes of the region
    pub fn read(&self, region: Region, offset: usize, size: usize) -> Result<&[u8], RegisterError> {
        let range = Self::check(region, offset, size)?;
        Ok(&self.region(region)[range])
    }

    /// Whole EEPROM image
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    pub fn mii_block(&self) -> &[u8] {
        &self.eeprom[MII_BLOCK_START..MII_BLOCK_END]
    }

    pub fn mii_block_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom[MII_BLOCK_START..MII_BLOCK_END]
    }

    /// The 16-byte key field of the extension register
    pub fn extension_key(&self) -> &[u8] {
        &self.extension[EXT_ENCRYPTION_KEY..EXT_ENCRYPTION_KEY + 0x10]
    }

    /// Extension reads come back encrypted
    pub fn extension_encrypted(&self) -> bool {
        self.extension[EXT_ENCRYPTION] == EXT_ENCRYPTION_ENABLED
    }

    /// The camera handshake has been completed by the host
    pub fn ir_enabled(&self) -> bool {
        self.ir[IR_ENABLE_OFFSET] != 0
    }

    pub fn ir_mode(&self) -> u8 {
        self.ir[IR_MODE_OFFSET]
    }

    pub fn speaker_format(&self) -> u8 {
        self.speaker[SPEAKER_FORMAT]
    }

    pub fn speaker_sample_rate(&self) -> u16 {
        u16::from_le_bytes([
            self.speaker[SPEAKER_SAMPLE_RATE],
            self.speaker[SPEAKER_SAMPLE_RATE + 1],
        ])
    }

    pub fn speaker_volume(&self) -> u8 {
        self.speaker[SPEAKER_VOLUME]
    }

    pub fn speaker_playing(&self) -> bool {
        self.speaker[SPEAKER_PLAY] != 0
    }

    /// Check restored buffers against the declared region sizes
    pub fn validate(&self) -> Result<(), String> {
        for region in [Region::Eeprom, Region::Speaker, Region::Extension, Region::Ir] {
            let len = self.region(region).len();
            if len != region.size() {
                return Err(format!("{} holds {} bytes, expected {}", region, len, region.size()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_copies_calibration() {
        let registers = RegisterFile::new();
        assert_eq!(&registers.eeprom()[..EEPROM_CALIBRATION.len()], &EEPROM_CALIBRATION);
        assert_eq!(&registers.eeprom()[0x16D0..0x16D0 + 24], &EEPROM_BLOCK_16D0);
        assert!(registers.read(Region::Ir, 0, REG_IR_SIZE).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_then_read() {
        let mut registers = RegisterFile::new();
        for (region, offset) in [
            (Region::Eeprom, 0x1000),
            (Region::Speaker, 2),
            (Region::Extension, 0xF0),
            (Region::Ir, 0x30),
        ] {
            let range = registers.write(region, offset, &[9, 8, 7, 6]).unwrap();
            assert_eq!(range, offset..offset + 4);
            assert_eq!(registers.read(region, offset, 4).unwrap(), &[9, 8, 7, 6]);
        }
    }

    #[test]
    fn test_out_of_bounds_is_rejected_without_partial_write() {
        let mut registers = RegisterFile::new();
        let before = registers.clone();

        let err = registers.write(Region::Speaker, 8, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, RegisterError::OutOfBounds { region: Region::Speaker, offset: 8, len: 3 });
        assert_eq!(registers, before);

        assert!(registers.read(Region::Ir, REG_IR_SIZE - 1, 2).is_err());
        assert!(registers.read(Region::Eeprom, usize::MAX, 2).is_err());
        assert!(registers.read(Region::Ir, REG_IR_SIZE - 1, 1).is_ok());
    }

    #[test]
    fn test_decode_extension_alias() {
        let a = decode_address(SPACE_REGS1, 0xA4_12F0).unwrap();
        let b = decode_address(SPACE_REGS2, 0xA4_00F0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.region, Region::Extension);
        assert_eq!(a.offset, 0xF0);
    }

    #[test]
    fn test_decode_ignores_bit_16() {
        let decoded = decode_address(SPACE_REGS1, 0xB1_0033).unwrap();
        assert_eq!(decoded.region, Region::Ir);
        assert_eq!(decoded.offset, 0x33);

        let eeprom = decode_address(SPACE_EEPROM, 0x01_0020).unwrap();
        assert_eq!(eeprom.offset, 0x20);
    }

    #[test]
    fn test_decode_unmapped() {
        assert_eq!(
            decode_address(SPACE_REGS1, 0xA6_0000),
            Err(RegisterError::UnmappedAddress(0xA6_0000))
        );
        assert!(decode_address(3, 0).is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let mut registers = RegisterFile::new();
        registers.write(Region::Speaker, 0, &[0, 0, 0x40, 0x70, 0x17, 0x7F, 0, 0, 1, 0]).unwrap();
        assert_eq!(registers.speaker_format(), 0x40);
        assert_eq!(registers.speaker_sample_rate(), 0x1770);
        assert_eq!(registers.speaker_volume(), 0x7F);
        assert!(registers.speaker_playing());

        registers.write(Region::Ir, IR_MODE_OFFSET, &[IR_MODE_EXTENDED]).unwrap();
        registers.write(Region::Ir, IR_ENABLE_OFFSET, &[0x08]).unwrap();
        assert!(registers.ir_enabled());
        assert_eq!(registers.ir_mode(), IR_MODE_EXTENDED);
    }
}
