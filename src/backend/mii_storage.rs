//! Mii block persistence
//!
//! The Mii block of the EEPROM outlives a session. `FileMiiStorage` keeps it
//! in a raw binary file; `MemoryMiiStorage` keeps it in memory for tests.

use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::backend::{BackendError, MiiStorage};

/// Default file name of the stored block
pub const MII_FILENAME: &str = "mii.bin";

/// Mii block stored as a raw file
#[derive(Debug, Clone)]
pub struct FileMiiStorage {
    path: PathBuf,
}

impl FileMiiStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store next to the executable, or in the current directory
    pub fn beside_executable() -> Self {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                return Self::new(exe_dir.join(MII_FILENAME));
            }
        }
        Self::new(MII_FILENAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MiiStorage for FileMiiStorage {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BackendError> {
        match fs::read(&self.path) {
            Ok(data) => {
                debug!("Loaded Mii block from: {}", self.path.display());
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No Mii block stored at: {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, data: &[u8]) -> Result<(), BackendError> {
        fs::write(&self.path, data)?;
        info!("Saved Mii block to: {}", self.path.display());
        Ok(())
    }
}

/// In-memory Mii store; clones share the same block
#[derive(Debug, Clone, Default)]
pub struct MemoryMiiStorage {
    block: Arc<Mutex<Option<Vec<u8>>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryMiiStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(data: Vec<u8>) -> Self {
        let storage = Self::new();
        *storage.block.lock().unwrap_or_else(|e| e.into_inner()) = Some(data);
        storage
    }

    pub fn block(&self) -> Option<Vec<u8>> {
        self.block.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of saves performed
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MiiStorage for MemoryMiiStorage {
    fn load(&mut self) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.block())
    }

    fn save(&mut self, data: &[u8]) -> Result<(), BackendError> {
        *self.block.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.to_vec());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
