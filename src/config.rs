//! Configuration loader and validator
//!
//! Loads emulator settings and the controller slot table from TOML files in
//! the configs/ directory.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::wiimote::constants::{DEFAULT_BATTERY, DEFAULT_TICK_RATE_HZ, MAX_WIIMOTES};

/// Highest accepted tick rate
pub const MAX_TICK_RATE_HZ: u32 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What drives a controller slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSource {
    None,
    Emulated,
    /// A physical remote handled outside this crate
    Real,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Slot table; slots not listed have no device
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            slots: vec![SlotConfig { index: 0, source: DeviceSource::Emulated }],
        }
    }
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Device ticks per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: u32,

    /// Raw battery byte reported by the demo input source
    #[serde(default = "default_battery")]
    pub battery: u8,

    /// Sensor bar placed above the screen
    #[serde(default = "default_true")]
    pub sensor_bar_on_top: bool,

    /// Remote held sideways (d-pad rotated)
    #[serde(default)]
    pub sideways: bool,

    /// Peak acceleration of shake emulation, in g
    #[serde(default = "default_shake_intensity")]
    pub shake_intensity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate(),
            battery: default_battery(),
            sensor_bar_on_top: true,
            sideways: false,
            shake_intensity: default_shake_intensity(),
        }
    }
}

fn default_tick_rate() -> u32 {
    DEFAULT_TICK_RATE_HZ
}

fn default_battery() -> u8 {
    DEFAULT_BATTERY
}

fn default_true() -> bool {
    true
}

fn default_shake_intensity() -> f64 {
    1.0
}

/// One entry of the slot table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Zero-based slot
    pub index: usize,
    pub source: DeviceSource,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        info!("✓ Config parsed successfully");
        debug!("  - Tick rate: {} Hz", config.settings.tick_rate_hz);
        debug!("  - Slots: {:?}", config.slots);

        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;

        if settings.tick_rate_hz == 0 || settings.tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(ConfigError::Invalid(format!(
                "tick_rate_hz must be between 1 and {}",
                MAX_TICK_RATE_HZ
            )));
        }

        if !(settings.shake_intensity > 0.0 && settings.shake_intensity.is_finite()) {
            return Err(ConfigError::Invalid("shake_intensity must be positive".into()));
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if slot.index >= MAX_WIIMOTES {
                return Err(ConfigError::Invalid(format!(
                    "slot index {} out of range (max {})",
                    slot.index,
                    MAX_WIIMOTES - 1
                )));
            }
            if !seen.insert(slot.index) {
                return Err(ConfigError::Invalid(format!("slot {} listed twice", slot.index)));
            }
        }

        Ok(())
    }

    /// Source of a slot; unlisted slots have none
    pub fn source(&self, index: usize) -> DeviceSource {
        self.slots
            .iter()
            .find(|slot| slot.index == index)
            .map(|slot| slot.source)
            .unwrap_or(DeviceSource::None)
    }

    /// Slots that get an emulated device
    pub fn emulated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.source == DeviceSource::Emulated)
            .map(|slot| slot.index)
    }
}
