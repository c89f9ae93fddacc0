//! Update settings loaded from an optional JSON file.
//!
//! This module provides:
//! - `UpdateSettings` with the serial link and radio configuration used for
//!   an update session
//! - Loading from a JSON file; settings are read-only and never written back
//! - Range validation before any device is touched
//!
//! Every field has a default, so an empty `{}` file (or no file) is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rfm::config::DEFAULT_BAUD_RATE;

/// Output power limits of the RFM69HW in dBm.
pub const MIN_OUTPUT_POWER: i8 = -2;
pub const MAX_OUTPUT_POWER: i8 = 20;

/// Longest sync word the radio accepts.
const MAX_SYNC_WORD_LEN: usize = 8;

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output power {0} dBm is outside -2..=20")]
    InvalidOutputPower(i8),

    #[error("Response timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Sync word must be 1 to 8 bytes, got {0}")]
    InvalidSyncWord(usize),
}

/// Serial link and radio settings for an update session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateSettings {
    pub baud_rate: u32,

    /// Transmit power in dBm.
    pub output_power: i8,

    /// Link-layer retries the RfmUsb performs per transmission.
    pub retry_count: u8,

    /// How long to wait for each reply or interrupt, in milliseconds.
    pub timeout_ms: u64,

    pub fifo_threshold: u8,
    pub dio_interrupt_mask: u8,
    pub variable_length: bool,

    /// Fixed payload length; left at the device default when unset.
    pub payload_length: Option<u8>,
    pub sync_word: Option<Vec<u8>>,
    pub radio_config: Option<u8>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            output_power: 2,
            retry_count: 1,
            timeout_ms: 1000,
            fifo_threshold: 0x01,
            dio_interrupt_mask: 0x01,
            variable_length: true,
            payload_length: None,
            sync_word: None,
            radio_config: None,
        }
    }
}

impl UpdateSettings {
    /// Check values the device would reject or that would stall the session.
    pub fn validate(&self) -> SettingsResult<()> {
        if !(MIN_OUTPUT_POWER..=MAX_OUTPUT_POWER).contains(&self.output_power) {
            return Err(SettingsError::InvalidOutputPower(self.output_power));
        }

        if self.timeout_ms == 0 {
            return Err(SettingsError::InvalidTimeout);
        }

        if let Some(sync_word) = &self.sync_word {
            if sync_word.is_empty() || sync_word.len() > MAX_SYNC_WORD_LEN {
                return Err(SettingsError::InvalidSyncWord(sync_word.len()));
            }
        }

        Ok(())
    }

    /// Check if these settings differ from defaults.
    pub fn has_non_default_settings(&self) -> bool {
        *self != Self::default()
    }
}

/// Loads update settings from a JSON file.
pub struct SettingsManager {
    settings_file_path: PathBuf,
}

impl SettingsManager {
    pub fn new(settings_file_path: &Path) -> Self {
        Self {
            settings_file_path: settings_file_path.to_path_buf(),
        }
    }

    /// Load settings from disk, returning defaults if the file doesn't exist.
    pub fn load(&self) -> SettingsResult<UpdateSettings> {
        if !self.settings_file_path.exists() {
            return Ok(UpdateSettings::default());
        }

        let contents = fs::read_to_string(&self.settings_file_path)?;

        // Handle empty file gracefully
        if contents.trim().is_empty() {
            return Ok(UpdateSettings::default());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    /// Get the path settings are read from.
    pub fn settings_path(&self) -> &Path {
        &self.settings_file_path
    }
}
