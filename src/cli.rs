//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, info};

use rfm_ota::ota::{
    firmware_digest, update_firmware, FirmwareError, IntelHexReader, UpdateError, UpdateStage,
};
use rfm_ota::rfm::SerialPortTransport;
use rfm_ota::settings::{SettingsError, SettingsManager, UpdateSettings};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "rfm-ota")]
#[command(about = "Over-the-air firmware update through an RfmUsb radio")]
pub struct Cli {
    /// Intel HEX firmware file
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Serial port of the RfmUsb (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    pub serial: String,

    /// Serial baud rate
    #[arg(short, long = "baudrate")]
    pub baud_rate: Option<u32>,

    /// Radio output power in dBm (-2 to 20)
    #[arg(
        short = 'p',
        long = "outputpower",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i8).range(-2..=20)
    )]
    pub output_power: Option<i8>,

    /// Link-layer retries per transmission
    #[arg(short, long = "retry")]
    pub retry_count: Option<u8>,

    /// Response timeout in milliseconds
    #[arg(short, long = "timeout")]
    pub timeout_ms: Option<u64>,

    /// JSON settings file; flags take precedence over its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Errors that end a command-line run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl CliError {
    /// Support code printed alongside the failure message.
    pub fn error_code(&self) -> &'static str {
        match self {
            CliError::Settings(_) => "CFG-001",
            CliError::Firmware(_) => "OTA-001",
            CliError::Update(e) => e.error_code(),
        }
    }
}

impl Cli {
    /// Settings from the config file (or defaults) with flag overrides applied.
    pub fn settings(&self) -> Result<UpdateSettings, SettingsError> {
        let mut settings = match &self.config {
            Some(path) => {
                let manager = SettingsManager::new(path);
                debug!("Loading settings from {}", manager.settings_path().display());
                manager.load()?
            }
            None => UpdateSettings::default(),
        };

        if let Some(baud_rate) = self.baud_rate {
            settings.baud_rate = baud_rate;
        }
        if let Some(output_power) = self.output_power {
            settings.output_power = output_power;
        }
        if let Some(retry_count) = self.retry_count {
            settings.retry_count = retry_count;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Execute the parsed CLI command, returning the flash CRC.
pub fn run(cli: &Cli) -> Result<u32, CliError> {
    let settings = cli.settings()?;
    if settings.has_non_default_settings() {
        debug!("Using settings: {:?}", settings);
    }

    let digest = firmware_digest(&cli.file)?;
    println!("Firmware: {}", cli.file.display());
    println!("Size: {} bytes", digest.size);
    println!("SHA-256: {}", digest.sha256);

    let firmware = IntelHexReader::open(&cli.file)?;

    let crc = update_firmware(
        SerialPortTransport::new(),
        &cli.serial,
        &settings,
        firmware,
        |stage| match stage {
            UpdateStage::Writing { .. } => debug!("{}", stage.message()),
            _ => info!("{}", stage.message()),
        },
    )?;

    Ok(crc)
}
