//! Firmware update pipeline.
//!
//! Orchestrates one update session over a radio channel:
//! 1. **Initialization** - Open the port, reset and configure the RfmUsb
//! 2. **Ping** - Check the bootloader is listening
//! 3. **FlashSize** - Read the application flash layout
//! 4. **Erase** - Erase the application flash
//! 5. **WriteAll** - Write every record of the firmware image
//! 6. **Crc** - Read the CRC of the flashed image
//! 7. **Reboot** - Start the new application
//!
//! The pipeline stops at the first step that fails. The channel is closed on
//! every exit path.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::client::BootloaderClient;
use super::error::{UpdateError, UpdateResult};
use super::firmware_reader::FirmwareSource;
use super::frame::FlashGeometry;
use crate::rfm::{Dio, DioMapping, RadioChannel, SerialPortTransport, SerialTransport};
use crate::settings::UpdateSettings;
use crate::traits::PacketLink;

/// Bootloader steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Ping,
    FlashSize,
    Erase,
    WriteAll,
    Crc,
    Reboot,
}

impl UpdateStep {
    pub const SEQUENCE: [UpdateStep; 6] = [
        UpdateStep::Ping,
        UpdateStep::FlashSize,
        UpdateStep::Erase,
        UpdateStep::WriteAll,
        UpdateStep::Crc,
        UpdateStep::Reboot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UpdateStep::Ping => "Ping",
            UpdateStep::FlashSize => "FlashSize",
            UpdateStep::Erase => "Erase",
            UpdateStep::WriteAll => "WriteAll",
            UpdateStep::Crc => "Crc",
            UpdateStep::Reboot => "Reboot",
        }
    }

    fn stage(&self) -> UpdateStage {
        match self {
            UpdateStep::Ping => UpdateStage::Pinging,
            UpdateStep::FlashSize => UpdateStage::QueryingFlash,
            UpdateStep::Erase => UpdateStage::Erasing,
            UpdateStep::WriteAll => UpdateStage::Writing {
                address: 0,
                records: 0,
            },
            UpdateStep::Crc => UpdateStage::VerifyingCrc,
            UpdateStep::Reboot => UpdateStage::Rebooting,
        }
    }
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Update progress stages for user feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStage {
    /// Opening the serial port.
    Opening,
    /// Resetting and configuring the radio.
    Configuring,
    Pinging,
    QueryingFlash,
    Erasing,
    /// Writing firmware records; `records` counts those written so far.
    Writing { address: u32, records: usize },
    VerifyingCrc,
    Rebooting,
    /// Update complete with the device-reported CRC.
    Complete { crc: u32 },
}

impl UpdateStage {
    /// Get a percentage estimate for this stage.
    ///
    /// The image is streamed, so writing reports a fixed midpoint rather
    /// than a fraction of an unknown total.
    pub fn percent(&self) -> f32 {
        match self {
            UpdateStage::Opening => 0.0,
            UpdateStage::Configuring => 5.0,
            UpdateStage::Pinging => 10.0,
            UpdateStage::QueryingFlash => 15.0,
            UpdateStage::Erasing => 20.0,
            UpdateStage::Writing { .. } => 50.0,
            UpdateStage::VerifyingCrc => 90.0,
            UpdateStage::Rebooting => 95.0,
            UpdateStage::Complete { .. } => 100.0,
        }
    }

    /// Get a human-readable message for this stage.
    pub fn message(&self) -> String {
        match self {
            UpdateStage::Opening => "Opening serial port...".into(),
            UpdateStage::Configuring => "Configuring radio...".into(),
            UpdateStage::Pinging => "Pinging bootloader...".into(),
            UpdateStage::QueryingFlash => "Reading flash layout...".into(),
            UpdateStage::Erasing => "Erasing flash...".into(),
            UpdateStage::Writing { records: 0, .. } => "Writing firmware...".into(),
            UpdateStage::Writing { address, records } => {
                format!("Writing firmware... {} records (0x{:X})", records, address)
            }
            UpdateStage::VerifyingCrc => "Verifying flash CRC...".into(),
            UpdateStage::Rebooting => "Rebooting device...".into(),
            UpdateStage::Complete { crc } => format!("Update complete! CRC: 0x{:X}", crc),
        }
    }
}

/// State of one bootloader session.
struct UpdateSession<'a, L: PacketLink, S: FirmwareSource, F: Fn(UpdateStage)> {
    client: BootloaderClient<L>,
    firmware: S,
    on_progress: &'a F,
    geometry: Option<FlashGeometry>,
    crc: Option<u32>,
}

impl<'a, L: PacketLink, S: FirmwareSource, F: Fn(UpdateStage)> UpdateSession<'a, L, S, F> {
    /// Run one step, timing it and turning transmission faults into a
    /// failed step.
    fn execute(&mut self, step: UpdateStep) -> UpdateResult<bool> {
        let started = Instant::now();

        let result = match step {
            UpdateStep::Ping => self.client.ping().map_err(UpdateError::from),
            UpdateStep::FlashSize => self.flash_size(),
            UpdateStep::Erase => self.client.erase_flash().map_err(UpdateError::from),
            UpdateStep::WriteAll => self.write_all(),
            UpdateStep::Crc => self.crc(),
            UpdateStep::Reboot => self.client.reboot().map_err(UpdateError::from),
        };

        debug!(
            "Executed [{}] in [{}] ms",
            step,
            started.elapsed().as_secs_f64() * 1000.0
        );

        match result {
            Err(UpdateError::Rfm(e)) if e.is_step_failure() => {
                error!(
                    "A transmission error occurred executing [{}] Reason: [{}]",
                    step, e
                );
                Ok(false)
            }
            other => other,
        }
    }

    fn flash_size(&mut self) -> UpdateResult<bool> {
        self.geometry = self.client.flash_size()?;
        Ok(self.geometry.is_some())
    }

    fn write_all(&mut self) -> UpdateResult<bool> {
        let mut records = 0;

        while let Some(record) = self.firmware.read()? {
            if let Some(geometry) = &self.geometry {
                if !geometry.contains(record.address, record.data.len()) {
                    warn!(
                        "Record at [0x{:X}] ({} bytes) is outside the application flash",
                        record.address,
                        record.data.len()
                    );
                }
            }

            if !self.client.write_block(record.address, &record.data)? {
                return Ok(false);
            }

            records += 1;
            (self.on_progress)(UpdateStage::Writing {
                address: record.address,
                records,
            });
        }

        info!("Wrote {} records", records);
        Ok(true)
    }

    fn crc(&mut self) -> UpdateResult<bool> {
        self.crc = self.client.crc()?;
        Ok(self.crc.is_some())
    }
}

/// Run the bootloader steps over an already configured link.
///
/// Returns the device-reported CRC once every step has succeeded.
pub fn run_steps<L, S, F>(link: L, firmware: S, on_progress: F) -> UpdateResult<u32>
where
    L: PacketLink,
    S: FirmwareSource,
    F: Fn(UpdateStage),
{
    let mut session = UpdateSession {
        client: BootloaderClient::new(link),
        firmware,
        on_progress: &on_progress,
        geometry: None,
        crc: None,
    };

    for step in UpdateStep::SEQUENCE {
        on_progress(step.stage());

        if !session.execute(step)? {
            warn!("Step [{}] failed, aborting update", step);
            return Err(UpdateError::StepFailed { step });
        }
    }

    let crc = session.crc.ok_or(UpdateError::StepFailed {
        step: UpdateStep::Crc,
    })?;
    on_progress(UpdateStage::Complete { crc });

    Ok(crc)
}

/// Reset the RfmUsb and apply the radio settings.
fn initialize_channel<T: SerialTransport>(
    channel: &mut RadioChannel<T>,
    settings: &UpdateSettings,
) -> UpdateResult<()> {
    channel.reset()?;

    let version = channel.version()?;
    info!("{}", version);

    channel.set_variable_length(settings.variable_length)?;
    channel.set_fifo_threshold(settings.fifo_threshold)?;
    channel.set_dio_mapping(Dio::Dio1, DioMapping::DioMapping1)?;
    channel.set_dio_interrupt_mask(settings.dio_interrupt_mask)?;
    channel.set_retry_count(settings.retry_count);
    channel.set_response_timeout(Duration::from_millis(settings.timeout_ms))?;
    channel.set_output_power(settings.output_power)?;

    if let Some(payload_length) = settings.payload_length {
        channel.set_payload_length(payload_length)?;
    }
    if let Some(sync_word) = &settings.sync_word {
        channel.set_sync_word(sync_word)?;
    }
    if let Some(radio_config) = settings.radio_config {
        channel.set_radio_config(radio_config)?;
    }

    Ok(())
}

/// Update the firmware of the device reached through `transport`.
///
/// # Arguments
/// * `transport` - Serial transport the RfmUsb is attached to
/// * `serial_path` - Serial port of the RfmUsb
/// * `settings` - Radio and link settings
/// * `firmware` - Firmware records to write
/// * `on_progress` - Callback for progress updates
pub fn update_firmware<T, S, F>(
    transport: T,
    serial_path: &str,
    settings: &UpdateSettings,
    firmware: S,
    on_progress: F,
) -> UpdateResult<u32>
where
    T: SerialTransport,
    S: FirmwareSource,
    F: Fn(UpdateStage),
{
    // Dropping the channel closes the port on every early return.
    let mut channel = RadioChannel::new(transport);

    on_progress(UpdateStage::Opening);
    channel.open(serial_path, settings.baud_rate)?;

    on_progress(UpdateStage::Configuring);
    initialize_channel(&mut channel, settings)?;

    let result = run_steps(&mut channel, firmware, &on_progress);

    channel.close()?;
    result
}

/// Update firmware over the serial port at `serial_path` with default
/// radio settings.
pub fn run_update<S: FirmwareSource>(
    serial_path: &str,
    baud_rate: u32,
    output_power_dbm: i8,
    firmware: S,
) -> UpdateResult<u32> {
    let settings = UpdateSettings {
        baud_rate,
        output_power: output_power_dbm,
        ..UpdateSettings::default()
    };

    update_firmware(
        SerialPortTransport::new(),
        serial_path,
        &settings,
        firmware,
        |stage| debug!("{}", stage.message()),
    )
}
