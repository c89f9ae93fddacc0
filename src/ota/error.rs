//! Error types for the firmware update pipeline.

use thiserror::Error;

use super::firmware_reader::FirmwareError;
use super::pipeline::UpdateStep;
use crate::rfm::RfmError;

/// Result type alias for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors that can end a firmware update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Fault on the radio channel or serial link.
    #[error(transparent)]
    Rfm(#[from] RfmError),

    /// The firmware image could not be read.
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// A bootloader step reported failure; later steps were not attempted.
    #[error("Firmware update failed at step [{step}]")]
    StepFailed { step: UpdateStep },
}

impl UpdateError {
    /// Get a user-friendly error code for support purposes.
    pub fn error_code(&self) -> &'static str {
        match self {
            UpdateError::Rfm(e) => e.error_code(),
            UpdateError::Firmware(_) => "OTA-001",
            UpdateError::StepFailed { .. } => "OTA-010",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_message_names_step() {
        let err = UpdateError::StepFailed {
            step: UpdateStep::Erase,
        };

        assert!(err.to_string().contains("[Erase]"));
        assert_eq!(err.error_code(), "OTA-010");
    }

    #[test]
    fn test_rfm_error_is_transparent() {
        let err = UpdateError::from(RfmError::Timeout);

        assert_eq!(err.to_string(), "Timeout waiting for response");
        assert_eq!(err.error_code(), "RFM-022");
    }
}
