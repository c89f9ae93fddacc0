//! Error types for the RfmUsb radio command channel.

use thiserror::Error;

/// Result type alias for radio channel operations.
pub type RfmResult<T> = Result<T, RfmError>;

/// Errors that can occur while driving the RfmUsb device.
#[derive(Debug, Error)]
pub enum RfmError {
    /// The serial port could not be found.
    #[error(
        "Unable to open serial port [{path}]. Available serial ports: [{}]",
        .available.join(", ")
    )]
    DeviceNotFound { path: String, available: Vec<String> },

    /// A configuration or control command was not acknowledged.
    #[error("Command: [{command}] Execution Failed Reason: [{response}]")]
    CommandExecutionFailed { command: String, response: String },

    /// The interrupt flag table did not report the expected flag.
    #[error("Packet not sent: expected flag [{expected}], got [{actual}]")]
    PacketNotSent { expected: String, actual: String },

    /// The device exhausted its link-layer retries.
    #[error("Packet transmission failed: [{response}]")]
    TransmitFailed { response: String },

    /// An interrupt notification arrived where a command reply was expected,
    /// or the notification was for a pin outside the configured mask.
    #[error("Unexpected interrupt notification: [{line}]")]
    UnexpectedNotification { line: String },

    /// A command reply arrived while waiting for an interrupt notification.
    #[error("Expected an interrupt notification, got reply: [{line}]")]
    UnexpectedReply { line: String },

    /// A reply could not be parsed into the value the command returns.
    #[error("Invalid response to command [{command}]: [{response}]")]
    InvalidResponse { command: String, response: String },

    /// No line arrived within the configured response timeout.
    #[error("Timeout waiting for response")]
    Timeout,

    /// More than `limit` bytes arrived without a line terminator.
    #[error("Line exceeded {limit} bytes without a terminator")]
    LineTooLong { limit: usize },

    /// An operation was attempted before the channel was opened.
    #[error("Serial port is not open")]
    NotOpen,

    /// Serial port error from the serialport crate.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RfmError {
    /// Faults that fail the current bootloader step rather than the session.
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            RfmError::PacketNotSent { .. } | RfmError::TransmitFailed { .. }
        )
    }

    /// Get a user-friendly error code for support purposes.
    pub fn error_code(&self) -> &'static str {
        match self {
            RfmError::Serial(_) => "RFM-001",
            RfmError::Io(_) => "RFM-002",
            RfmError::DeviceNotFound { .. } => "RFM-010",
            RfmError::NotOpen => "RFM-011",
            RfmError::CommandExecutionFailed { .. } => "RFM-020",
            RfmError::InvalidResponse { .. } => "RFM-021",
            RfmError::Timeout => "RFM-022",
            RfmError::LineTooLong { .. } => "RFM-023",
            RfmError::PacketNotSent { .. } => "RFM-030",
            RfmError::TransmitFailed { .. } => "RFM-031",
            RfmError::UnexpectedNotification { .. } => "RFM-040",
            RfmError::UnexpectedReply { .. } => "RFM-041",
        }
    }
}
