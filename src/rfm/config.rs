//! Configuration constants for the RfmUsb command protocol.

use std::fmt;
use std::time::Duration;

// ============================================================================
// Serial Communication
// ============================================================================

/// Default baud rate for the RfmUsb serial link.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read/write timeout applied when the port is first opened.
/// Replaced by the response timeout once the channel is configured.
pub const OPEN_TIMEOUT: Duration = Duration::from_millis(500);

/// Line terminator for commands sent to and replies read from the device.
pub const NEW_LINE: &str = "\r\n";

// ============================================================================
// Acknowledgement Tokens
// ============================================================================

/// Reply prefix for an accepted configuration command.
pub const RESPONSE_OK: &str = "OK";

/// Prefix of an asynchronous DIO interrupt notification line.
pub const IRQ_NOTIFICATION_PREFIX: &str = "DIO PIN IRQ";

/// Tokens in an `e-tx`/`e-txrx` reply that report a link-layer failure.
pub const TRANSMIT_FAILURE_TOKENS: &[&str] = &["TX", "RX"];

// ============================================================================
// Command Codes
// ============================================================================

pub const CMD_VERSION: &str = "g-fv";
pub const CMD_RESET: &str = "e-r";
pub const CMD_FIFO: &str = "fifo";
pub const CMD_IRQ_FLAGS: &str = "g-irq";
pub const CMD_OPERATING_MODE: &str = "s-om";
pub const CMD_DIO_MAPPING: &str = "s-dio";
pub const CMD_TRANSMIT: &str = "e-tx";
pub const CMD_TRANSMIT_RECEIVE: &str = "e-txrx";

pub const CODE_PAYLOAD_LENGTH: &str = "pl";
pub const CODE_VARIABLE_LENGTH: &str = "pf";
pub const CODE_FIFO_THRESHOLD: &str = "ft";
pub const CODE_DIO_INTERRUPT_MASK: &str = "di";
pub const CODE_ENTER_CONDITION: &str = "ec";
pub const CODE_INTERMEDIATE_MODE: &str = "im";
pub const CODE_EXIT_CONDITION: &str = "exc";
pub const CODE_TX_START_CONDITION: &str = "tsc";
pub const CODE_RADIO_CONFIG: &str = "rc";
pub const CODE_SYNC: &str = "sync";
pub const CODE_OUTPUT_POWER: &str = "op";

// ============================================================================
// Interrupt Flag Table
// ============================================================================

/// Number of lines returned by the `g-irq` command.
pub const IRQ_FLAG_COUNT: usize = 14;

/// Flag names in the order the device reports them.
pub const IRQ_FLAG_NAMES: [&str; IRQ_FLAG_COUNT] = [
    "CRC_OK",
    "PAYLOAD_READY",
    "PACKET_SENT",
    "FIFO_OVERRUN",
    "FIFO_LEVEL",
    "FIFO_NOT_EMPTY",
    "FIFO_FULL",
    "SYNC_ADDRESS_MATCH",
    "AUTO_MODE",
    "TIMEOUT",
    "RSSI",
    "PLL_LOCK",
    "TX_READY",
    "MODE_READY",
];

/// Index of the payload-ready flag and the value it must hold after a receive.
pub const IRQ_PAYLOAD_READY_INDEX: usize = 1;
pub const IRQ_PAYLOAD_READY_SET: &str = "1:PAYLOAD_READY";

/// Index of the packet-sent flag and the value it must hold after a transmit.
pub const IRQ_PACKET_SENT_INDEX: usize = 2;
pub const IRQ_PACKET_SENT_SET: &str = "1:PACKET_SENT";

// ============================================================================
// Operating Modes
// ============================================================================

/// Radio operating mode selected with `s-om`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Sleep = 0x00,
    Standby = 0x01,
    Synth = 0x02,
    Tx = 0x03,
    Rx = 0x04,
}

impl Mode {
    /// Name the device echoes in a mode transition acknowledgement.
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Sleep => "Sleep",
            Mode::Standby => "Standby",
            Mode::Synth => "Synth",
            Mode::Tx => "Tx",
            Mode::Rx => "Rx",
        }
    }

    /// Expected acknowledgement, e.g. `[0x0001]-Standby`.
    pub fn acknowledgement(&self) -> String {
        format!("[0x{:04X}]-{}", *self as u8, self.name())
    }
}

// ============================================================================
// DIO Pins
// ============================================================================

/// Radio DIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dio {
    Dio0 = 0,
    Dio1 = 1,
    Dio2 = 2,
    Dio3 = 3,
    Dio4 = 4,
    Dio5 = 5,
}

/// Signal routed to a DIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DioMapping {
    DioMapping0 = 0,
    DioMapping1 = 1,
    DioMapping2 = 2,
    DioMapping3 = 3,
}

/// Expected acknowledgement for a DIO mapping command, e.g. `[0x0001]-Map 01`.
pub fn dio_mapping_acknowledgement(dio: Dio, mapping: DioMapping) -> String {
    format!("[0x{:04X}]-Map {:02}", dio as u8, mapping as u8)
}

// ============================================================================
// Packet Mode Conditions
// ============================================================================

/// Condition that moves the radio into its intermediate packet mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnterCondition {
    None = 0x00,
    FifoNotEmpty = 0x01,
    FifoLevel = 0x02,
    CrcOk = 0x03,
    PayloadReady = 0x04,
    SyncAddress = 0x05,
    PacketSent = 0x06,
    FifoEmpty = 0x07,
}

/// Mode the radio occupies between the enter and exit conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IntermediateMode {
    Sleep = 0x00,
    Standby = 0x01,
    Rx = 0x02,
    Tx = 0x03,
}

/// Condition that returns the radio from its intermediate packet mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCondition {
    None = 0x00,
    FifoEmpty = 0x01,
    FifoLevel = 0x02,
    CrcOk = 0x03,
    PayloadReady = 0x04,
    SyncAddress = 0x05,
    PacketSent = 0x06,
    Timeout = 0x07,
}

macro_rules! impl_from_byte {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $ty {
            /// Parse a register value reported by the device.
            pub fn from_byte(byte: u8) -> Option<Self> {
                $(if byte == $ty::$variant as u8 {
                    return Some($ty::$variant);
                })+
                None
            }
        }
    };
}

impl_from_byte!(EnterCondition {
    None,
    FifoNotEmpty,
    FifoLevel,
    CrcOk,
    PayloadReady,
    SyncAddress,
    PacketSent,
    FifoEmpty,
});

impl_from_byte!(IntermediateMode { Sleep, Standby, Rx, Tx });

impl_from_byte!(ExitCondition {
    None,
    FifoEmpty,
    FifoLevel,
    CrcOk,
    PayloadReady,
    SyncAddress,
    PacketSent,
    Timeout,
});

/// Parse a hex reply (optionally `0x`-prefixed) into bytes.
///
/// Returns `None` if the reply contains non-hex characters. The device
/// drops leading zeros (`0x1`), so an odd digit count gets one back.
pub fn from_hex(reply: &str) -> Option<Vec<u8>> {
    let trimmed = reply.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits)).ok()
    } else {
        hex::decode(digits).ok()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
