//! RfmUsb radio command channel.
//!
//! The RfmUsb is an RFM69 transceiver behind a USB serial port that accepts
//! line-oriented text commands. This module drives it:
//!
//! - `g-<code>` / `s-<code> <value>` property reads and writes
//! - `s-om <n>` operating mode transitions acknowledged as `[0x000n]-Name`
//! - DIO interrupt notifications (`DIO PIN IRQ [0x01]`) interleaved with
//!   command replies on the same stream
//! - A transmit-then-receive packet exchange built from the above
//!
//! # Example
//!
//! ```ignore
//! use rfm::{RadioChannel, SerialPortTransport};
//!
//! let mut channel = RadioChannel::new(SerialPortTransport::new());
//! channel.open("/dev/ttyUSB0", 115_200)?;
//! channel.reset()?;
//! let reply = channel.exchange_packet(&[0x01, 0x00])?;
//! ```

mod channel;
pub mod config;
mod device;
mod error;
mod line;
mod transport;

pub use channel::{ChannelConfiguration, RadioChannel};
pub use config::{Dio, DioMapping, EnterCondition, ExitCondition, IntermediateMode, Mode};
pub use device::available_port_names;
pub use error::{RfmError, RfmResult};
pub use line::{IrqNotification, Line};
pub use transport::{SerialPortTransport, SerialTransport};
