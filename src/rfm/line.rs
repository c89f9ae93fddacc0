//! Classification of lines read from the RfmUsb device.
//!
//! Command replies and DIO interrupt notifications share one serial stream.
//! Every line is classified here before the channel decides whether it is
//! the kind of line it was waiting for.

use super::config::{from_hex, IRQ_NOTIFICATION_PREFIX};

/// A line received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Synchronous reply to the last command.
    Reply(String),
    /// Asynchronous DIO interrupt notification.
    Notification(IrqNotification),
}

/// Parsed `DIO PIN IRQ [0x..]` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqNotification {
    /// Bitmask of the DIO pins that fired, if the line carried a readable one.
    pub mask: Option<u8>,
    /// The line as received.
    pub raw: String,
}

impl IrqNotification {
    /// Whether this notification was raised by a pin enabled in `enabled`.
    pub fn matches(&self, enabled: u8) -> bool {
        self.mask.is_some_and(|mask| mask & enabled != 0)
    }
}

impl Line {
    /// Classify a raw line by content.
    pub fn classify(raw: String) -> Self {
        if !raw.starts_with(IRQ_NOTIFICATION_PREFIX) {
            return Line::Reply(raw);
        }

        let mask = raw
            .find('[')
            .zip(raw.rfind(']'))
            .filter(|(open, close)| open < close)
            .and_then(|(open, close)| from_hex(&raw[open + 1..close]))
            .and_then(|bytes| bytes.last().copied());

        Line::Notification(IrqNotification { mask, raw })
    }
}
