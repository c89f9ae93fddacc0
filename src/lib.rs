//! Firmware updates for radio bootloaders driven through an RfmUsb
//! transceiver on a serial port.
//!
//! - [`rfm`] drives the RfmUsb text command protocol
//! - [`ota`] runs the bootloader update sequence on top of it
//! - [`settings`] loads the radio and link settings

pub mod ota;
pub mod rfm;
pub mod settings;
pub mod traits;

#[cfg(test)]
mod test_helpers;
