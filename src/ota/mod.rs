//! Radio bootloader firmware update.
//!
//! The bootloader on the target speaks a small binary request/response
//! protocol carried in radio packets:
//!
//! | Request   | Response             |
//! |-----------|----------------------|
//! | Ping      | Ping                 |
//! | FlashSize | FlashSize (geometry) |
//! | Erase     | Erase                |
//! | Write     | Ok                   |
//! | Crc       | Crc                  |
//! | Reboot    | none                 |
//!
//! # Example
//!
//! ```ignore
//! use ota::{run_update, IntelHexReader};
//!
//! let firmware = IntelHexReader::open("app.hex")?;
//! let crc = run_update("/dev/ttyUSB0", 115_200, 2, firmware)?;
//! println!("CRC: 0x{:X}", crc);
//! ```

mod client;
mod error;
mod firmware_reader;
mod frame;
mod pipeline;

pub use client::BootloaderClient;
pub use error::{UpdateError, UpdateResult};
pub use firmware_reader::{
    firmware_digest, FirmwareDigest, FirmwareError, FirmwareRecord, FirmwareResult,
    FirmwareSource, IntelHexReader,
};
pub use frame::{FlashGeometry, RequestType, ResponseRejection, ResponseShape, ResponseType};
pub use pipeline::{run_steps, run_update, update_firmware, UpdateStage, UpdateStep};
