//! Bootloader protocol client.
//!
//! One method per bootloader command. Each call makes exactly one attempt:
//! a malformed response is an ordinary `false`/`None` result, while link
//! faults propagate as [`RfmError`](crate::rfm::RfmError).

use tracing::{info, warn};

use super::frame::{
    build_request, build_write_request, decode_crc, validate_response, FlashGeometry,
    RequestType, ResponseShape,
};
use crate::rfm::RfmResult;
use crate::traits::PacketLink;

/// Client for the radio bootloader running on the target.
pub struct BootloaderClient<L: PacketLink> {
    link: L,
}

impl<L: PacketLink> BootloaderClient<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn ping(&mut self) -> RfmResult<bool> {
        let response = self.request("Ping", &build_request(RequestType::Ping), ResponseShape::PING)?;
        Ok(response.is_some())
    }

    /// Query the application flash layout.
    pub fn flash_size(&mut self) -> RfmResult<Option<FlashGeometry>> {
        let Some(frame) = self.request(
            "FlashSize",
            &build_request(RequestType::FlashSize),
            ResponseShape::FLASH_SIZE,
        )?
        else {
            return Ok(None);
        };

        let geometry = FlashGeometry::decode(&frame);
        if let Some(geometry) = &geometry {
            info!(
                "App Start Address: [0x{:X}] Flash Size: [0x{:X}] Write Size: [0x{:X}]",
                geometry.start_address, geometry.flash_size, geometry.write_size
            );
        }

        Ok(geometry)
    }

    pub fn erase_flash(&mut self) -> RfmResult<bool> {
        let response = self.request(
            "Erase",
            &build_request(RequestType::Erase),
            ResponseShape::ERASE,
        )?;
        Ok(response.is_some())
    }

    /// Write one block of data at `address`.
    pub fn write_block(&mut self, address: u32, data: &[u8]) -> RfmResult<bool> {
        info!(
            "Writing Address: [0x{:X}] Count: [0x{:02X}] Data: [{}]",
            address,
            data.len(),
            hex::encode_upper(data)
        );

        let response = self.request(
            "Write",
            &build_write_request(address, data),
            ResponseShape::OK,
        )?;
        Ok(response.is_some())
    }

    /// Query the CRC the bootloader computes over the flashed image.
    pub fn crc(&mut self) -> RfmResult<Option<u32>> {
        let Some(frame) = self.request("Crc", &build_request(RequestType::Crc), ResponseShape::CRC)?
        else {
            return Ok(None);
        };

        let crc = decode_crc(&frame);
        if let Some(crc) = crc {
            info!("Flash Crc: [0x{:X}]", crc);
        }

        Ok(crc)
    }

    /// Ask the bootloader to start the application. No response is awaited.
    pub fn reboot(&mut self) -> RfmResult<bool> {
        self.link.send_packet(&build_request(RequestType::Reboot))?;
        info!("BootLoader Reboot sent");
        Ok(true)
    }

    /// Send a request and return the response if it has the expected shape.
    fn request(
        &mut self,
        name: &str,
        frame: &[u8],
        shape: ResponseShape,
    ) -> RfmResult<Option<Vec<u8>>> {
        let response = self.link.exchange_packet(frame)?;

        match validate_response(&response, shape) {
            Ok(()) => {
                info!("BootLoader {} Ok", name);
                Ok(Some(response))
            }
            Err(rejection) => {
                warn!(
                    "BootLoader {} rejected: {} [{}]",
                    name,
                    rejection,
                    hex::encode_upper(&response)
                );
                Ok(None)
            }
        }
    }
}
