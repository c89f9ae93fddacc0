use crate::rfm::RfmResult;

#[cfg(test)]
use mockall::automock;

/// Abstraction over a half-duplex packet radio link.
/// This allows driving the bootloader client without a device in tests.
#[cfg_attr(test, automock)]
pub trait PacketLink {
    /// Transmit `data` and return the packet received in reply.
    fn exchange_packet(&mut self, data: &[u8]) -> RfmResult<Vec<u8>>;

    /// Transmit `data` without waiting for a reply.
    fn send_packet(&mut self, data: &[u8]) -> RfmResult<()>;
}

impl<L: PacketLink + ?Sized> PacketLink for &mut L {
    fn exchange_packet(&mut self, data: &[u8]) -> RfmResult<Vec<u8>> {
        (**self).exchange_packet(data)
    }

    fn send_packet(&mut self, data: &[u8]) -> RfmResult<()> {
        (**self).send_packet(data)
    }
}
