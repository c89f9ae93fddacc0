pub mod link;

pub use link::PacketLink;

#[cfg(test)]
pub use link::MockPacketLink;
