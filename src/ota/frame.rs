//! Bootloader request framing and response validation.
//!
//! Requests are `[0x01, opcode, payload...]`. Responses are
//! `[length, type, body...]` where `length` counts the bytes after itself.
//! All multi-byte integers are little-endian.

use std::fmt;

/// Leading byte of every bootloader request.
pub const REQUEST_HEADER: u8 = 0x01;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Bootloader request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Ping = 0x00,
    Erase = 0x01,
    FlashSize = 0x02,
    Write = 0x03,
    Crc = 0x04,
    Reboot = 0x05,
}

/// Bootloader response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseType {
    Crc = 0x80,
    Ping = 0x81,
    Erase = 0x82,
    FlashSize = 0x83,
    InvalidLocked = 0x84,
    InvalidLength = 0x85,
    InvalidAddress = 0x86,
    Ok = 0x87,
}

impl ResponseType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(ResponseType::Crc),
            0x81 => Some(ResponseType::Ping),
            0x82 => Some(ResponseType::Erase),
            0x83 => Some(ResponseType::FlashSize),
            0x84 => Some(ResponseType::InvalidLocked),
            0x85 => Some(ResponseType::InvalidLength),
            0x86 => Some(ResponseType::InvalidAddress),
            0x87 => Some(ResponseType::Ok),
            _ => None,
        }
    }
}

/// Length and type a well-formed response must declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseShape {
    pub length: u8,
    pub response_type: ResponseType,
}

impl ResponseShape {
    pub const PING: Self = Self::new(1, ResponseType::Ping);
    pub const ERASE: Self = Self::new(1, ResponseType::Erase);
    pub const OK: Self = Self::new(1, ResponseType::Ok);
    pub const CRC: Self = Self::new(5, ResponseType::Crc);
    pub const FLASH_SIZE: Self = Self::new(13, ResponseType::FlashSize);

    const fn new(length: u8, response_type: ResponseType) -> Self {
        Self {
            length,
            response_type,
        }
    }

    /// Minimum number of bytes in a valid frame, including the length byte.
    pub fn frame_size(&self) -> usize {
        self.length as usize + 1
    }
}

// ============================================================================
// Request Building
// ============================================================================

/// Build a request frame with no payload.
pub fn build_request(request: RequestType) -> Vec<u8> {
    vec![REQUEST_HEADER, request as u8]
}

/// Build a write request: header, address (u32 LE), then the data block.
pub fn build_write_request(address: u32, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + 4 + data.len());
    frame.push(REQUEST_HEADER);
    frame.push(RequestType::Write as u8);
    frame.extend_from_slice(&address.to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

// ============================================================================
// Response Validation
// ============================================================================

/// Why a response frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseRejection {
    /// No bytes were received.
    Empty,
    /// Fewer bytes than the expected frame size.
    TooShort { expected: usize, actual: usize },
    /// Declared length differs from the expected length.
    LengthMismatch { expected: u8, actual: u8 },
    /// Declared type differs from the expected type.
    TypeMismatch { expected: ResponseType, actual: u8 },
}

impl fmt::Display for ResponseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseRejection::Empty => write!(f, "empty response"),
            ResponseRejection::TooShort { expected, actual } => {
                write!(f, "response too short: expected {} bytes, got {}", expected, actual)
            }
            ResponseRejection::LengthMismatch { expected, actual } => {
                write!(f, "invalid response length: expected {}, got {}", expected, actual)
            }
            ResponseRejection::TypeMismatch { expected, actual } => {
                match ResponseType::from_byte(*actual) {
                    Some(actual) => {
                        write!(f, "invalid response: expected {:?}, got {:?}", expected, actual)
                    }
                    None => write!(
                        f,
                        "invalid response: expected {:?}, got [0x{:02X}]",
                        expected, actual
                    ),
                }
            }
        }
    }
}

/// Check a response frame against the shape its request expects.
///
/// Extra trailing bytes are accepted.
pub fn validate_response(frame: &[u8], shape: ResponseShape) -> Result<(), ResponseRejection> {
    if frame.is_empty() {
        return Err(ResponseRejection::Empty);
    }

    if frame.len() < shape.frame_size() {
        return Err(ResponseRejection::TooShort {
            expected: shape.frame_size(),
            actual: frame.len(),
        });
    }

    if frame[0] != shape.length {
        return Err(ResponseRejection::LengthMismatch {
            expected: shape.length,
            actual: frame[0],
        });
    }

    if frame[1] != shape.response_type as u8 {
        return Err(ResponseRejection::TypeMismatch {
            expected: shape.response_type,
            actual: frame[1],
        });
    }

    Ok(())
}

// ============================================================================
// Payload Decoding
// ============================================================================

/// Flash layout reported by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub start_address: u32,
    pub flash_size: u32,
    pub write_size: u32,
}

impl FlashGeometry {
    /// Decode from a validated FlashSize response.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        Some(Self {
            start_address: read_u32_le(frame, 2)?,
            flash_size: read_u32_le(frame, 6)?,
            write_size: read_u32_le(frame, 10)?,
        })
    }

    /// Whether `len` bytes at `address` fit inside the application flash.
    pub fn contains(&self, address: u32, len: usize) -> bool {
        let start = self.start_address as u64;
        let end = start + self.flash_size as u64;
        let record_end = address as u64 + len as u64;

        address as u64 >= start && record_end <= end
    }
}

/// Decode the CRC from a validated Crc response.
pub fn decode_crc(frame: &[u8]) -> Option<u32> {
    read_u32_le(frame, 2)
}

fn read_u32_le(frame: &[u8], offset: usize) -> Option<u32> {
    let bytes = frame.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
