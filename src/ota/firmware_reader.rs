//! Firmware image reader for Intel HEX files.
//!
//! Produces the `(address, data)` records the update pipeline writes, one
//! record per HEX data line. Address extension records are folded into the
//! record addresses; start address records are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Result type alias for firmware image operations.
pub type FirmwareResult<T> = Result<T, FirmwareError>;

/// Errors that can occur while reading a firmware image.
#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("Failed to read firmware image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid HEX record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("Checksum mismatch on line {line}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { line: usize, expected: u8, actual: u8 },

    #[error("Unsupported HEX record type 0x{record_type:02X} on line {line}")]
    UnsupportedRecordType { line: usize, record_type: u8 },

    #[error("Firmware image ended without an end-of-file record")]
    MissingEndRecord,
}

/// One block of firmware data and the flash address it belongs at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRecord {
    pub address: u32,
    pub data: Vec<u8>,
}

impl FirmwareRecord {
    pub fn new(address: u32, data: Vec<u8>) -> Self {
        Self { address, data }
    }
}

/// Forward-only source of firmware records.
///
/// Returns `Ok(None)` once the end of the image is reached. Sources are
/// never rewound; reading an image twice means opening it twice.
pub trait FirmwareSource {
    fn read(&mut self) -> FirmwareResult<Option<FirmwareRecord>>;
}

impl FirmwareSource for std::vec::IntoIter<FirmwareRecord> {
    fn read(&mut self) -> FirmwareResult<Option<FirmwareRecord>> {
        Ok(self.next())
    }
}

impl<S: FirmwareSource + ?Sized> FirmwareSource for &mut S {
    fn read(&mut self) -> FirmwareResult<Option<FirmwareRecord>> {
        (**self).read()
    }
}

// Intel HEX record types
const RECORD_DATA: u8 = 0x00;
const RECORD_END_OF_FILE: u8 = 0x01;
const RECORD_EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
const RECORD_START_SEGMENT_ADDRESS: u8 = 0x03;
const RECORD_EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
const RECORD_START_LINEAR_ADDRESS: u8 = 0x05;

/// Streaming Intel HEX reader.
pub struct IntelHexReader<R: BufRead> {
    reader: R,
    line_number: usize,
    base_address: u32,
    finished: bool,
}

impl IntelHexReader<BufReader<File>> {
    /// Open a HEX file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> FirmwareResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> IntelHexReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            base_address: 0,
            finished: false,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> FirmwareError {
        FirmwareError::InvalidRecord {
            line: self.line_number,
            reason: reason.into(),
        }
    }

    /// Decode one `:LLAAAATT...CC` line into (type, address, data).
    fn parse_line(&self, line: &str) -> FirmwareResult<(u8, u16, Vec<u8>)> {
        let body = line
            .strip_prefix(':')
            .ok_or_else(|| self.invalid("missing ':' start code"))?;

        if body.len() % 2 != 0 {
            return Err(self.invalid("odd number of hex digits"));
        }

        let bytes = (0..body.len())
            .step_by(2)
            .map(|i| {
                body.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| self.invalid("non-hex character"))?;

        // Byte count, address (2), type and checksum.
        if bytes.len() < 5 {
            return Err(self.invalid("record too short"));
        }

        let count = bytes[0] as usize;
        if bytes.len() != count + 5 {
            return Err(self.invalid(format!(
                "byte count 0x{:02X} does not match record length",
                count
            )));
        }

        let (content, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = content
            .iter()
            .fold(0u8, |sum, b| sum.wrapping_add(*b))
            .wrapping_neg();
        if expected != checksum[0] {
            return Err(FirmwareError::ChecksumMismatch {
                line: self.line_number,
                expected,
                actual: checksum[0],
            });
        }

        let address = u16::from_be_bytes([bytes[1], bytes[2]]);
        let record_type = bytes[3];
        let data = bytes[4..4 + count].to_vec();

        Ok((record_type, address, data))
    }

    fn extended_address(&self, data: &[u8]) -> FirmwareResult<u32> {
        match data {
            [high, low] => Ok(u16::from_be_bytes([*high, *low]) as u32),
            _ => Err(self.invalid("address record must carry 2 bytes")),
        }
    }
}

impl<R: BufRead> FirmwareSource for IntelHexReader<R> {
    fn read(&mut self) -> FirmwareResult<Option<FirmwareRecord>> {
        if self.finished {
            return Ok(None);
        }

        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(FirmwareError::MissingEndRecord);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let (record_type, address, data) = self.parse_line(trimmed)?;

            match record_type {
                RECORD_DATA => {
                    let address = self.base_address.wrapping_add(address as u32);
                    return Ok(Some(FirmwareRecord { address, data }));
                }
                RECORD_END_OF_FILE => {
                    self.finished = true;
                    return Ok(None);
                }
                RECORD_EXTENDED_SEGMENT_ADDRESS => {
                    self.base_address = self.extended_address(&data)? << 4;
                }
                RECORD_EXTENDED_LINEAR_ADDRESS => {
                    self.base_address = self.extended_address(&data)? << 16;
                }
                RECORD_START_SEGMENT_ADDRESS | RECORD_START_LINEAR_ADDRESS => {}
                other => {
                    return Err(FirmwareError::UnsupportedRecordType {
                        line: self.line_number,
                        record_type: other,
                    })
                }
            }
        }
    }
}

/// Size and SHA-256 of a firmware file, reported before an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareDigest {
    pub size: u64,
    pub sha256: String,
}

/// Calculate the size and SHA-256 of a firmware file.
pub fn firmware_digest<P: AsRef<Path>>(path: P) -> FirmwareResult<FirmwareDigest> {
    let mut file = File::open(path)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok(FirmwareDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;
    use std::io::Cursor;

    fn reader(text: &str) -> IntelHexReader<Cursor<Vec<u8>>> {
        IntelHexReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn read_all<S: FirmwareSource>(source: &mut S) -> FirmwareResult<Vec<FirmwareRecord>> {
        let mut records = Vec::new();
        while let Some(record) = source.read()? {
            records.push(record);
        }
        Ok(records)
    }

    #[test]
    fn test_read_data_records() {
        let mut hex = reader(
            ":0400000001020304F2\n\
             :02001000AABB89\n\
             :00000001FF\n",
        );

        let records = read_all(&mut hex).unwrap();

        assert_eq!(
            records,
            vec![
                FirmwareRecord::new(0x0000, vec![0x01, 0x02, 0x03, 0x04]),
                FirmwareRecord::new(0x0010, vec![0xAA, 0xBB]),
            ]
        );
        // Exhausted sources stay exhausted.
        assert_eq!(hex.read().unwrap(), None);
    }

    #[test]
    fn test_extended_linear_address() {
        let mut hex = reader(
            ":020000040001F9\n\
             :01002000558A\n\
             :00000001FF\n",
        );

        let records = read_all(&mut hex).unwrap();

        assert_eq!(records, vec![FirmwareRecord::new(0x0001_0020, vec![0x55])]);
    }

    #[test]
    fn test_extended_segment_address() {
        let mut hex = reader(
            ":020000021000EC\n\
             :0100040042B9\n\
             :00000001FF\n",
        );

        let records = read_all(&mut hex).unwrap();

        assert_eq!(records, vec![FirmwareRecord::new(0x0001_0004, vec![0x42])]);
    }

    #[test]
    fn test_start_address_and_blank_lines_skipped() {
        let mut hex = reader(
            "\r\n:04000005000020C116\r\n\r\n:0100000011EE\r\n:00000001FF\r\n",
        );

        let records = read_all(&mut hex).unwrap();

        assert_eq!(records, vec![FirmwareRecord::new(0, vec![0x11])]);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut hex = reader(":0100000011EF\n:00000001FF\n");

        assert!(matches!(
            hex.read(),
            Err(FirmwareError::ChecksumMismatch {
                line: 1,
                expected: 0xEE,
                actual: 0xEF
            })
        ));
    }

    #[test]
    fn test_byte_count_mismatch() {
        let mut hex = reader(":0200000011ED\n");

        assert!(matches!(
            hex.read(),
            Err(FirmwareError::InvalidRecord { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_start_code() {
        let mut hex = reader("0100000011EE\n");

        assert!(matches!(hex.read(), Err(FirmwareError::InvalidRecord { .. })));
    }

    #[test]
    fn test_missing_end_record() {
        let mut hex = reader(":0100000011EE\n");

        assert!(hex.read().unwrap().is_some());
        assert!(matches!(hex.read(), Err(FirmwareError::MissingEndRecord)));
    }

    #[test]
    fn test_unsupported_record_type() {
        let mut hex = reader(":0000000AF6\n");

        assert!(matches!(
            hex.read(),
            Err(FirmwareError::UnsupportedRecordType {
                record_type: 0x0A,
                ..
            })
        ));
    }

    #[test]
    fn test_open_file() {
        let ctx = TestContext::new();
        let records = vec![
            FirmwareRecord::new(0x2000, vec![0x00, 0x80, 0x00, 0x20]),
            FirmwareRecord::new(0x2004, vec![0xC1, 0x20, 0x00, 0x00]),
        ];
        let path = ctx.create_hex_file("app.hex", &records);

        let mut hex = IntelHexReader::open(&path).unwrap();

        assert_eq!(read_all(&mut hex).unwrap(), records);
    }

    #[test]
    fn test_open_nonexistent_file() {
        let result = IntelHexReader::open("/nonexistent/path/app.hex");

        assert!(matches!(result, Err(FirmwareError::Io(_))));
    }

    #[test]
    fn test_in_memory_source() {
        let mut source = vec![FirmwareRecord::new(0x10, vec![1])].into_iter();

        assert_eq!(source.read().unwrap(), Some(FirmwareRecord::new(0x10, vec![1])));
        assert_eq!(source.read().unwrap(), None);
    }

    #[test]
    fn test_firmware_digest() {
        let ctx = TestContext::new();
        let path = ctx.create_file("test.txt", "hello world");

        let digest = firmware_digest(&path).unwrap();

        assert_eq!(digest.size, 11);
        assert_eq!(
            digest.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
