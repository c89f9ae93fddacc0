use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::ota::FirmwareRecord;

/// Test context with temporary directory management.
/// Automatically cleans up when dropped.
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content at the given relative path
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let path = self.path(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Write `records` as an Intel HEX file terminated by an end record.
    ///
    /// Records must sit below 64 KiB; no address extension records are
    /// emitted.
    pub fn create_hex_file(&self, relative_path: &str, records: &[FirmwareRecord]) -> PathBuf {
        let mut text = String::new();
        for record in records {
            text.push_str(&hex_line(record.address as u16, 0x00, &record.data));
        }
        text.push_str(&hex_line(0, 0x01, &[]));
        self.create_file(relative_path, &text)
    }

    /// Full path for a file that may not exist yet
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_line(address: u16, record_type: u8, data: &[u8]) -> String {
    let mut bytes = vec![data.len() as u8];
    bytes.extend_from_slice(&address.to_be_bytes());
    bytes.push(record_type);
    bytes.extend_from_slice(data);

    let checksum = bytes
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
        .wrapping_neg();
    bytes.push(checksum);

    format!(":{}\n", hex::encode_upper(bytes))
}
