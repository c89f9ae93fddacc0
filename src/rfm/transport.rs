//! Serial transport layer for RfmUsb communication.
//!
//! Provides a trait-based, line-oriented abstraction over the serial port,
//! enabling both real hardware and scripted testing.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::debug;

use super::config::{NEW_LINE, OPEN_TIMEOUT};
use super::device::available_port_names;
use super::error::{RfmError, RfmResult};

/// Trait for the serial link underneath the radio command channel.
pub trait SerialTransport: Send {
    /// Open the port at `path`.
    fn open(&mut self, path: &str, baud_rate: u32) -> RfmResult<()>;

    /// Close the port. Closing an already closed port is a no-op.
    fn close(&mut self) -> RfmResult<()>;

    /// Whether the port is currently open.
    fn is_open(&self) -> bool;

    /// Write raw bytes.
    fn write(&mut self, data: &[u8]) -> RfmResult<()>;

    /// Write `text` followed by the line terminator.
    fn write_line(&mut self, text: &str) -> RfmResult<()> {
        let mut line = String::with_capacity(text.len() + NEW_LINE.len());
        line.push_str(text);
        line.push_str(NEW_LINE);
        self.write(line.as_bytes())
    }

    /// Read one line, without its terminator.
    ///
    /// Fails with [`RfmError::Timeout`] if no complete line arrives
    /// within the read timeout.
    fn read_line(&mut self) -> RfmResult<String>;

    /// Current read timeout.
    fn read_timeout(&self) -> Duration;

    fn set_read_timeout(&mut self, timeout: Duration) -> RfmResult<()>;

    fn set_write_timeout(&mut self, timeout: Duration) -> RfmResult<()>;

    /// Serial ports present on this machine, used to enrich open failures.
    fn available_paths(&self) -> Vec<String>;
}

/// Longest line accepted before the receive buffer is discarded.
const MAX_LINE_LEN: usize = 1024;

/// Serial port transport implementation.
pub struct SerialPortTransport {
    port: Option<Box<dyn SerialPort>>,
    rx_buf: Vec<u8>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialPortTransport {
    pub fn new() -> Self {
        Self {
            port: None,
            rx_buf: Vec::with_capacity(256),
            read_timeout: OPEN_TIMEOUT,
            write_timeout: OPEN_TIMEOUT,
        }
    }

    fn port_mut(&mut self) -> RfmResult<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(RfmError::NotOpen)
    }
}

impl Default for SerialPortTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport for SerialPortTransport {
    /// Open the port with 8N1 framing, no flow control and DTR/RTS asserted.
    ///
    /// Includes retry logic for transient failures while a USB serial
    /// adapter is still enumerating.
    fn open(&mut self, path: &str, baud_rate: u32) -> RfmResult<()> {
        let normalized_name = normalize_port_name(path);

        const MAX_OPEN_RETRIES: u32 = 10;
        const RETRY_DELAY_MS: u64 = 200;

        let mut attempt = 0;
        loop {
            match serialport::new(&normalized_name, baud_rate)
                .timeout(self.read_timeout)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .open()
            {
                Ok(mut port) => {
                    port.write_data_terminal_ready(true)?;
                    port.write_request_to_send(true)?;
                    port.clear(serialport::ClearBuffer::Input).ok();

                    self.rx_buf.clear();
                    self.port = Some(port);
                    return Ok(());
                }
                Err(e) => {
                    let err_str = e.to_string().to_lowercase();
                    let is_transient = err_str.contains("not functioning")
                        || err_str.contains("temporarily unavailable")
                        || err_str.contains("interrupted");

                    attempt += 1;
                    if is_transient && attempt < MAX_OPEN_RETRIES {
                        debug!("Transient error opening [{}]: {}", path, e);
                        std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                        continue;
                    }

                    return Err(RfmError::Serial(e));
                }
            }
        }
    }

    fn close(&mut self) -> RfmResult<()> {
        if let Some(mut port) = self.port.take() {
            port.flush().ok();
        }
        self.rx_buf.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> RfmResult<()> {
        let timeout = self.write_timeout;
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;

        match port.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(RfmError::Timeout),
            Err(e) => Err(RfmError::Io(e)),
        }
    }

    fn read_line(&mut self) -> RfmResult<String> {
        if let Some(line) = take_line(&mut self.rx_buf) {
            return Ok(line);
        }

        let timeout = self.read_timeout;
        let port = self.port.as_mut().ok_or(RfmError::NotOpen)?;
        port.set_timeout(timeout)?;

        read_line_within(port, &mut self.rx_buf, timeout)
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> RfmResult<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Duration) -> RfmResult<()> {
        self.write_timeout = timeout;
        Ok(())
    }

    fn available_paths(&self) -> Vec<String> {
        available_port_names()
    }
}

/// Split the first complete line off the receive buffer.
fn take_line(rx_buf: &mut Vec<u8>) -> Option<String> {
    let end = rx_buf.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = rx_buf.drain(..=end).collect();
    let text = String::from_utf8_lossy(&line);
    Some(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Read from `reader` until a full line is buffered or `timeout` elapses.
///
/// The deadline covers the whole line, so a port that keeps returning
/// zero bytes or trickles bytes without a terminator still times out.
fn read_line_within<R: Read + ?Sized>(
    reader: &mut R,
    rx_buf: &mut Vec<u8>,
    timeout: Duration,
) -> RfmResult<String> {
    let deadline = Instant::now() + timeout;
    let mut buffer = [0u8; 64];

    loop {
        if Instant::now() >= deadline {
            return Err(RfmError::Timeout);
        }

        let read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(RfmError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(RfmError::Io(e)),
        };

        if read == 0 {
            continue;
        }

        rx_buf.extend_from_slice(&buffer[..read]);
        if let Some(line) = take_line(rx_buf) {
            return Ok(line);
        }

        if rx_buf.len() > MAX_LINE_LEN {
            rx_buf.clear();
            return Err(RfmError::LineTooLong {
                limit: MAX_LINE_LEN,
            });
        }
    }
}

/// Whether a serialport error means the device path does not exist.
pub fn is_device_missing(error: &serialport::Error) -> bool {
    matches!(
        error.kind(),
        serialport::ErrorKind::NoDevice
            | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound)
    )
}

/// Normalize a port name for cross-platform compatibility.
fn normalize_port_name(name: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        // Prefer cu. over tty. for better compatibility
        if name.starts_with("/dev/tty.") {
            return name.replace("/dev/tty.", "/dev/cu.");
        }
    }

    #[cfg(target_os = "windows")]
    {
        // COM ports > 9 need \\.\\ prefix
        if name.starts_with("COM") {
            if let Ok(n) = name[3..].parse::<u32>() {
                if n > 9 {
                    return format!("\\\\.\\{}", name);
                }
            }
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_port_name_passthrough() {
        assert_eq!(normalize_port_name("/dev/ttyUSB0"), "/dev/ttyUSB0");
        assert_eq!(normalize_port_name("COM1"), "COM1");
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_normalize_port_name_windows_high_com() {
        assert_eq!(normalize_port_name("COM9"), "COM9");
        assert_eq!(normalize_port_name("COM10"), "\\\\.\\COM10");
    }

    #[test]
    fn test_is_device_missing() {
        let missing = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let not_found = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound),
            "No such file or directory",
        );
        let denied = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );

        assert!(is_device_missing(&missing));
        assert!(is_device_missing(&not_found));
        assert!(!is_device_missing(&denied));
    }

    /// Reader returning the same chunk on every call.
    struct RepeatingReader(&'static [u8]);

    impl Read for RepeatingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.0.len().min(buf.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_take_line_strips_terminator() {
        let mut rx_buf = b"OK\r\n[0x0001]-Standby\r\npartial".to_vec();

        assert_eq!(take_line(&mut rx_buf).as_deref(), Some("OK"));
        assert_eq!(take_line(&mut rx_buf).as_deref(), Some("[0x0001]-Standby"));
        assert_eq!(take_line(&mut rx_buf), None);
        assert_eq!(rx_buf, b"partial");
    }

    #[test]
    fn test_read_line_within_keeps_remainder() {
        let mut reader: &[u8] = b"partial\r\nnext";
        let mut rx_buf = Vec::new();

        let line = read_line_within(&mut reader, &mut rx_buf, Duration::from_secs(1)).unwrap();

        assert_eq!(line, "partial");
        assert_eq!(rx_buf, b"next");
    }

    #[test]
    fn test_read_line_within_times_out_on_empty_reads() {
        let mut reader = RepeatingReader(b"");
        let mut rx_buf = Vec::new();

        let result = read_line_within(&mut reader, &mut rx_buf, Duration::from_millis(20));

        assert!(matches!(result, Err(RfmError::Timeout)));
    }

    #[test]
    fn test_read_line_within_caps_unterminated_input() {
        let mut reader = RepeatingReader(b"0123456789ABCDEF");
        let mut rx_buf = Vec::new();

        let result = read_line_within(&mut reader, &mut rx_buf, Duration::from_secs(5));

        assert!(matches!(
            result,
            Err(RfmError::LineTooLong { limit: MAX_LINE_LEN })
        ));
        assert!(rx_buf.is_empty());
    }

    #[test]
    fn test_operations_require_open_port() {
        let mut transport = SerialPortTransport::new();

        assert!(!transport.is_open());
        assert!(matches!(transport.write(b"x"), Err(RfmError::NotOpen)));
        assert!(matches!(transport.read_line(), Err(RfmError::NotOpen)));
        assert!(transport.close().is_ok());
    }
}
