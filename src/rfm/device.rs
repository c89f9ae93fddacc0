//! Serial port discovery.
//!
//! The updater never picks a port on its own; discovery only enriches the
//! error reported when the requested port cannot be opened.

use serialport::{available_ports, SerialPortInfo};
use tracing::debug;

/// Names of all serial ports currently present.
///
/// On macOS, filters out `tty.*` ports to avoid duplicates (each device
/// appears as both `cu.*` and `tty.*`).
pub fn available_port_names() -> Vec<String> {
    match available_ports() {
        Ok(ports) => port_names(ports),
        Err(e) => {
            debug!("Serial port enumeration failed: {}", e);
            Vec::new()
        }
    }
}

fn port_names(ports: Vec<SerialPortInfo>) -> Vec<String> {
    ports
        .into_iter()
        .map(|port| port.port_name)
        .filter(|name| !is_duplicate_tty(name))
        .collect()
}

#[cfg(target_os = "macos")]
fn is_duplicate_tty(name: &str) -> bool {
    name.starts_with("/dev/tty.")
}

#[cfg(not(target_os = "macos"))]
fn is_duplicate_tty(_name: &str) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::SerialPortType;

    fn port(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn test_port_names_preserve_order() {
        let names = port_names(vec![port("/dev/ttyUSB0"), port("/dev/ttyACM0")]);

        assert_eq!(names, vec!["/dev/ttyUSB0", "/dev/ttyACM0"]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_port_names_skip_macos_tty_duplicates() {
        let names = port_names(vec![
            port("/dev/cu.usbserial-1"),
            port("/dev/tty.usbserial-1"),
        ]);

        assert_eq!(names, vec!["/dev/cu.usbserial-1"]);
    }
}
