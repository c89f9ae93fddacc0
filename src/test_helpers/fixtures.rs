use crate::rfm::config::{IRQ_FLAG_NAMES, IRQ_PACKET_SENT_INDEX, IRQ_PAYLOAD_READY_INDEX};

/// Interrupt notification for DIO pin 0x01.
pub const IRQ_NOTIFICATION: &str = "DIO PIN IRQ [0x01]";

/// `g-irq` flag table with only the flag at `set` raised.
pub fn irq_flags(set: Option<usize>) -> Vec<String> {
    IRQ_FLAG_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let bit = if Some(i) == set { 1 } else { 0 };
            format!("{}:{}", bit, name)
        })
        .collect()
}

/// Device lines for a successful packet exchange returning `response`.
pub fn exchange_script(response: &[u8]) -> Vec<String> {
    let mut lines = vec![
        "OK".to_string(),
        "[0x0003]-Tx".to_string(),
        IRQ_NOTIFICATION.to_string(),
    ];
    lines.extend(irq_flags(Some(IRQ_PACKET_SENT_INDEX)));
    lines.push("[0x0004]-Rx".to_string());
    lines.push(IRQ_NOTIFICATION.to_string());
    lines.extend(irq_flags(Some(IRQ_PAYLOAD_READY_INDEX)));
    lines.push("[0x0001]-Standby".to_string());
    lines.push(hex::encode_upper(response));
    lines
}

/// Device lines for a fire-and-forget packet send.
pub fn send_script() -> Vec<String> {
    vec!["OK".to_string(), "[0x0003]-Tx".to_string()]
}

/// Device lines acknowledging the channel initialization with default
/// settings.
pub fn init_script() -> Vec<String> {
    [
        "OK",                  // e-r
        "RfmUsb Version: 1.0", // g-fv
        "OK",                  // s-pf
        "OK",                  // s-ft
        "[0x0001]-Map 01",     // s-dio
        "OK",                  // s-di
        "OK",                  // s-op
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}

pub fn ping_ok() -> Vec<u8> {
    vec![0x01, 0x81]
}

pub fn erase_ok() -> Vec<u8> {
    vec![0x01, 0x82]
}

pub fn write_ok() -> Vec<u8> {
    vec![0x01, 0x87]
}

pub fn crc_ok(crc: [u8; 4]) -> Vec<u8> {
    let mut frame = vec![0x05, 0x80];
    frame.extend_from_slice(&crc);
    frame
}

pub fn flash_size_ok(start_address: u32, flash_size: u32, write_size: u32) -> Vec<u8> {
    let mut frame = vec![0x0D, 0x83];
    frame.extend_from_slice(&start_address.to_le_bytes());
    frame.extend_from_slice(&flash_size.to_le_bytes());
    frame.extend_from_slice(&write_size.to_le_bytes());
    frame
}
