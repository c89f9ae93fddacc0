//! Radio command channel for the RfmUsb transceiver.
//!
//! Every device property is an explicit getter/setter pair. Each call is a
//! full command round trip, so it returns a `Result` and is never hidden
//! behind plain field access.
//!
//! Packet exchange runs as a small state machine:
//! 1. **Idle** - Write the payload into the device FIFO
//! 2. **Transmit** - Switch to Tx mode
//! 3. **AwaitSent** - Wait for the DIO interrupt, require `1:PACKET_SENT`
//! 4. **Receive** - Switch to Rx mode
//! 5. **AwaitReceived** - Wait for the DIO interrupt, require `1:PAYLOAD_READY`
//! 6. **Standby** - Switch to Standby mode and read the FIFO
//!
//! A failure leaves the radio in whatever mode was last acknowledged.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::config::{
    dio_mapping_acknowledgement, from_hex, Dio, DioMapping, EnterCondition,
    ExitCondition, IntermediateMode, Mode, CMD_DIO_MAPPING, CMD_FIFO, CMD_IRQ_FLAGS,
    CMD_OPERATING_MODE, CMD_RESET, CMD_TRANSMIT, CMD_TRANSMIT_RECEIVE, CMD_VERSION,
    CODE_DIO_INTERRUPT_MASK, CODE_ENTER_CONDITION, CODE_EXIT_CONDITION, CODE_FIFO_THRESHOLD,
    CODE_INTERMEDIATE_MODE, CODE_OUTPUT_POWER, CODE_PAYLOAD_LENGTH, CODE_RADIO_CONFIG,
    CODE_SYNC, CODE_TX_START_CONDITION, CODE_VARIABLE_LENGTH, IRQ_FLAG_COUNT,
    IRQ_PACKET_SENT_INDEX, IRQ_PACKET_SENT_SET, IRQ_PAYLOAD_READY_INDEX,
    IRQ_PAYLOAD_READY_SET, OPEN_TIMEOUT, RESPONSE_OK, TRANSMIT_FAILURE_TOKENS,
};
use super::error::{RfmError, RfmResult};
use super::line::{IrqNotification, Line};
use super::transport::{is_device_missing, SerialTransport};
use crate::traits::PacketLink;

/// Last known value of each device-resident property.
///
/// A value is only present after a successful read or write. A failed
/// write clears it, since the device state is then unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfiguration {
    pub payload_length: Option<u8>,
    pub variable_length: Option<bool>,
    pub fifo_threshold: Option<u8>,
    pub dio_interrupt_mask: Option<u8>,
    pub enter_condition: Option<EnterCondition>,
    pub intermediate_mode: Option<IntermediateMode>,
    pub exit_condition: Option<ExitCondition>,
    pub tx_start_condition: Option<bool>,
    pub output_power: Option<i8>,
    pub sync_word: Option<Vec<u8>>,
    pub radio_config: Option<u8>,
}

/// Packet exchange handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Idle,
    Transmit,
    AwaitSent,
    Receive,
    AwaitReceived,
    Standby,
}

/// Text command channel to an RfmUsb device over a serial transport.
pub struct RadioChannel<T: SerialTransport> {
    transport: T,
    config: ChannelConfiguration,
    retry_count: u8,
    version: Option<String>,
    mode: Option<Mode>,
}

impl<T: SerialTransport> RadioChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: ChannelConfiguration::default(),
            retry_count: 0,
            version: None,
            mode: None,
        }
    }

    /// Open the serial port.
    ///
    /// Opening an already open channel is a no-op. If the port does not
    /// exist the error lists the ports that do.
    pub fn open(&mut self, path: &str, baud_rate: u32) -> RfmResult<()> {
        if self.transport.is_open() {
            debug!("Serial port already open, ignoring open of [{}]", path);
            return Ok(());
        }

        self.transport.set_read_timeout(OPEN_TIMEOUT)?;
        self.transport.set_write_timeout(OPEN_TIMEOUT)?;

        match self.transport.open(path, baud_rate) {
            Ok(()) => {
                debug!("Opened serial port [{}] at {} baud", path, baud_rate);
                Ok(())
            }
            Err(e) => {
                debug!("Exception occurred opening serial port: {}", e);
                // Leave no half-open handle behind for the next attempt.
                if self.transport.is_open() {
                    self.transport.close().ok();
                }

                match e {
                    RfmError::Serial(ref serial) if is_device_missing(serial) => {
                        Err(RfmError::DeviceNotFound {
                            path: path.to_string(),
                            available: self.transport.available_paths(),
                        })
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Close the serial port. Safe to call any number of times.
    pub fn close(&mut self) -> RfmResult<()> {
        if self.transport.is_open() {
            self.transport.close()?;
            debug!("Serial port closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Cached property values.
    pub fn configuration(&self) -> &ChannelConfiguration {
        &self.config
    }

    /// Mode set by the last acknowledged transition.
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    // ========================================================================
    // Device control
    // ========================================================================

    /// Firmware version string, read once and cached.
    pub fn version(&mut self) -> RfmResult<String> {
        if let Some(version) = &self.version {
            return Ok(version.clone());
        }

        let version = self.send_command(CMD_VERSION)?;
        self.version = Some(version.clone());
        Ok(version)
    }

    /// Reset the device. Restores register defaults, so the cache is cleared.
    pub fn reset(&mut self) -> RfmResult<()> {
        self.send_command_with_check(CMD_RESET, RESPONSE_OK)?;
        self.config = ChannelConfiguration::default();
        self.mode = None;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> RfmResult<()> {
        let command = format!("{} {}", CMD_OPERATING_MODE, mode as u8);
        self.send_command_with_check(&command, &mode.acknowledgement())?;
        self.mode = Some(mode);
        Ok(())
    }

    pub fn set_dio_mapping(&mut self, dio: Dio, mapping: DioMapping) -> RfmResult<()> {
        let command = format!("{} {} {}", CMD_DIO_MAPPING, dio as u8, mapping as u8);
        self.send_command_with_check(&command, &dio_mapping_acknowledgement(dio, mapping))
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn payload_length(&mut self) -> RfmResult<u8> {
        let value = self.read_byte_property(CODE_PAYLOAD_LENGTH)?;
        self.config.payload_length = Some(value);
        Ok(value)
    }

    pub fn set_payload_length(&mut self, value: u8) -> RfmResult<()> {
        self.config.payload_length = Some(value);
        self.write_property(CODE_PAYLOAD_LENGTH, hex_byte(value), |c| {
            c.payload_length = None
        })
    }

    pub fn variable_length(&mut self) -> RfmResult<bool> {
        let value = self.read_byte_property(CODE_VARIABLE_LENGTH)? == 1;
        self.config.variable_length = Some(value);
        Ok(value)
    }

    pub fn set_variable_length(&mut self, value: bool) -> RfmResult<()> {
        self.config.variable_length = Some(value);
        self.write_property(CODE_VARIABLE_LENGTH, hex_flag(value), |c| {
            c.variable_length = None
        })
    }

    pub fn fifo_threshold(&mut self) -> RfmResult<u8> {
        let value = self.read_byte_property(CODE_FIFO_THRESHOLD)?;
        self.config.fifo_threshold = Some(value);
        Ok(value)
    }

    pub fn set_fifo_threshold(&mut self, value: u8) -> RfmResult<()> {
        self.config.fifo_threshold = Some(value);
        self.write_property(CODE_FIFO_THRESHOLD, hex_byte(value), |c| {
            c.fifo_threshold = None
        })
    }

    pub fn dio_interrupt_mask(&mut self) -> RfmResult<u8> {
        let value = self.read_byte_property(CODE_DIO_INTERRUPT_MASK)?;
        self.config.dio_interrupt_mask = Some(value);
        Ok(value)
    }

    pub fn set_dio_interrupt_mask(&mut self, value: u8) -> RfmResult<()> {
        self.config.dio_interrupt_mask = Some(value);
        self.write_property(CODE_DIO_INTERRUPT_MASK, hex_byte(value), |c| {
            c.dio_interrupt_mask = None
        })
    }

    pub fn enter_condition(&mut self) -> RfmResult<EnterCondition> {
        let byte = self.read_byte_property(CODE_ENTER_CONDITION)?;
        let value = EnterCondition::from_byte(byte)
            .ok_or_else(|| invalid_register(CODE_ENTER_CONDITION, byte))?;
        self.config.enter_condition = Some(value);
        Ok(value)
    }

    pub fn set_enter_condition(&mut self, value: EnterCondition) -> RfmResult<()> {
        self.config.enter_condition = Some(value);
        self.write_property(CODE_ENTER_CONDITION, hex_byte(value as u8), |c| {
            c.enter_condition = None
        })
    }

    pub fn intermediate_mode(&mut self) -> RfmResult<IntermediateMode> {
        let byte = self.read_byte_property(CODE_INTERMEDIATE_MODE)?;
        let value = IntermediateMode::from_byte(byte)
            .ok_or_else(|| invalid_register(CODE_INTERMEDIATE_MODE, byte))?;
        self.config.intermediate_mode = Some(value);
        Ok(value)
    }

    pub fn set_intermediate_mode(&mut self, value: IntermediateMode) -> RfmResult<()> {
        self.config.intermediate_mode = Some(value);
        self.write_property(CODE_INTERMEDIATE_MODE, hex_byte(value as u8), |c| {
            c.intermediate_mode = None
        })
    }

    pub fn exit_condition(&mut self) -> RfmResult<ExitCondition> {
        let byte = self.read_byte_property(CODE_EXIT_CONDITION)?;
        let value = ExitCondition::from_byte(byte)
            .ok_or_else(|| invalid_register(CODE_EXIT_CONDITION, byte))?;
        self.config.exit_condition = Some(value);
        Ok(value)
    }

    pub fn set_exit_condition(&mut self, value: ExitCondition) -> RfmResult<()> {
        self.config.exit_condition = Some(value);
        self.write_property(CODE_EXIT_CONDITION, hex_byte(value as u8), |c| {
            c.exit_condition = None
        })
    }

    pub fn tx_start_condition(&mut self) -> RfmResult<bool> {
        let value = self.read_byte_property(CODE_TX_START_CONDITION)? == 1;
        self.config.tx_start_condition = Some(value);
        Ok(value)
    }

    pub fn set_tx_start_condition(&mut self, value: bool) -> RfmResult<()> {
        self.config.tx_start_condition = Some(value);
        self.write_property(CODE_TX_START_CONDITION, hex_flag(value), |c| {
            c.tx_start_condition = None
        })
    }

    pub fn radio_config(&mut self) -> RfmResult<u8> {
        let value = self.read_byte_property(CODE_RADIO_CONFIG)?;
        self.config.radio_config = Some(value);
        Ok(value)
    }

    pub fn set_radio_config(&mut self, value: u8) -> RfmResult<()> {
        self.config.radio_config = Some(value);
        self.write_property(CODE_RADIO_CONFIG, hex_byte(value), |c| c.radio_config = None)
    }

    pub fn sync_word(&mut self) -> RfmResult<Vec<u8>> {
        let command = format!("g-{}", CODE_SYNC);
        let reply = self.send_command(&command)?;
        let value = from_hex(&reply).ok_or(RfmError::InvalidResponse {
            command,
            response: reply,
        })?;
        self.config.sync_word = Some(value.clone());
        Ok(value)
    }

    pub fn set_sync_word(&mut self, value: &[u8]) -> RfmResult<()> {
        self.config.sync_word = Some(value.to_vec());
        self.write_property(CODE_SYNC, hex::encode_upper(value), |c| c.sync_word = None)
    }

    /// Output power in dBm.
    pub fn output_power(&mut self) -> RfmResult<i8> {
        let command = format!("g-{}", CODE_OUTPUT_POWER);
        let reply = self.send_command(&command)?;
        let value = reply
            .trim()
            .parse::<i8>()
            .map_err(|_| RfmError::InvalidResponse {
                command,
                response: reply.clone(),
            })?;
        self.config.output_power = Some(value);
        Ok(value)
    }

    pub fn set_output_power(&mut self, dbm: i8) -> RfmResult<()> {
        self.config.output_power = Some(dbm);
        self.write_property(CODE_OUTPUT_POWER, dbm.to_string(), |c| c.output_power = None)
    }

    /// Link-layer retry budget for `transmit`/`transmit_receive`.
    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn set_retry_count(&mut self, retries: u8) {
        self.retry_count = retries;
    }

    /// How long to wait for any single reply or notification line.
    pub fn response_timeout(&self) -> Duration {
        self.transport.read_timeout()
    }

    pub fn set_response_timeout(&mut self, timeout: Duration) -> RfmResult<()> {
        self.transport.set_read_timeout(timeout)?;
        self.transport.set_write_timeout(timeout)
    }

    // ========================================================================
    // Packet operations
    // ========================================================================

    /// Load `data` into the FIFO and start transmitting without waiting
    /// for the packet to be sent or answered.
    pub fn send_packet(&mut self, data: &[u8]) -> RfmResult<()> {
        self.write_fifo(data)?;
        self.set_mode(Mode::Tx)
    }

    /// Transmit `data` and return the packet received in reply.
    pub fn exchange_packet(&mut self, data: &[u8]) -> RfmResult<Vec<u8>> {
        let mut state = ExchangeState::Idle;

        loop {
            trace!("Packet exchange state: {:?}", state);

            state = match state {
                ExchangeState::Idle => {
                    self.write_fifo(data)?;
                    ExchangeState::Transmit
                }
                ExchangeState::Transmit => {
                    self.set_mode(Mode::Tx)?;
                    ExchangeState::AwaitSent
                }
                ExchangeState::AwaitSent => {
                    self.wait_for_irq()?;
                    self.check_irq_flag(IRQ_PACKET_SENT_INDEX, IRQ_PACKET_SENT_SET)?;
                    ExchangeState::Receive
                }
                ExchangeState::Receive => {
                    self.set_mode(Mode::Rx)?;
                    ExchangeState::AwaitReceived
                }
                ExchangeState::AwaitReceived => {
                    self.wait_for_irq()?;
                    self.check_irq_flag(IRQ_PAYLOAD_READY_INDEX, IRQ_PAYLOAD_READY_SET)?;
                    ExchangeState::Standby
                }
                ExchangeState::Standby => {
                    self.set_mode(Mode::Standby)?;
                    return self.read_fifo();
                }
            };
        }
    }

    /// Transmit `data` with the device's own `e-tx` command.
    pub fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> RfmResult<()> {
        let command = format!("{} {} {}", CMD_TRANSMIT, hex::encode_upper(data), timeout_ms);
        self.send_with_retries(&command).map(|_| ())
    }

    /// Transmit `data` and receive the reply with the device's own `e-txrx`
    /// command.
    ///
    /// The device reports a failed link-layer attempt with a `TX` or `RX`
    /// token. The command is reissued until the retry budget is spent.
    pub fn transmit_receive(&mut self, data: &[u8], timeout_ms: u32) -> RfmResult<Vec<u8>> {
        let command = format!(
            "{} {} {}",
            CMD_TRANSMIT_RECEIVE,
            hex::encode_upper(data),
            timeout_ms
        );
        let reply = self.send_with_retries(&command)?;

        from_hex(&reply).ok_or(RfmError::InvalidResponse {
            command,
            response: reply,
        })
    }

    // ========================================================================
    // Command plumbing
    // ========================================================================

    fn send_with_retries(&mut self, command: &str) -> RfmResult<String> {
        let mut retries = self.retry_count;

        loop {
            let reply = self.send_command(command)?;

            if !is_transmit_failure(&reply) {
                return Ok(reply);
            }

            if retries == 0 {
                return Err(RfmError::TransmitFailed { response: reply });
            }

            retries -= 1;
            warn!(
                "Transmission failed [{}], {} retries remaining",
                reply, retries
            );
        }
    }

    fn write_fifo(&mut self, data: &[u8]) -> RfmResult<()> {
        let command = format!("s-{} {}", CMD_FIFO, hex::encode_upper(data));
        self.send_command_with_check(&command, RESPONSE_OK)
    }

    fn read_fifo(&mut self) -> RfmResult<Vec<u8>> {
        let command = format!("g-{}", CMD_FIFO);
        let reply = self.send_command(&command)?;

        from_hex(&reply).ok_or(RfmError::InvalidResponse {
            command,
            response: reply,
        })
    }

    /// Block until the next DIO interrupt notification.
    fn wait_for_irq(&mut self) -> RfmResult<IrqNotification> {
        let raw = self.transport.read_line()?;

        match Line::classify(raw) {
            Line::Notification(irq) => {
                let enabled = self.config.dio_interrupt_mask.unwrap_or(0xFF);
                if !irq.matches(enabled) {
                    return Err(RfmError::UnexpectedNotification { line: irq.raw });
                }
                debug!("Interrupt: [{}]", irq.raw);
                Ok(irq)
            }
            Line::Reply(line) => Err(RfmError::UnexpectedReply { line }),
        }
    }

    /// Read the interrupt flag table and require `expected` at `index`.
    fn check_irq_flag(&mut self, index: usize, expected: &str) -> RfmResult<()> {
        self.transport.write_line(CMD_IRQ_FLAGS)?;

        // Always drain the whole table so the next command starts in sync.
        let mut flags = Vec::with_capacity(IRQ_FLAG_COUNT);
        for _ in 0..IRQ_FLAG_COUNT {
            flags.push(self.read_reply()?);
        }
        debug!("Command: [{}] Result: [{}]", CMD_IRQ_FLAGS, flags.join(", "));

        if flags[index] != expected {
            return Err(RfmError::PacketNotSent {
                expected: expected.to_string(),
                actual: flags[index].clone(),
            });
        }

        Ok(())
    }

    /// Read the next line, which must be a command reply.
    fn read_reply(&mut self) -> RfmResult<String> {
        match Line::classify(self.transport.read_line()?) {
            Line::Reply(line) => Ok(line),
            Line::Notification(irq) => Err(RfmError::UnexpectedNotification { line: irq.raw }),
        }
    }

    fn send_command(&mut self, command: &str) -> RfmResult<String> {
        self.transport.write_line(command)?;
        let reply = self.read_reply()?;

        debug!("Command: [{}] Result: [{}]", command, reply);

        Ok(reply)
    }

    fn send_command_with_check(&mut self, command: &str, expected: &str) -> RfmResult<()> {
        let reply = self.send_command(command)?;

        if !reply.starts_with(expected) {
            return Err(RfmError::CommandExecutionFailed {
                command: command.to_string(),
                response: reply,
            });
        }

        Ok(())
    }

    fn read_byte_property(&mut self, code: &str) -> RfmResult<u8> {
        let command = format!("g-{}", code);
        let reply = self.send_command(&command)?;

        from_hex(&reply)
            .and_then(|bytes| bytes.first().copied())
            .ok_or(RfmError::InvalidResponse {
                command,
                response: reply,
            })
    }

    fn write_property<F>(&mut self, code: &str, value: String, invalidate: F) -> RfmResult<()>
    where
        F: FnOnce(&mut ChannelConfiguration),
    {
        let command = format!("s-{} {}", code, value);
        let result = self.send_command_with_check(&command, RESPONSE_OK);

        if result.is_err() {
            invalidate(&mut self.config);
        }

        result
    }
}

impl<T: SerialTransport> PacketLink for RadioChannel<T> {
    fn exchange_packet(&mut self, data: &[u8]) -> RfmResult<Vec<u8>> {
        RadioChannel::exchange_packet(self, data)
    }

    fn send_packet(&mut self, data: &[u8]) -> RfmResult<()> {
        RadioChannel::send_packet(self, data)
    }
}

impl<T: SerialTransport> Drop for RadioChannel<T> {
    fn drop(&mut self) {
        self.close().ok();
    }
}

fn hex_byte(value: u8) -> String {
    format!("0x{:X}", value)
}

fn hex_flag(value: bool) -> String {
    format!("0x{:02X}", value as u8)
}

fn is_transmit_failure(reply: &str) -> bool {
    TRANSMIT_FAILURE_TOKENS
        .iter()
        .any(|token| reply.contains(token))
}

fn invalid_register(code: &str, byte: u8) -> RfmError {
    RfmError::InvalidResponse {
        command: format!("g-{}", code),
        response: hex_byte(byte),
    }
}
