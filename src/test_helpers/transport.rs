use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::rfm::config::OPEN_TIMEOUT;
use crate::rfm::{RfmError, RfmResult, SerialTransport};

#[derive(Debug)]
struct ScriptState {
    replies: VecDeque<String>,
    written: Vec<String>,
    open: bool,
    open_calls: usize,
    close_calls: usize,
    open_error: Option<serialport::ErrorKind>,
    available: Vec<String>,
    read_timeout: Duration,
    write_timeout: Duration,
}

/// Fake serial transport that replays scripted device lines.
///
/// Clones share state, so a test can keep one handle to inspect what the
/// channel wrote while the channel owns another. Reading past the end of
/// the script behaves like a read timeout.
#[derive(Clone)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                replies: VecDeque::new(),
                written: Vec::new(),
                open: false,
                open_calls: 0,
                close_calls: 0,
                open_error: None,
                available: Vec::new(),
                read_timeout: OPEN_TIMEOUT,
                write_timeout: OPEN_TIMEOUT,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script state poisoned")
    }

    /// Queue device lines to be read in order.
    pub fn push_replies(&self, lines: &[&str]) {
        self.state()
            .replies
            .extend(lines.iter().map(|line| line.to_string()));
    }

    pub fn push_script(&self, lines: Vec<String>) {
        self.state().replies.extend(lines);
    }

    /// Make `open` fail with the given serialport error kind.
    pub fn fail_open(&self, kind: serialport::ErrorKind) {
        self.state().open_error = Some(kind);
    }

    pub fn set_available(&self, paths: &[&str]) {
        self.state().available = paths.iter().map(|p| p.to_string()).collect();
    }

    /// Lines written so far, without terminators.
    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.state().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    /// Scripted lines not yet read.
    pub fn remaining(&self) -> usize {
        self.state().replies.len()
    }

    pub fn write_timeout(&self) -> Duration {
        self.state().write_timeout
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport for ScriptedTransport {
    fn open(&mut self, _path: &str, _baud_rate: u32) -> RfmResult<()> {
        let mut state = self.state();
        state.open_calls += 1;

        if let Some(kind) = state.open_error {
            return Err(RfmError::Serial(serialport::Error::new(
                kind,
                "scripted open failure",
            )));
        }

        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> RfmResult<()> {
        let mut state = self.state();
        state.close_calls += 1;
        state.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn write(&mut self, data: &[u8]) -> RfmResult<()> {
        let mut state = self.state();
        if !state.open {
            return Err(RfmError::NotOpen);
        }

        let line = String::from_utf8_lossy(data);
        state.written.push(line.trim_end_matches(['\r', '\n']).to_string());
        Ok(())
    }

    fn read_line(&mut self) -> RfmResult<String> {
        let mut state = self.state();
        if !state.open {
            return Err(RfmError::NotOpen);
        }

        state.replies.pop_front().ok_or(RfmError::Timeout)
    }

    fn read_timeout(&self) -> Duration {
        self.state().read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> RfmResult<()> {
        self.state().read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Duration) -> RfmResult<()> {
        self.state().write_timeout = timeout;
        Ok(())
    }

    fn available_paths(&self) -> Vec<String> {
        self.state().available.clone()
    }
}
