//! Scripted control channel used by the mgmt and server test suites

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::Result;
use crate::mgmt::constants::*;
use crate::mgmt::packet::ControlFrame;

/// How the fake controller answers a given opcode
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Reply with command-complete, status success
    Succeed,
    /// Reply with command-complete carrying this status
    Fail(u8),
    /// Never reply; the command must time out
    Silent,
}

/// What the fake controller observed, shared with the test body so it stays
/// readable after the channel moves into a worker thread
#[derive(Default)]
pub struct ChannelLog {
    pub sent: Vec<ControlFrame>,
    pub closed: bool,
}

impl ChannelLog {
    pub fn sent_opcodes(&self) -> Vec<u16> {
        self.sent.iter().map(|f| f.opcode).collect()
    }
}

/// A loopback channel that plays the controller's side of the protocol
pub struct ScriptedChannel {
    log: Arc<Mutex<ChannelLog>>,
    rx: VecDeque<ControlFrame>,
    behavior: HashMap<u16, Behavior>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(ChannelLog::default())),
            rx: VecDeque::new(),
            behavior: HashMap::new(),
        }
    }

    pub fn set_behavior(&mut self, opcode: u16, behavior: Behavior) {
        self.behavior.insert(opcode, behavior);
    }

    /// Queue an unsolicited event frame
    pub fn push_frame(&mut self, frame: ControlFrame) {
        self.rx.push_back(frame);
    }

    pub fn push_command_complete(&mut self, opcode: u16, index: u16, status: u8) {
        let mut payload = opcode.to_le_bytes().to_vec();
        payload.push(status);
        self.rx
            .push_back(ControlFrame::new(MGMT_EV_CMD_COMPLETE, index, payload));
    }

    /// Handle onto the observation log
    pub fn log_handle(&self) -> Arc<Mutex<ChannelLog>> {
        self.log.clone()
    }

    pub fn sent_opcodes(&self) -> Vec<u16> {
        self.log.lock().unwrap().sent_opcodes()
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl super::ControlChannel for ScriptedChannel {
    fn send(&mut self, frame: &ControlFrame) -> Result<()> {
        let behavior = self
            .behavior
            .get(&frame.opcode)
            .copied()
            .unwrap_or(Behavior::Succeed);
        match behavior {
            Behavior::Succeed => {
                self.push_command_complete(frame.opcode, frame.index, MGMT_STATUS_SUCCESS)
            }
            Behavior::Fail(status) => {
                self.push_command_complete(frame.opcode, frame.index, status)
            }
            Behavior::Silent => {}
        }
        self.log.lock().unwrap().sent.push(frame.clone());
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        if self.rx.is_empty() {
            // Let the clock advance so pending-command timeouts can expire
            std::thread::sleep(timeout.min(Duration::from_millis(1)));
            return Ok(false);
        }
        Ok(true)
    }

    fn receive(&mut self) -> Result<Vec<ControlFrame>> {
        Ok(self.rx.drain(..).collect())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}
