//! Adapter controller: correlated async commands over the control channel
//!
//! One command may be in flight per `(opcode, controller index)` pair; the
//! kernel replies strictly request/response per key, so a second issue on a
//! live key is refused outright. Completion, failure and timeout are all
//! delivered through the command's callback during `pump`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::mgmt::packet::{MgmtCommand, MgmtEvent, MgmtStatus};
use crate::mgmt::socket::{ControlChannel, MgmtSocket};

/// Slice of time one pump iteration may spend blocked in poll
const PUMP_SLICE: Duration = Duration::from_millis(50);

/// Terminal outcome of an issued command
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Complete { status: MgmtStatus, params: Vec<u8> },
    TimedOut,
}

pub type CommandCallback = Box<dyn FnOnce(CommandOutcome) + Send>;

/// Receives unsolicited events (new-settings, device-connected, ...)
pub type EventListener = Box<dyn FnMut(u16, &MgmtEvent) + Send>;

struct PendingCommand {
    issued_at: Instant,
    timeout: Duration,
    complete: CommandCallback,
}

/// Correlates commands and events for one control channel
pub struct MgmtAdapter<C: ControlChannel> {
    channel: C,
    pending: HashMap<(u16, u16), PendingCommand>,
    listeners: Vec<EventListener>,
}

impl MgmtAdapter<MgmtSocket> {
    /// Open the kernel management channel
    pub fn open() -> Result<Self> {
        Ok(Self::new(MgmtSocket::open()?))
    }
}

impl<C: ControlChannel> MgmtAdapter<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            pending: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn add_event_listener(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    /// Issue a command asynchronously. The callback fires from a later
    /// `pump` with the completion event or a timeout.
    pub fn issue_command(
        &mut self,
        command: &MgmtCommand,
        index: u16,
        timeout: Duration,
        on_complete: CommandCallback,
    ) -> Result<()> {
        let key = (command.opcode(), index);
        if self.pending.contains_key(&key) {
            return Err(Error::Protocol(format!(
                "command 0x{:04x} already pending on controller {}",
                key.0, key.1
            )));
        }

        let frame = command.to_frame(index);
        trace!(
            "mgmt tx opcode=0x{:04x} index={} payload={}",
            frame.opcode,
            frame.index,
            hex::encode(&frame.payload)
        );

        self.pending.insert(
            key,
            PendingCommand {
                issued_at: Instant::now(),
                timeout,
                complete: on_complete,
            },
        );
        if let Err(e) = self.channel.send(&frame) {
            self.pending.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    /// Drain available frames, routing each to the matching pending command
    /// or the event listeners, then expire overdue commands. Blocks at most
    /// `wait` in poll.
    pub fn pump(&mut self, wait: Duration) -> Result<()> {
        if self.channel.poll(wait)? {
            for frame in self.channel.receive()? {
                match MgmtEvent::parse(&frame) {
                    Ok(event) => self.route(frame.index, event),
                    Err(e) => warn!("dropping undecodable management event: {}", e),
                }
            }
        }
        self.expire_timeouts();
        Ok(())
    }

    fn route(&mut self, index: u16, event: MgmtEvent) {
        match event {
            MgmtEvent::CommandComplete {
                opcode,
                status,
                params,
            } => {
                trace!(
                    "mgmt rx complete opcode=0x{:04x} index={} status={}",
                    opcode,
                    index,
                    status
                );
                match self.pending.remove(&(opcode, index)) {
                    Some(pending) => (pending.complete)(CommandOutcome::Complete { status, params }),
                    None => warn!(
                        "command complete for 0x{:04x} on controller {} with nothing pending",
                        opcode, index
                    ),
                }
            }
            MgmtEvent::CommandStatus { opcode, status } => {
                trace!(
                    "mgmt rx status opcode=0x{:04x} index={} status={}",
                    opcode,
                    index,
                    status
                );
                // A success status only acknowledges the command; the
                // command-complete event is still owed. Failure is terminal.
                if !status.is_success() {
                    if let Some(pending) = self.pending.remove(&(opcode, index)) {
                        (pending.complete)(CommandOutcome::Complete {
                            status,
                            params: Vec::new(),
                        });
                    }
                }
            }
            other => {
                debug!("mgmt rx event on controller {}: {:?}", index, other);
                for listener in &mut self.listeners {
                    listener(index, &other);
                }
            }
        }
    }

    fn expire_timeouts(&mut self) {
        let now = Instant::now();
        let expired: Vec<(u16, u16)> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.issued_at) >= p.timeout)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            warn!(
                "command 0x{:04x} on controller {} timed out",
                key.0, key.1
            );
            if let Some(pending) = self.pending.remove(&key) {
                (pending.complete)(CommandOutcome::TimedOut);
            }
        }
    }

    /// Issue a command and pump until it completes. Convenience for the
    /// scripted bring-up, where each step is strictly sequential.
    pub fn run_command(
        &mut self,
        command: &MgmtCommand,
        index: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let opcode = command.opcode();
        let slot: Arc<Mutex<Option<CommandOutcome>>> = Arc::new(Mutex::new(None));
        let writer = slot.clone();

        self.issue_command(
            command,
            index,
            timeout,
            Box::new(move |outcome| {
                *writer.lock().unwrap() = Some(outcome);
            }),
        )?;

        loop {
            if let Some(outcome) = slot.lock().unwrap().take() {
                return match outcome {
                    CommandOutcome::Complete { status, params } if status.is_success() => {
                        Ok(params)
                    }
                    CommandOutcome::Complete { status, .. } => Err(Error::CommandFailed {
                        opcode,
                        status: status.0,
                    }),
                    CommandOutcome::TimedOut => Err(Error::Timeout { opcode, index }),
                };
            }
            self.pump(PUMP_SLICE)?;
        }
    }

    /// Number of commands awaiting completion
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop all pending commands and close the channel
    pub fn close(&mut self) {
        self.pending.clear();
        self.channel.close();
    }

    #[cfg(test)]
    pub(crate) fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
