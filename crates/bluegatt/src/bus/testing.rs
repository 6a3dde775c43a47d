//! Mock transport shared by the bus, gatt and server test suites

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::bus::{BusConnection, BusTransport, MethodCall, MethodReply, ObjectPath, Value};
use crate::error::{Error, Result};

/// One recorded PropertiesChanged emission
#[derive(Debug, Clone)]
pub struct EmittedSignal {
    pub path: ObjectPath,
    pub interface: String,
    pub changed: BTreeMap<String, Value>,
}

/// One outbound item as it hit the wire, for ordering assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireRecord {
    Signal,
    Reply(u64),
}

/// Everything the mock transport observed, shared with the test body
#[derive(Default)]
pub struct TransportLog {
    pub registered: Option<(String, Value)>,
    pub unregistered: bool,
    pub signals: Vec<EmittedSignal>,
    pub replies: Vec<(u64, std::result::Result<MethodReply, Error>)>,
    pub wire_order: Vec<WireRecord>,
}

#[derive(Default)]
pub struct MockTransport {
    pub log: Arc<Mutex<TransportLog>>,
    pub queued_calls: VecDeque<MethodCall>,
    /// When set, register_application fails with this config error text
    pub fail_registration: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_call(&mut self, call: MethodCall) {
        self.queued_calls.push_back(call);
    }
}

impl BusConnection for MockTransport {
    fn emit_properties_changed(
        &mut self,
        path: &ObjectPath,
        interface: &str,
        changed: BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.signals.push(EmittedSignal {
            path: path.clone(),
            interface: interface.to_string(),
            changed,
        });
        log.wire_order.push(WireRecord::Signal);
        Ok(())
    }
}

impl BusTransport for MockTransport {
    fn register_application(&mut self, service_name: &str, snapshot: Value) -> Result<()> {
        if let Some(reason) = &self.fail_registration {
            return Err(Error::Config(reason.clone()));
        }
        self.log.lock().unwrap().registered = Some((service_name.to_string(), snapshot));
        Ok(())
    }

    fn unregister_application(&mut self) -> Result<()> {
        self.log.lock().unwrap().unregistered = true;
        Ok(())
    }

    fn next_call(&mut self) -> Result<Option<MethodCall>> {
        Ok(self.queued_calls.pop_front())
    }

    fn send_reply(
        &mut self,
        serial: u64,
        reply: std::result::Result<MethodReply, Error>,
    ) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.replies.push((serial, reply));
        log.wire_order.push(WireRecord::Reply(serial));
        Ok(())
    }
}
