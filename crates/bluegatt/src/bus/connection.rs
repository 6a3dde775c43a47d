//! The transport boundary
//!
//! The bus daemon itself is a separate process; this crate only speaks to it
//! through these traits. `BusConnection` is the slice handlers see while a
//! dispatch is in flight (signal emission); `BusTransport` adds the
//! registration and call-queue surface the server loop drives.

use std::collections::BTreeMap;

use crate::bus::{ObjectPath, Value};
use crate::error::{Error, Result};

/// One inbound method call, as surfaced by the transport
#[derive(Debug, Clone)]
pub struct MethodCall {
    /// Transport-assigned correlation id for the reply
    pub serial: u64,
    pub path: ObjectPath,
    pub interface: String,
    pub method: String,
    pub args: Vec<Value>,
}

/// Outcome of a successfully dispatched method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodReply {
    /// Method has no return value
    None,
    /// Single return value
    Single(Value),
}

/// The connection surface available to method handlers
pub trait BusConnection {
    /// Emit a `PropertiesChanged` signal for one interface of one object
    fn emit_properties_changed(
        &mut self,
        path: &ObjectPath,
        interface: &str,
        changed: BTreeMap<String, Value>,
    ) -> Result<()>;
}

/// Buffers `PropertiesChanged` emissions raised while a dispatch is in
/// flight, so the method reply reaches the peer before its notifications
#[derive(Default)]
pub struct SignalBuffer {
    pending: Vec<(ObjectPath, String, BTreeMap<String, Value>)>,
}

impl SignalBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forward everything buffered, in emission order
    pub fn flush(&mut self, connection: &mut dyn BusConnection) -> Result<()> {
        for (path, interface, changed) in self.pending.drain(..) {
            connection.emit_properties_changed(&path, &interface, changed)?;
        }
        Ok(())
    }
}

impl BusConnection for SignalBuffer {
    fn emit_properties_changed(
        &mut self,
        path: &ObjectPath,
        interface: &str,
        changed: BTreeMap<String, Value>,
    ) -> Result<()> {
        self.pending
            .push((path.clone(), interface.to_string(), changed));
        Ok(())
    }
}

/// The full transport surface driven by the server loop
pub trait BusTransport: BusConnection + Send {
    /// Hand the managed-object snapshot to the peer so it can advertise and
    /// service the GATT tree
    fn register_application(&mut self, service_name: &str, snapshot: Value) -> Result<()>;

    /// Withdraw a previously registered application
    fn unregister_application(&mut self) -> Result<()>;

    /// Take the next queued inbound call, if any. Never blocks.
    fn next_call(&mut self) -> Result<Option<MethodCall>>;

    /// Deliver the outcome of a dispatched call back to the peer
    fn send_reply(&mut self, serial: u64, reply: std::result::Result<MethodReply, Error>)
        -> Result<()>;
}
