//! The instantiated GATT application
//!
//! `GattApplication` is the runtime half of the GATT layer: the populated
//! object tree plus the tick table. It is built from a `GattProfile` on the
//! worker thread once the adapter is up, and everything in it is owned by
//! that thread for the rest of the run.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::bus::{BusConnection, MethodCall, MethodReply, ObjectPath, ObjectTree, Value};
use crate::error::{Error, Result};
use crate::store::{DataStore, DataValue};

pub const GATT_SERVICE_IFACE: &str = "org.bluez.GattService1";
pub const GATT_CHARACTERISTIC_IFACE: &str = "org.bluez.GattCharacteristic1";
pub const GATT_DESCRIPTOR_IFACE: &str = "org.bluez.GattDescriptor1";

/// Mutable per-characteristic runtime state, shared between the method
/// handlers and the tick table of one characteristic
#[derive(Debug, Default)]
pub struct CharacteristicState {
    pub notifying: bool,
}

pub type SharedState = Arc<RwLock<CharacteristicState>>;

/// What a bound handler sees while it runs: the data store, the
/// characteristic it belongs to, and the live connection for signals
pub struct CharacteristicContext<'a> {
    store: &'a DataStore,
    key: &'a str,
    path: &'a ObjectPath,
    state: &'a SharedState,
    connection: &'a mut dyn BusConnection,
}

impl<'a> CharacteristicContext<'a> {
    pub(crate) fn new(
        store: &'a DataStore,
        key: &'a str,
        path: &'a ObjectPath,
        state: &'a SharedState,
        connection: &'a mut dyn BusConnection,
    ) -> Self {
        Self {
            store,
            key,
            path,
            state,
            connection,
        }
    }

    /// The characteristic's data-store key (its declared name)
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn path(&self) -> &ObjectPath {
        self.path
    }

    /// Fetch this characteristic's value from the data store
    pub fn get_value(&self) -> Option<DataValue> {
        self.store.get(self.key)
    }

    /// Fetch an arbitrary named value
    pub fn get_named(&self, name: &str) -> Option<DataValue> {
        self.store.get(name)
    }

    /// Store this characteristic's value
    pub fn set_value(&self, value: DataValue) -> bool {
        self.store.set(self.key, value)
    }

    pub fn set_named(&self, name: &str, value: DataValue) -> bool {
        self.store.set(name, value)
    }

    pub fn notifying(&self) -> bool {
        self.state.read().unwrap().notifying
    }

    /// Emit a PropertiesChanged signal carrying the store's current value.
    /// Returns `false` without emitting when nobody has subscribed or the
    /// store has no value.
    pub fn send_change_notification(&mut self) -> Result<bool> {
        let value = match self.get_value() {
            Some(value) => value,
            None => return Ok(false),
        };
        self.send_change_notification_value(&value)
    }

    /// Same, for an already-materialized value
    pub fn send_change_notification_value(&mut self, value: &DataValue) -> Result<bool> {
        if !self.notifying() {
            return Ok(false);
        }
        let mut changed = BTreeMap::new();
        changed.insert("Value".to_string(), value.to_wire());
        self.connection
            .emit_properties_changed(self.path, GATT_CHARACTERISTIC_IFACE, changed)?;
        Ok(true)
    }
}

/// Produces the characteristic's current value for a ReadValue reply
pub type ReadHandler = Box<dyn Fn(&mut CharacteristicContext) -> Result<DataValue> + Send>;

/// Applies an incoming WriteValue byte sequence
pub type WriteHandler = Box<dyn Fn(&mut CharacteristicContext, &[u8]) -> Result<()> + Send>;

/// Fires after a successful write; returns whether a change notification
/// actually went out
pub type UpdatedHandler = Arc<dyn Fn(&mut CharacteristicContext) -> Result<bool> + Send + Sync>;

/// Periodic per-characteristic tick callback
pub type EventHandler = Box<dyn FnMut(&mut CharacteristicContext) + Send>;

pub(crate) struct TickEntry {
    pub every: u32,
    pub key: String,
    pub path: ObjectPath,
    pub state: SharedState,
    pub handler: EventHandler,
}

/// The populated object tree plus the tick table
pub struct GattApplication {
    pub(crate) tree: ObjectTree,
    pub(crate) store: DataStore,
    pub(crate) ticks: Vec<TickEntry>,
    pub(crate) root_path: ObjectPath,
}

impl GattApplication {
    pub fn tree(&self) -> &ObjectTree {
        &self.tree
    }

    /// The application root ("/com/<service name>")
    pub fn root_path(&self) -> &ObjectPath {
        &self.root_path
    }

    /// The managed-object snapshot handed to the peer at registration
    pub fn snapshot(&self) -> Value {
        self.tree.managed_objects_snapshot()
    }

    /// Dispatch one inbound bus call synchronously
    pub fn handle_call(
        &self,
        connection: &mut dyn BusConnection,
        call: &MethodCall,
    ) -> Result<MethodReply> {
        self.tree.dispatch_method(connection, call)
    }

    /// Fire every tick callback whose interval divides `counter`
    pub fn tick(&mut self, counter: u64, connection: &mut dyn BusConnection) {
        for entry in &mut self.ticks {
            if counter % entry.every as u64 == 0 {
                let mut ctx = CharacteristicContext::new(
                    &self.store,
                    &entry.key,
                    &entry.path,
                    &entry.state,
                    connection,
                );
                (entry.handler)(&mut ctx);
            }
        }
    }
}

/// Default ReadValue behavior: fetch by the characteristic's own name,
/// a missing value is an error reply rather than an empty success
pub(crate) fn default_read(ctx: &mut CharacteristicContext) -> Result<DataValue> {
    ctx.get_value()
        .ok_or_else(|| Error::DataStoreMiss(ctx.key().to_string()))
}

/// Default WriteValue behavior: store the raw bytes under the
/// characteristic's own name
pub(crate) fn default_write(ctx: &mut CharacteristicContext, bytes: &[u8]) -> Result<()> {
    if ctx.set_value(DataValue::Bytes(bytes.to_vec())) {
        Ok(())
    } else {
        Err(Error::DataStoreMiss(ctx.key().to_string()))
    }
}
