//! The object tree and its dispatch logic
//!
//! One tree per server instance. The tree exclusively owns every object and
//! interface reachable from it; lookup is linear, which is plenty for the
//! handful of objects a GATT application declares.

use std::collections::BTreeMap;

use log::debug;

use crate::bus::{BusConnection, BusObject, Interface, MethodCall, MethodReply, ObjectPath, Value};
use crate::error::{Error, Result};

pub const OBJECT_MANAGER_IFACE: &str = "org.freedesktop.DBus.ObjectManager";
pub const GET_MANAGED_OBJECTS: &str = "GetManagedObjects";

#[derive(Default)]
pub struct ObjectTree {
    objects: Vec<BusObject>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object at `path`. Unpublished objects participate in
    /// dispatch but are excluded from the managed-object snapshot.
    ///
    /// Every object after the first must share a lineage with one already in
    /// the tree: its path is an ancestor or a descendant of an existing path.
    pub fn create_object(&mut self, path: ObjectPath, published: bool) -> Result<&mut BusObject> {
        if self.objects.iter().any(|o| o.path() == &path) {
            return Err(Error::Config(format!("duplicate object path {}", path)));
        }
        let related = self.objects.is_empty()
            || self
                .objects
                .iter()
                .any(|o| o.path().is_ancestor_of(&path) || path.is_ancestor_of(o.path()));
        if !related {
            return Err(Error::Config(format!("disconnected object path {}", path)));
        }
        self.objects.push(BusObject::new(path, published));
        Ok(self.objects.last_mut().unwrap())
    }

    pub fn find_object(&self, path: &ObjectPath) -> Option<&BusObject> {
        self.objects.iter().find(|o| o.path() == path)
    }

    pub fn find_interface(&self, path: &ObjectPath, interface: &str) -> Option<&Interface> {
        self.find_object(path)
            .and_then(|object| object.find_interface(interface))
    }

    /// Dispatch one inbound call. `GetManagedObjects` on the ObjectManager
    /// interface is answered by the tree itself; everything else resolves to
    /// a registered handler. Any lookup miss is `NotFound`.
    pub fn dispatch_method(
        &self,
        connection: &mut dyn BusConnection,
        call: &MethodCall,
    ) -> Result<MethodReply> {
        if call.interface == OBJECT_MANAGER_IFACE && call.method == GET_MANAGED_OBJECTS {
            if self.find_interface(&call.path, OBJECT_MANAGER_IFACE).is_none() {
                return Err(self.not_found(call));
            }
            return Ok(MethodReply::Single(self.managed_objects_snapshot()));
        }

        let method = self
            .find_interface(&call.path, &call.interface)
            .and_then(|interface| interface.find_method(&call.method))
            .ok_or_else(|| self.not_found(call))?;

        debug!("dispatch {} {}.{}", call.path, call.interface, call.method);
        (method.handler)(connection, &call.args)
    }

    fn not_found(&self, call: &MethodCall) -> Error {
        Error::NotFound {
            path: call.path.to_string(),
            interface: call.interface.clone(),
            method: call.method.clone(),
        }
    }

    /// The standard introspection contract: every published object with its
    /// interfaces and their current property values.
    pub fn list_managed_objects(
        &self,
    ) -> BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>> {
        let mut snapshot = BTreeMap::new();
        for object in self.objects.iter().filter(|o| o.published()) {
            let mut interfaces = BTreeMap::new();
            for interface in object.interfaces() {
                let properties: BTreeMap<String, Value> = interface
                    .properties()
                    .iter()
                    .map(|(name, slot)| (name.clone(), slot.current()))
                    .collect();
                interfaces.insert(interface.name().to_string(), properties);
            }
            snapshot.insert(object.path().to_string(), interfaces);
        }
        snapshot
    }

    /// `list_managed_objects` rendered as a wire value
    pub fn managed_objects_snapshot(&self) -> Value {
        let snapshot = self
            .list_managed_objects()
            .into_iter()
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .into_iter()
                    .map(|(name, properties)| (name, Value::Dict(properties)))
                    .collect();
                (path, Value::Dict(interfaces))
            })
            .collect();
        Value::Dict(snapshot)
    }
}
