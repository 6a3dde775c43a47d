//! Objects, interfaces, methods and property slots

use crate::bus::{BusConnection, MethodReply, ObjectPath, Value};
use crate::error::Result;

/// Synchronous method handler, invoked on the worker thread during dispatch
pub type MethodHandler =
    Box<dyn Fn(&mut dyn BusConnection, &[Value]) -> Result<MethodReply> + Send>;

/// Callback producing a property value on demand
pub type PropertyGetter = Box<dyn Fn() -> Value + Send>;

/// A named property, either stored or computed. Read-only from the bus side;
/// writes flow through GATT WriteValue methods only.
pub enum PropertySlot {
    Value(Value),
    Getter(PropertyGetter),
}

impl PropertySlot {
    pub fn current(&self) -> Value {
        match self {
            PropertySlot::Value(value) => value.clone(),
            PropertySlot::Getter(getter) => getter(),
        }
    }
}

pub struct Method {
    pub name: String,
    pub in_sig: String,
    pub out_sig: String,
    pub handler: MethodHandler,
}

/// A named interface on an object
pub struct Interface {
    name: String,
    methods: Vec<Method>,
    properties: Vec<(String, PropertySlot)>,
}

impl Interface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_method(
        mut self,
        name: &str,
        in_sig: &str,
        out_sig: &str,
        handler: MethodHandler,
    ) -> Self {
        self.methods.push(Method {
            name: name.to_string(),
            in_sig: in_sig.to_string(),
            out_sig: out_sig.to_string(),
            handler,
        });
        self
    }

    pub fn add_property(mut self, name: &str, slot: PropertySlot) -> Self {
        self.properties.push((name.to_string(), slot));
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn properties(&self) -> &[(String, PropertySlot)] {
        &self.properties
    }
}

/// An addressable object in the tree
pub struct BusObject {
    path: ObjectPath,
    interfaces: Vec<Interface>,
    published: bool,
}

impl BusObject {
    pub fn new(path: ObjectPath, published: bool) -> Self {
        Self {
            path,
            interfaces: Vec::new(),
            published,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn published(&self) -> bool {
        self.published
    }

    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
    }

    pub fn find_interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }
}
