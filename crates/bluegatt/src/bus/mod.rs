//! Generic bus object/interface/method dispatch layer
//!
//! A path-addressed tree of objects, each exposing named interfaces with
//! methods and read-only properties, plus the managed-object introspection
//! snapshot the bus daemon consumes at registration time. The transport to
//! the daemon itself is behind the `BusTransport` trait.

pub mod connection;
pub mod object;
pub mod path;
pub mod tree;
pub mod value;

#[cfg(test)]
pub mod testing;

pub use connection::{BusConnection, BusTransport, MethodCall, MethodReply, SignalBuffer};
pub use object::{BusObject, Interface, Method, MethodHandler, PropertyGetter, PropertySlot};
pub use path::ObjectPath;
pub use tree::{ObjectTree, GET_MANAGED_OBJECTS, OBJECT_MANAGER_IFACE};
pub use value::Value;
