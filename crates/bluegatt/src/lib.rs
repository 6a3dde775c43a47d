//! BlueGatt - a user-space BLE peripheral for Linux
//!
//! This library turns a Linux machine into a Bluetooth Low Energy GATT
//! server: it configures the controller directly over the kernel's
//! management channel, publishes a declaratively-built GATT tree through a
//! bus transport, and runs everything on one cooperative worker thread.
//! Application data stays behind a named-value getter/setter pair, so the
//! server never owns or interprets the values it serves.

pub mod bus;
pub mod error;
pub mod gatt;
pub mod mgmt;
pub mod server;
pub mod store;

// Re-export common types for convenience
pub use bus::{BusConnection, BusTransport, MethodCall, MethodReply, ObjectPath, Value};
pub use error::{Error, Result};
pub use gatt::{CharacteristicContext, CharacteristicFlags, GattApplication, GattBuilder, GattProfile, Uuid};
pub use mgmt::{ControlChannel, MgmtAdapter, MgmtCommand, MgmtEvent, MgmtSocket};
pub use server::{Health, RunState, Server, ServerConfig, ShutdownHandle};
pub use store::{DataGetter, DataSetter, DataStore, DataValue};
