//! GATT server model
//!
//! Split between declaration and runtime: `builder` produces an immutable
//! `GattProfile` from a chained description of services, characteristics and
//! descriptors; `application` is the instantiated object tree the server loop
//! drives once the adapter is up.

pub mod application;
pub mod builder;
pub mod types;


pub use application::{
    CharacteristicContext, CharacteristicState, GattApplication, GATT_CHARACTERISTIC_IFACE,
    GATT_DESCRIPTOR_IFACE, GATT_SERVICE_IFACE,
};
pub use builder::{
    CharacteristicBuilder, DescriptorBuilder, GattBuilder, GattProfile, ServiceBuilder,
};
pub use types::{CharacteristicFlags, Uuid};
