//! The named-value data store boundary
//!
//! The application owning the server supplies a getter and a setter for named
//! values ("battery/level", "caregiver/token", ...). The GATT layer bridges
//! those values to and from bus wire types but never interprets their
//! contents.

use std::fmt;
use std::sync::Arc;

use crate::bus::Value;

/// A typed value exchanged between the data store and the GATT layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Bytes(Vec<u8>),
    Text(String),
}

impl DataValue {
    /// Little-endian byte rendering, as carried in ReadValue replies and
    /// change notifications
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            DataValue::Uint8(v) => vec![*v],
            DataValue::Uint16(v) => v.to_le_bytes().to_vec(),
            DataValue::Uint32(v) => v.to_le_bytes().to_vec(),
            DataValue::Uint64(v) => v.to_le_bytes().to_vec(),
            DataValue::Bytes(v) => v.clone(),
            DataValue::Text(v) => v.as_bytes().to_vec(),
        }
    }

    /// Marshal into the bus wire representation
    pub fn to_wire(&self) -> Value {
        Value::Bytes(self.to_bytes())
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Uint8(v) => write!(f, "{}", v),
            DataValue::Uint16(v) => write!(f, "{}", v),
            DataValue::Uint32(v) => write!(f, "{}", v),
            DataValue::Uint64(v) => write!(f, "{}", v),
            DataValue::Bytes(v) => write!(f, "{}", hex::encode(v)),
            DataValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Retrieves a named value, or `None` when the name is unknown
pub type DataGetter = Arc<dyn Fn(&str) -> Option<DataValue> + Send + Sync>;

/// Stores a named value, returning `false` when the name is unknown or the
/// value was rejected
pub type DataSetter = Arc<dyn Fn(&str, DataValue) -> bool + Send + Sync>;

/// The getter/setter pair handed to the server at start
#[derive(Clone)]
pub struct DataStore {
    getter: DataGetter,
    setter: DataSetter,
}

impl DataStore {
    pub fn new(getter: DataGetter, setter: DataSetter) -> Self {
        Self { getter, setter }
    }

    pub fn get(&self, name: &str) -> Option<DataValue> {
        (self.getter)(name)
    }

    pub fn set(&self, name: &str, value: DataValue) -> bool {
        (self.setter)(name, value)
    }
}

/// In-memory store used by the test suites
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub fn memory_store(initial: Vec<(&str, DataValue)>) -> DataStore {
        let map: Arc<Mutex<HashMap<String, DataValue>>> = Arc::new(Mutex::new(
            initial
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ));

        let read = map.clone();
        let getter: DataGetter = Arc::new(move |name| read.lock().unwrap().get(name).cloned());
        let setter: DataSetter = Arc::new(move |name, value| {
            map.lock().unwrap().insert(name.to_string(), value);
            true
        });

        DataStore::new(getter, setter)
    }
}
