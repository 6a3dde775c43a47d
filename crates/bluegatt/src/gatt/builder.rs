//! Declarative construction of the GATT tree
//!
//! A chained builder mirroring the shape of the tree it declares:
//! `begin_service` .. `begin_characteristic` .. `begin_descriptor` each
//! return a nested builder whose `end_*` hands back its parent. `build`
//! yields an immutable `GattProfile`; the profile is `Send` so the worker
//! thread can instantiate it after adapter bring-up.

use std::fmt;
use std::sync::{Arc, RwLock};

use log::{debug, warn};

use crate::bus::{
    Interface, MethodReply, ObjectPath, ObjectTree, PropertySlot, Value, GET_MANAGED_OBJECTS,
    OBJECT_MANAGER_IFACE,
};
use crate::error::{Error, Result};
use crate::gatt::application::{
    default_read, default_write, CharacteristicContext, EventHandler, GattApplication,
    ReadHandler, SharedState, TickEntry, UpdatedHandler, WriteHandler,
    GATT_CHARACTERISTIC_IFACE, GATT_DESCRIPTOR_IFACE, GATT_SERVICE_IFACE,
};
use crate::gatt::types::{CharacteristicFlags, Uuid};
use crate::store::DataStore;

struct DescriptorDecl {
    name: String,
    uuid: Uuid,
    read: Option<ReadHandler>,
}

struct CharacteristicDecl {
    name: String,
    uuid: Uuid,
    flags: CharacteristicFlags,
    read: Option<ReadHandler>,
    write: Option<WriteHandler>,
    updated: Option<UpdatedHandler>,
    event: Option<(u32, EventHandler)>,
    descriptors: Vec<DescriptorDecl>,
}

struct ServiceDecl {
    name: String,
    uuid: Uuid,
    characteristics: Vec<CharacteristicDecl>,
}

/// Root of the declaration chain
pub struct GattBuilder {
    service_name: String,
    services: Vec<ServiceDecl>,
    error: Option<Error>,
}

impl GattBuilder {
    /// `service_name` is the bus-facing name; lowercased as the bus daemon
    /// expects.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_lowercase(),
            services: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(Error::Config(message));
        }
    }

    fn parse_uuid(&mut self, uuid: &str, what: &str, name: &str) -> Uuid {
        match Uuid::parse(uuid) {
            Some(parsed) => parsed,
            None => {
                self.fail(format!("invalid {} UUID '{}' on '{}'", what, uuid, name));
                Uuid::Short(0)
            }
        }
    }

    pub fn begin_service(mut self, name: &str, uuid: &str) -> ServiceBuilder {
        let uuid = self.parse_uuid(uuid, "service", name);
        ServiceBuilder {
            decl: ServiceDecl {
                name: name.to_string(),
                uuid,
                characteristics: Vec::new(),
            },
            parent: self,
        }
    }

    /// Finish the declaration. The first recorded error wins.
    pub fn build(self) -> Result<GattProfile> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.service_name.is_empty()
            || !self
                .service_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(Error::Config(format!(
                "invalid bus service name '{}'",
                self.service_name
            )));
        }
        if self.services.is_empty() {
            return Err(Error::Config("no services declared".to_string()));
        }
        Ok(GattProfile {
            service_name: self.service_name,
            services: self.services,
        })
    }
}

pub struct ServiceBuilder {
    parent: GattBuilder,
    decl: ServiceDecl,
}

impl ServiceBuilder {
    pub fn begin_characteristic(
        mut self,
        name: &str,
        uuid: &str,
        flags: CharacteristicFlags,
    ) -> CharacteristicBuilder {
        let uuid = self.parent.parse_uuid(uuid, "characteristic", name);
        CharacteristicBuilder {
            decl: CharacteristicDecl {
                name: name.to_string(),
                uuid,
                flags,
                read: None,
                write: None,
                updated: None,
                event: None,
                descriptors: Vec::new(),
            },
            parent: self,
        }
    }

    pub fn end_service(mut self) -> GattBuilder {
        self.parent.services.push(self.decl);
        self.parent
    }
}

pub struct CharacteristicBuilder {
    parent: ServiceBuilder,
    decl: CharacteristicDecl,
}

impl CharacteristicBuilder {
    /// Bind the ReadValue handler. Requires the `read` flag.
    pub fn on_read<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut CharacteristicContext) -> Result<crate::store::DataValue> + Send + 'static,
    {
        if !self.decl.flags.can_read() {
            self.parent
                .parent
                .fail(format!("read handler on unreadable '{}'", self.decl.name));
        }
        self.decl.read = Some(Box::new(handler));
        self
    }

    /// Bind the WriteValue handler. Requires a write flag.
    pub fn on_write<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut CharacteristicContext, &[u8]) -> Result<()> + Send + 'static,
    {
        if !self.decl.flags.can_write() {
            self.parent
                .parent
                .fail(format!("write handler on unwritable '{}'", self.decl.name));
        }
        self.decl.write = Some(Box::new(handler));
        self
    }

    /// Bind the post-write update hook. Fires as part of the write
    /// transaction, so it requires a write flag too.
    pub fn on_updated<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut CharacteristicContext) -> Result<bool> + Send + Sync + 'static,
    {
        if !self.decl.flags.can_write() {
            self.parent.parent.fail(format!(
                "update hook on unwritable '{}'",
                self.decl.name
            ));
        }
        self.decl.updated = Some(Arc::new(handler));
        self
    }

    /// Fire `handler` every `every` loop ticks. Requires the `notify` flag.
    pub fn on_event<F>(mut self, every: u32, handler: F) -> Self
    where
        F: FnMut(&mut CharacteristicContext) + Send + 'static,
    {
        if every == 0 {
            self.parent
                .parent
                .fail(format!("zero tick interval on '{}'", self.decl.name));
        }
        if !self.decl.flags.can_notify() {
            self.parent.parent.fail(format!(
                "tick event on non-notifying '{}'",
                self.decl.name
            ));
        }
        self.decl.event = Some((every, Box::new(handler)));
        self
    }

    pub fn begin_descriptor(mut self, name: &str, uuid: &str) -> DescriptorBuilder {
        let uuid = self.parent.parent.parse_uuid(uuid, "descriptor", name);
        DescriptorBuilder {
            decl: DescriptorDecl {
                name: name.to_string(),
                uuid,
                read: None,
            },
            parent: self,
        }
    }

    pub fn end_characteristic(mut self) -> ServiceBuilder {
        self.parent.decl.characteristics.push(self.decl);
        self.parent
    }
}

pub struct DescriptorBuilder {
    parent: CharacteristicBuilder,
    decl: DescriptorDecl,
}

impl DescriptorBuilder {
    pub fn on_read<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut CharacteristicContext) -> Result<crate::store::DataValue> + Send + 'static,
    {
        self.decl.read = Some(Box::new(handler));
        self
    }

    pub fn end_descriptor(mut self) -> CharacteristicBuilder {
        self.parent.decl.descriptors.push(self.decl);
        self.parent
    }
}

/// An immutable, `Send` declaration of the whole tree
pub struct GattProfile {
    service_name: String,
    services: Vec<ServiceDecl>,
}

impl fmt::Debug for GattProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GattProfile")
            .field("service_name", &self.service_name)
            .field("services", &self.services.len())
            .finish()
    }
}

impl GattProfile {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Wire the declarations into a live object tree bound to `store`
    pub fn instantiate(self, store: DataStore) -> Result<GattApplication> {
        let mut tree = ObjectTree::new();
        let mut ticks: Vec<TickEntry> = Vec::new();

        // The bus daemon requires the ObjectManager contract on the root;
        // the tree answers GetManagedObjects itself, the handler is a stub.
        tree.create_object(ObjectPath::root(), false)?
            .add_interface(Interface::new(OBJECT_MANAGER_IFACE).add_method(
                GET_MANAGED_OBJECTS,
                "",
                "a{oa{sa{sv}}}",
                Box::new(|_conn, _args| Ok(MethodReply::None)),
            ));

        let root_path = ObjectPath::root().join("com").join(&self.service_name);
        tree.create_object(root_path.clone(), true)?;

        for service in self.services {
            let service_path = root_path.join(&service.name);
            let characteristic_paths: Vec<Value> = service
                .characteristics
                .iter()
                .map(|c| Value::Path(service_path.join(&c.name)))
                .collect();

            let interface = Interface::new(GATT_SERVICE_IFACE)
                .add_property(
                    "UUID",
                    PropertySlot::Value(Value::Text(service.uuid.to_uuid_string())),
                )
                .add_property("Primary", PropertySlot::Value(Value::Bool(true)))
                .add_property(
                    "Characteristics",
                    PropertySlot::Value(Value::Array(characteristic_paths)),
                );
            tree.create_object(service_path.clone(), true)?
                .add_interface(interface);

            for characteristic in service.characteristics {
                instantiate_characteristic(
                    &mut tree,
                    &mut ticks,
                    &store,
                    &service.name,
                    &service_path,
                    characteristic,
                )?;
            }
        }

        Ok(GattApplication {
            tree,
            store,
            ticks,
            root_path,
        })
    }
}

fn instantiate_characteristic(
    tree: &mut ObjectTree,
    ticks: &mut Vec<TickEntry>,
    store: &DataStore,
    service_name: &str,
    service_path: &ObjectPath,
    decl: CharacteristicDecl,
) -> Result<()> {
    let path = service_path.join(&decl.name);
    // Data-store names are hierarchical: "<service>/<characteristic>"
    let key = format!("{}/{}", service_name, decl.name);
    let state: SharedState = Arc::new(RwLock::new(Default::default()));

    let descriptor_paths: Vec<Value> = decl
        .descriptors
        .iter()
        .map(|d| Value::Path(path.join(&d.name)))
        .collect();

    let notify_state = state.clone();
    let mut interface = Interface::new(GATT_CHARACTERISTIC_IFACE)
        .add_property(
            "UUID",
            PropertySlot::Value(Value::Text(decl.uuid.to_uuid_string())),
        )
        .add_property(
            "Service",
            PropertySlot::Value(Value::Path(service_path.clone())),
        )
        .add_property(
            "Flags",
            PropertySlot::Value(Value::TextArray(decl.flags.to_strings())),
        )
        .add_property(
            "Descriptors",
            PropertySlot::Value(Value::Array(descriptor_paths)),
        )
        .add_property(
            "Notifying",
            PropertySlot::Getter(Box::new(move || {
                Value::Bool(notify_state.read().unwrap().notifying)
            })),
        );

    if decl.flags.can_read() {
        let read = decl.read.unwrap_or_else(|| Box::new(default_read));
        let (store, key, path, state) = (store.clone(), key.clone(), path.clone(), state.clone());
        interface = interface.add_method(
            "ReadValue",
            "a{sv}",
            "ay",
            Box::new(move |conn, _args| {
                let mut ctx = CharacteristicContext::new(&store, &key, &path, &state, conn);
                let value = read(&mut ctx)?;
                Ok(MethodReply::Single(value.to_wire()))
            }),
        );
    }

    if decl.flags.can_write() {
        let write = decl.write.unwrap_or_else(|| Box::new(default_write));
        let updated: UpdatedHandler = decl
            .updated
            .unwrap_or_else(|| Arc::new(|ctx: &mut CharacteristicContext| ctx.send_change_notification()));
        let (store, key, path, state) = (store.clone(), key.clone(), path.clone(), state.clone());
        interface = interface.add_method(
            "WriteValue",
            "aya{sv}",
            "",
            Box::new(move |conn, args| {
                let bytes = args
                    .first()
                    .and_then(Value::as_bytes)
                    .ok_or_else(|| {
                        Error::Protocol("WriteValue expects a byte array".to_string())
                    })?
                    .to_vec();

                let mut ctx = CharacteristicContext::new(&store, &key, &path, &state, conn);
                write(&mut ctx, &bytes)?;

                // The write and its change notification are one logical
                // transaction; a failed notification is logged, not fatal.
                match updated(&mut ctx) {
                    Ok(sent) => debug!("updated {}: notification sent={}", path, sent),
                    Err(e) => warn!("change notification for {} failed: {}", path, e),
                }
                Ok(MethodReply::None)
            }),
        );
    }

    if decl.flags.can_notify() {
        let start_state = state.clone();
        interface = interface.add_method(
            "StartNotify",
            "",
            "",
            Box::new(move |_conn, _args| {
                start_state.write().unwrap().notifying = true;
                Ok(MethodReply::None)
            }),
        );
        let stop_state = state.clone();
        interface = interface.add_method(
            "StopNotify",
            "",
            "",
            Box::new(move |_conn, _args| {
                stop_state.write().unwrap().notifying = false;
                Ok(MethodReply::None)
            }),
        );
    }

    tree.create_object(path.clone(), true)?.add_interface(interface);

    if let Some((every, handler)) = decl.event {
        ticks.push(TickEntry {
            every,
            key: key.clone(),
            path: path.clone(),
            state: state.clone(),
            handler,
        });
    }

    for descriptor in decl.descriptors {
        let descriptor_path = path.join(&descriptor.name);
        let read = descriptor.read.unwrap_or_else(|| Box::new(default_read));
        let (store, desc_key, dpath, state) = (
            store.clone(),
            format!("{}/{}", key, descriptor.name),
            descriptor_path.clone(),
            state.clone(),
        );

        let interface = Interface::new(GATT_DESCRIPTOR_IFACE)
            .add_property(
                "UUID",
                PropertySlot::Value(Value::Text(descriptor.uuid.to_uuid_string())),
            )
            .add_property(
                "Characteristic",
                PropertySlot::Value(Value::Path(path.clone())),
            )
            .add_property(
                "Flags",
                PropertySlot::Value(Value::TextArray(vec!["read".to_string()])),
            )
            .add_method(
                "ReadValue",
                "a{sv}",
                "ay",
                Box::new(move |conn, _args| {
                    let mut ctx =
                        CharacteristicContext::new(&store, &desc_key, &dpath, &state, conn);
                    let value = read(&mut ctx)?;
                    Ok(MethodReply::Single(value.to_wire()))
                }),
            );
        tree.create_object(descriptor_path, true)?
            .add_interface(interface);
    }

    Ok(())
}
