//! Standalone peripheral demo
//!
//! Publishes a battery service whose level decays once a minute, plus a
//! writable caregiver pairing token, then serves until SIGINT or SIGTERM.
//! Needs permission to open the kernel management channel, so run it as
//! root. `RUST_LOG=debug` shows the bring-up script and every dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::info;

use bluegatt::{
    BusConnection, BusTransport, CharacteristicFlags, DataGetter, DataSetter, DataStore,
    DataValue, Error, GattBuilder, GattProfile, MethodCall, MethodReply, MgmtSocket, ObjectPath,
    Result, RunState, Server, ServerConfig, Value,
};

static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signum: libc::c_int) {
    SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
}

/// Stand-in transport that logs what a bus daemon would see. Swap in a real
/// connection to serve actual centrals.
struct ConsoleTransport;

impl BusConnection for ConsoleTransport {
    fn emit_properties_changed(
        &mut self,
        path: &ObjectPath,
        interface: &str,
        changed: BTreeMap<String, Value>,
    ) -> Result<()> {
        info!("signal: {} {} changed {:?}", path, interface, changed);
        Ok(())
    }
}

impl BusTransport for ConsoleTransport {
    fn register_application(&mut self, service_name: &str, _snapshot: Value) -> Result<()> {
        info!("registered application '{}'", service_name);
        Ok(())
    }

    fn unregister_application(&mut self) -> Result<()> {
        info!("unregistered application");
        Ok(())
    }

    fn next_call(&mut self) -> Result<Option<MethodCall>> {
        Ok(None)
    }

    fn send_reply(
        &mut self,
        serial: u64,
        reply: std::result::Result<MethodReply, Error>,
    ) -> Result<()> {
        info!("reply #{}: {:?}", serial, reply);
        Ok(())
    }
}

fn memory_store(initial: Vec<(&str, DataValue)>) -> DataStore {
    let map: Arc<Mutex<HashMap<String, DataValue>>> = Arc::new(Mutex::new(
        initial
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    ));

    let read = map.clone();
    let getter: DataGetter = Arc::new(move |name| read.lock().unwrap().get(name).cloned());
    let setter: DataSetter = Arc::new(move |name, value| {
        info!("store: {} = {}", name, value);
        map.lock().unwrap().insert(name.to_string(), value);
        true
    });
    DataStore::new(getter, setter)
}

fn demo_profile() -> Result<GattProfile> {
    GattBuilder::new("dosell")
        .begin_service("battery", "180F")
        .begin_characteristic(
            "level",
            "2A19",
            CharacteristicFlags::READ | CharacteristicFlags::NOTIFY,
        )
        .on_event(60, |ctx| {
            if let Some(DataValue::Uint8(level)) = ctx.get_value() {
                ctx.set_value(DataValue::Uint8(level.saturating_sub(1)));
            }
            let _ = ctx.send_change_notification();
        })
        .end_characteristic()
        .end_service()
        .begin_service("caregiver", "00000001-6907-4437-8539-9218a9d54e29")
        .begin_characteristic(
            "token",
            "00000002-6907-4437-8539-9218a9d54e29",
            CharacteristicFlags::READ | CharacteristicFlags::WRITE | CharacteristicFlags::NOTIFY,
        )
        .begin_descriptor("description", "2901")
        .on_read(|_ctx| Ok(DataValue::Text("caregiver pairing token".into())))
        .end_descriptor()
        .end_characteristic()
        .end_service()
        .build()
}

fn run() -> Result<bool> {
    unsafe {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }

    let store = memory_store(vec![
        ("battery/level", DataValue::Uint8(78)),
        ("caregiver/token", DataValue::Bytes(Vec::new())),
    ]);

    let channel = MgmtSocket::open()?;
    let config = ServerConfig::new("Dosell Hub", "Dosell");
    let server = Server::start(config, store, demo_profile()?, ConsoleTransport, channel)?;
    let shutdown = server.shutdown_handle();

    while server.run_state() != RunState::Stopped {
        if SHUTDOWN_SIGNAL.swap(false, Ordering::SeqCst) {
            info!("signal received, stopping");
            shutdown.trigger();
        }
        thread::sleep(Duration::from_millis(100));
    }
    Ok(server.wait())
}

fn main() {
    env_logger::init();

    let code = match run() {
        Ok(true) => 0,
        Ok(false) => {
            eprintln!("server run failed; see log for details");
            1
        }
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };
    std::process::exit(code);
}
