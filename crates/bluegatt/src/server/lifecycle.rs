//! Server run-state machine and worker loop
//!
//! All of the moving parts live on one worker thread: the management
//! adapter, the bus transport and the instantiated GATT application. The
//! owning thread only observes atomics (`run_state`, `health`) and flips the
//! shutdown flag; nothing it does can race the worker.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::bus::{BusTransport, SignalBuffer};
use crate::error::{Error, Result};
use crate::gatt::GattProfile;
use crate::mgmt::{ControlChannel, MgmtAdapter, MgmtEvent};
use crate::server::bringup::{bring_up_script, power_down_script};
use crate::server::config::ServerConfig;
use crate::store::DataStore;

/// Phases of one server run, in order. Transitions are monotonic; a state
/// never moves backward, and `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RunState {
    Uninitialized = 0,
    Initializing = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Whether the run is (still) considered successful. `Failed` is sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Health {
    Ok = 0,
    Failed = 1,
}

/// State shared between the worker thread and its observers
struct Shared {
    run_state: AtomicU8,
    health: AtomicU8,
    shutdown: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            run_state: AtomicU8::new(RunState::Uninitialized as u8),
            health: AtomicU8::new(Health::Ok as u8),
            shutdown: AtomicBool::new(false),
        }
    }

    fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    /// Advance to `state`; a lagging store can never rewind the machine
    fn enter(&self, state: RunState) {
        let previous = self.run_state.fetch_max(state as u8, Ordering::AcqRel);
        if previous < state as u8 {
            debug!("run state: {} -> {}", RunState::from_u8(previous), state);
        }
    }

    fn health(&self) -> Health {
        if self.health.load(Ordering::Acquire) == Health::Ok as u8 {
            Health::Ok
        } else {
            Health::Failed
        }
    }

    fn mark_failed(&self) {
        self.health.store(Health::Failed as u8, Ordering::Release);
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Clonable handle that can stop the server from anywhere, including a
/// signal handler thread
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.shared.request_shutdown();
    }
}

/// A started GATT server
///
/// `start` validates the configuration, spawns the worker and returns
/// immediately; `wait` joins it. A `Server` runs once and is then spent.
pub struct Server {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("run_state", &self.shared.run_state())
            .field("health", &self.shared.health())
            .finish()
    }
}

impl Server {
    /// Spawn the worker thread that owns `transport` and `channel` for the
    /// whole run.
    pub fn start<T, C>(
        config: ServerConfig,
        store: DataStore,
        profile: GattProfile,
        transport: T,
        channel: C,
    ) -> Result<Self>
    where
        T: BusTransport + 'static,
        C: ControlChannel + Send + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared::new());
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("gatt-server".to_string())
            .spawn(move || {
                worker_loop(config, store, profile, transport, channel, worker_shared)
            })
            .map_err(Error::Io)?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    pub fn run_state(&self) -> RunState {
        self.shared.run_state()
    }

    pub fn health(&self) -> Health {
        self.shared.health()
    }

    /// Ask the worker to stop. Returns immediately; the worker notices at
    /// its next loop turn. Safe to call repeatedly, from any thread.
    pub fn trigger_shutdown(&self) {
        self.shared.request_shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: self.shared.clone(),
        }
    }

    /// Block until the worker has torn down. Returns whether the run stayed
    /// healthy. Safe to call repeatedly; later calls return straight away.
    pub fn wait(&self) -> bool {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("server worker panicked");
                self.shared.mark_failed();
                self.shared.enter(RunState::Stopped);
            }
        }
        self.shared.health() == Health::Ok
    }
}

fn worker_loop<T, C>(
    config: ServerConfig,
    store: DataStore,
    profile: GattProfile,
    mut transport: T,
    channel: C,
    shared: Arc<Shared>,
) where
    T: BusTransport,
    C: ControlChannel,
{
    shared.enter(RunState::Initializing);

    let mut adapter = MgmtAdapter::new(channel);
    adapter.add_event_listener(Box::new(|index, event| match event {
        MgmtEvent::DeviceConnected { address, .. } => {
            info!("controller {}: {} connected", index, format_address(address));
        }
        MgmtEvent::DeviceDisconnected {
            address, reason, ..
        } => {
            info!(
                "controller {}: {} disconnected (reason 0x{:02x})",
                index,
                format_address(address),
                reason
            );
        }
        MgmtEvent::NewSettings { settings } => {
            debug!("controller {}: settings 0x{:08x}", index, settings);
        }
        _ => {}
    }));

    let mut registered = false;
    if let Err(e) = serve(
        &config,
        store,
        profile,
        &mut transport,
        &mut adapter,
        &shared,
        &mut registered,
    ) {
        error!("server failed: {}", e);
        shared.mark_failed();
    }

    shared.enter(RunState::Stopping);

    if registered {
        if let Err(e) = transport.unregister_application() {
            warn!("unregistering application failed: {}", e);
        }
    }
    for command in power_down_script() {
        if let Err(e) = adapter.run_command(&command, config.controller_index, config.init_timeout)
        {
            warn!("power-down step '{}' failed: {}", command.name(), e);
        }
    }
    adapter.close();

    shared.enter(RunState::Stopped);
    info!("server stopped");
}

/// Bring the controller up, publish the application and run the loop until
/// shutdown. Any error aborts the run; teardown happens in the caller.
fn serve<T, C>(
    config: &ServerConfig,
    store: DataStore,
    profile: GattProfile,
    transport: &mut T,
    adapter: &mut MgmtAdapter<C>,
    shared: &Shared,
    registered: &mut bool,
) -> Result<()>
where
    T: BusTransport,
    C: ControlChannel,
{
    for command in bring_up_script(config) {
        if shared.shutdown_requested() {
            return Ok(());
        }
        info!("bring-up: {}", command.name());
        adapter.run_command(&command, config.controller_index, config.init_timeout)?;
    }
    if shared.shutdown_requested() {
        return Ok(());
    }

    let service_name = profile.service_name().to_string();
    let mut app = profile.instantiate(store)?;
    transport.register_application(&service_name, app.snapshot())?;
    *registered = true;

    shared.enter(RunState::Running);
    info!("serving '{}' at {}", service_name, app.root_path());

    let mut counter: u64 = 0;
    while !shared.shutdown_requested() {
        // At most one call per tick keeps dispatch fair against the tick
        // table and the adapter pump.
        if let Some(call) = transport.next_call()? {
            let mut signals = SignalBuffer::new();
            let reply = app.handle_call(&mut signals, &call);
            if let Err(e) = &reply {
                debug!(
                    "{}.{} on {} failed: {}",
                    call.interface, call.method, call.path, e
                );
            }
            // The reply goes out first; notifications the handler raised
            // follow it on the wire.
            transport.send_reply(call.serial, reply)?;
            signals.flush(&mut *transport)?;
        }

        counter += 1;
        app.tick(counter, &mut *transport);

        // Doubles as the loop's sleep; unsolicited controller events and
        // command timeouts are handled on the way through.
        adapter.pump(config.tick_interval)?;
    }
    Ok(())
}

fn format_address(address: &[u8; 6]) -> String {
    // Wire order is little-endian; print most significant octet first
    let mut out = String::with_capacity(17);
    for (i, byte) in address.iter().rev().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}
