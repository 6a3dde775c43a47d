//! Server lifecycle: configuration, controller bring-up and the worker loop

pub mod config;
pub mod lifecycle;

mod bringup;


pub use config::ServerConfig;
pub use lifecycle::{Health, RunState, Server, ShutdownHandle};
