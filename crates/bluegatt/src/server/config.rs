//! Server configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::mgmt::constants::{MGMT_MAX_NAME_LEN, MGMT_MAX_SHORT_NAME_LEN};

/// Everything the server needs to know before it starts: which controller to
/// drive, how to advertise, and which radio settings the bring-up script
/// applies.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Index of the controller to configure (hci0 is 0)
    pub controller_index: u16,
    /// Name carried in advertising and scan responses
    pub advertising_name: String,
    /// Abbreviated name for packets too small for the full one
    pub advertising_short_name: String,
    /// Leave classic BR/EDR enabled alongside LE
    pub enable_bredr: bool,
    /// Require LE Secure Connections pairing
    pub enable_secure_connections: bool,
    /// Accept bonding requests
    pub enable_bondable: bool,
    /// Accept incoming connections
    pub enable_connectable: bool,
    /// Answer discovery scans
    pub enable_discoverable: bool,
    /// Start advertising once powered
    pub enable_advertising: bool,
    /// Per-command deadline during bring-up and power-down
    pub init_timeout: Duration,
    /// Cadence of the worker loop; periodic characteristic events count
    /// these ticks
    pub tick_interval: Duration,
}

impl ServerConfig {
    pub fn new(advertising_name: &str, advertising_short_name: &str) -> Self {
        Self {
            advertising_name: advertising_name.to_string(),
            advertising_short_name: advertising_short_name.to_string(),
            ..Self::default()
        }
    }

    /// Reject configurations the controller would refuse
    pub fn validate(&self) -> Result<()> {
        if self.advertising_name.len() >= MGMT_MAX_NAME_LEN {
            return Err(Error::Config(format!(
                "advertising name too long: {} bytes",
                self.advertising_name.len()
            )));
        }
        if self.advertising_short_name.len() >= MGMT_MAX_SHORT_NAME_LEN {
            return Err(Error::Config(format!(
                "advertising short name too long: {} bytes",
                self.advertising_short_name.len()
            )));
        }
        if self.init_timeout.is_zero() {
            return Err(Error::Config("init timeout must be non-zero".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            controller_index: 0,
            advertising_name: String::new(),
            advertising_short_name: String::new(),
            enable_bredr: false,
            enable_secure_connections: true,
            enable_bondable: false,
            enable_connectable: true,
            enable_discoverable: true,
            enable_advertising: true,
            init_timeout: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}
