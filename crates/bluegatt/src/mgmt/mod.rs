//! Bluetooth management protocol client
//!
//! This module configures the physical controller through the kernel's
//! binary management channel: power, LE mode, discoverability, advertising.

pub mod adapter;
pub mod constants;
pub mod packet;
pub mod socket;

#[cfg(test)]
pub mod testing;
#[cfg(test)]
mod tests;

pub use adapter::{CommandCallback, CommandOutcome, EventListener, MgmtAdapter};
pub use packet::{ControlFrame, DiscoverableMode, MgmtCommand, MgmtEvent, MgmtStatus};
pub use socket::{ControlChannel, MgmtSocket};
