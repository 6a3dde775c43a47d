//! Controller bring-up and power-down scripts
//!
//! Bring-up runs strictly in order against an unpowered controller: radio
//! settings first, power last, advertising only once powered. A failure
//! anywhere aborts the remainder.

use crate::mgmt::packet::{DiscoverableMode, MgmtCommand};
use crate::server::config::ServerConfig;

pub(crate) fn bring_up_script(config: &ServerConfig) -> Vec<MgmtCommand> {
    let discoverable = if config.enable_discoverable {
        DiscoverableMode::General
    } else {
        DiscoverableMode::Off
    };

    vec![
        MgmtCommand::SetPowered { on: false },
        MgmtCommand::SetBredr {
            on: config.enable_bredr,
        },
        MgmtCommand::SetSecureConnections {
            on: config.enable_secure_connections,
        },
        MgmtCommand::SetBondable {
            on: config.enable_bondable,
        },
        MgmtCommand::SetConnectable {
            on: config.enable_connectable,
        },
        MgmtCommand::SetLowEnergy { on: true },
        MgmtCommand::SetDiscoverable {
            mode: discoverable,
            timeout: 0,
        },
        MgmtCommand::SetLocalName {
            name: config.advertising_name.clone(),
            short_name: config.advertising_short_name.clone(),
        },
        MgmtCommand::SetPowered { on: true },
        MgmtCommand::SetAdvertising {
            on: config.enable_advertising,
        },
    ]
}

pub(crate) fn power_down_script() -> Vec<MgmtCommand> {
    vec![
        MgmtCommand::SetAdvertising { on: false },
        MgmtCommand::SetPowered { on: false },
    ]
}
