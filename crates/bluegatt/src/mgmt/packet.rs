//! Management frame structures and parsing
//!
//! Every exchange on the control channel is one frame: a fixed 6-byte
//! little-endian header `{opcode, controller index, payload length}` followed
//! by the payload. Commands and events share the framing; the opcode space
//! differs.

use std::fmt;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::mgmt::constants::*;

/// One raw frame on the management channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub opcode: u16,
    pub index: u16,
    pub payload: Vec<u8>,
}

impl ControlFrame {
    pub fn new(opcode: u16, index: u16, payload: Vec<u8>) -> Self {
        Self {
            opcode,
            index,
            payload,
        }
    }

    /// Serialize header + payload for the wire
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MGMT_HEADER_LEN + self.payload.len());
        bytes.write_u16::<LittleEndian>(self.opcode).unwrap();
        bytes.write_u16::<LittleEndian>(self.index).unwrap();
        bytes
            .write_u16::<LittleEndian>(self.payload.len() as u16)
            .unwrap();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse one datagram. Fails closed on short or inconsistent frames.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MGMT_HEADER_LEN {
            return Err(Error::Protocol(format!(
                "frame too short: {} bytes",
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        let opcode = cursor.read_u16::<LittleEndian>().map_err(Error::Io)?;
        let index = cursor.read_u16::<LittleEndian>().map_err(Error::Io)?;
        let length = cursor.read_u16::<LittleEndian>().map_err(Error::Io)? as usize;

        if data.len() != MGMT_HEADER_LEN + length {
            return Err(Error::Protocol(format!(
                "frame length mismatch: header says {}, got {}",
                length,
                data.len() - MGMT_HEADER_LEN
            )));
        }

        Ok(Self {
            opcode,
            index,
            payload: data[MGMT_HEADER_LEN..].to_vec(),
        })
    }
}

/// Status byte carried by command-complete and command-status events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MgmtStatus(pub u8);

impl MgmtStatus {
    pub fn is_success(&self) -> bool {
        self.0 == MGMT_STATUS_SUCCESS
    }
}

impl fmt::Display for MgmtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            MGMT_STATUS_SUCCESS => "success",
            MGMT_STATUS_NOT_SUPPORTED => "not supported",
            MGMT_STATUS_INVALID_PARAMS => "invalid parameters",
            MGMT_STATUS_NOT_POWERED => "not powered",
            MGMT_STATUS_INVALID_INDEX => "invalid index",
            _ => "error",
        };
        write!(f, "{} (0x{:02x})", name, self.0)
    }
}

/// Discoverable policy for `SetDiscoverable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverableMode {
    Off,
    General,
    Limited,
}

impl DiscoverableMode {
    fn to_byte(self) -> u8 {
        match self {
            DiscoverableMode::Off => 0x00,
            DiscoverableMode::General => 0x01,
            DiscoverableMode::Limited => 0x02,
        }
    }
}

/// Management commands used by the bring-up and power-down scripts
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum MgmtCommand {
    SetPowered { on: bool },
    SetBredr { on: bool },
    SetSecureConnections { on: bool },
    SetBondable { on: bool },
    SetConnectable { on: bool },
    SetLowEnergy { on: bool },
    SetDiscoverable { mode: DiscoverableMode, timeout: u16 },
    SetLocalName { name: String, short_name: String },
    SetAdvertising { on: bool },
}

impl MgmtCommand {
    pub fn opcode(&self) -> u16 {
        match self {
            Self::SetPowered { .. } => MGMT_OP_SET_POWERED,
            Self::SetBredr { .. } => MGMT_OP_SET_BREDR,
            Self::SetSecureConnections { .. } => MGMT_OP_SET_SECURE_CONN,
            Self::SetBondable { .. } => MGMT_OP_SET_BONDABLE,
            Self::SetConnectable { .. } => MGMT_OP_SET_CONNECTABLE,
            Self::SetLowEnergy { .. } => MGMT_OP_SET_LE,
            Self::SetDiscoverable { .. } => MGMT_OP_SET_DISCOVERABLE,
            Self::SetLocalName { .. } => MGMT_OP_SET_LOCAL_NAME,
            Self::SetAdvertising { .. } => MGMT_OP_SET_ADVERTISING,
        }
    }

    /// Short human name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetPowered { on: true } => "power on",
            Self::SetPowered { on: false } => "power off",
            Self::SetBredr { .. } => "set BR/EDR",
            Self::SetSecureConnections { .. } => "set secure connections",
            Self::SetBondable { .. } => "set bondable",
            Self::SetConnectable { .. } => "set connectable",
            Self::SetLowEnergy { .. } => "set LE",
            Self::SetDiscoverable { .. } => "set discoverable",
            Self::SetLocalName { .. } => "set local name",
            Self::SetAdvertising { .. } => "set advertising",
        }
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::SetPowered { on }
            | Self::SetBredr { on }
            | Self::SetSecureConnections { on }
            | Self::SetBondable { on }
            | Self::SetConnectable { on }
            | Self::SetLowEnergy { on }
            | Self::SetAdvertising { on } => vec![*on as u8],

            Self::SetDiscoverable { mode, timeout } => {
                let mut params = Vec::with_capacity(3);
                params.push(mode.to_byte());
                params.extend_from_slice(&timeout.to_le_bytes());
                params
            }

            Self::SetLocalName { name, short_name } => {
                // Fixed-width zero-padded name fields, truncated to fit
                let mut params = vec![0u8; MGMT_MAX_NAME_LEN + MGMT_MAX_SHORT_NAME_LEN];
                let name_bytes = name.as_bytes();
                let name_len = name_bytes.len().min(MGMT_MAX_NAME_LEN - 1);
                params[..name_len].copy_from_slice(&name_bytes[..name_len]);

                let short_bytes = short_name.as_bytes();
                let short_len = short_bytes.len().min(MGMT_MAX_SHORT_NAME_LEN - 1);
                params[MGMT_MAX_NAME_LEN..MGMT_MAX_NAME_LEN + short_len]
                    .copy_from_slice(&short_bytes[..short_len]);
                params
            }
        }
    }

    pub fn to_frame(&self, index: u16) -> ControlFrame {
        ControlFrame::new(self.opcode(), index, self.parameters())
    }
}

/// Decoded management events
#[derive(Debug, Clone)]
pub enum MgmtEvent {
    CommandComplete {
        opcode: u16,
        status: MgmtStatus,
        params: Vec<u8>,
    },
    CommandStatus {
        opcode: u16,
        status: MgmtStatus,
    },
    ControllerError {
        code: u8,
    },
    IndexAdded,
    IndexRemoved,
    NewSettings {
        settings: u32,
    },
    ClassOfDeviceChanged {
        class_of_device: [u8; 3],
    },
    LocalNameChanged,
    DeviceConnected {
        address: [u8; 6],
        address_type: u8,
    },
    DeviceDisconnected {
        address: [u8; 6],
        address_type: u8,
        reason: u8,
    },
    Unknown {
        event: u16,
        payload: Vec<u8>,
    },
}

impl MgmtEvent {
    /// Decode one event frame. Malformed payloads fail closed with
    /// `Error::Protocol` and are dropped by the caller.
    pub fn parse(frame: &ControlFrame) -> Result<Self> {
        let payload = &frame.payload;
        let short = || {
            Error::Protocol(format!(
                "event 0x{:04x} payload too short: {} bytes",
                frame.opcode,
                payload.len()
            ))
        };

        match frame.opcode {
            MGMT_EV_CMD_COMPLETE => {
                if payload.len() < 3 {
                    return Err(short());
                }
                Ok(Self::CommandComplete {
                    opcode: u16::from_le_bytes([payload[0], payload[1]]),
                    status: MgmtStatus(payload[2]),
                    params: payload[3..].to_vec(),
                })
            }
            MGMT_EV_CMD_STATUS => {
                if payload.len() < 3 {
                    return Err(short());
                }
                Ok(Self::CommandStatus {
                    opcode: u16::from_le_bytes([payload[0], payload[1]]),
                    status: MgmtStatus(payload[2]),
                })
            }
            MGMT_EV_CONTROLLER_ERROR => {
                if payload.is_empty() {
                    return Err(short());
                }
                Ok(Self::ControllerError { code: payload[0] })
            }
            MGMT_EV_INDEX_ADDED => Ok(Self::IndexAdded),
            MGMT_EV_INDEX_REMOVED => Ok(Self::IndexRemoved),
            MGMT_EV_NEW_SETTINGS => {
                if payload.len() < 4 {
                    return Err(short());
                }
                Ok(Self::NewSettings {
                    settings: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                })
            }
            MGMT_EV_CLASS_OF_DEV_CHANGED => {
                if payload.len() < 3 {
                    return Err(short());
                }
                Ok(Self::ClassOfDeviceChanged {
                    class_of_device: [payload[0], payload[1], payload[2]],
                })
            }
            MGMT_EV_LOCAL_NAME_CHANGED => Ok(Self::LocalNameChanged),
            MGMT_EV_DEVICE_CONNECTED => {
                if payload.len() < 7 {
                    return Err(short());
                }
                let mut address = [0u8; 6];
                address.copy_from_slice(&payload[..6]);
                Ok(Self::DeviceConnected {
                    address,
                    address_type: payload[6],
                })
            }
            MGMT_EV_DEVICE_DISCONNECTED => {
                if payload.len() < 8 {
                    return Err(short());
                }
                let mut address = [0u8; 6];
                address.copy_from_slice(&payload[..6]);
                Ok(Self::DeviceDisconnected {
                    address,
                    address_type: payload[6],
                    reason: payload[7],
                })
            }
            event => Ok(Self::Unknown {
                event,
                payload: payload.clone(),
            }),
        }
    }
}
