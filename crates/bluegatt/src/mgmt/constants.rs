//! Bluetooth management protocol constants
//!
//! Opcode and event numbers for the kernel's binary management channel.

// Socket addressing
pub const BTPROTO_HCI: i32 = 1;
pub const HCI_DEV_NONE: u16 = 0xFFFF;
pub const HCI_CHANNEL_CONTROL: u16 = 3;

// Wire framing
pub const MGMT_HEADER_LEN: usize = 6;
pub const MGMT_MAX_FRAME_LEN: usize = 1024;

// Commands
pub const MGMT_OP_SET_POWERED: u16 = 0x0005;
pub const MGMT_OP_SET_DISCOVERABLE: u16 = 0x0006;
pub const MGMT_OP_SET_CONNECTABLE: u16 = 0x0007;
pub const MGMT_OP_SET_BONDABLE: u16 = 0x0009;
pub const MGMT_OP_SET_LE: u16 = 0x000D;
pub const MGMT_OP_SET_LOCAL_NAME: u16 = 0x000F;
pub const MGMT_OP_SET_ADVERTISING: u16 = 0x0029;
pub const MGMT_OP_SET_BREDR: u16 = 0x002A;
pub const MGMT_OP_SET_SECURE_CONN: u16 = 0x002D;

// Events
pub const MGMT_EV_CMD_COMPLETE: u16 = 0x0001;
pub const MGMT_EV_CMD_STATUS: u16 = 0x0002;
pub const MGMT_EV_CONTROLLER_ERROR: u16 = 0x0003;
pub const MGMT_EV_INDEX_ADDED: u16 = 0x0004;
pub const MGMT_EV_INDEX_REMOVED: u16 = 0x0005;
pub const MGMT_EV_NEW_SETTINGS: u16 = 0x0006;
pub const MGMT_EV_CLASS_OF_DEV_CHANGED: u16 = 0x0007;
pub const MGMT_EV_LOCAL_NAME_CHANGED: u16 = 0x0008;
pub const MGMT_EV_DEVICE_CONNECTED: u16 = 0x000B;
pub const MGMT_EV_DEVICE_DISCONNECTED: u16 = 0x000C;

// SetLocalName payload layout
pub const MGMT_MAX_NAME_LEN: usize = 249;
pub const MGMT_MAX_SHORT_NAME_LEN: usize = 11;

// Command status codes
pub const MGMT_STATUS_SUCCESS: u8 = 0x00;
pub const MGMT_STATUS_NOT_SUPPORTED: u8 = 0x0C;
pub const MGMT_STATUS_INVALID_PARAMS: u8 = 0x0D;
pub const MGMT_STATUS_NOT_POWERED: u8 = 0x0F;
pub const MGMT_STATUS_INVALID_INDEX: u8 = 0x11;
