//! Common types for the GATT layer

use std::fmt;

use bitflags::bitflags;

/// UUID for GATT services, characteristics and descriptors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Uuid {
    /// 16-bit SIG-assigned UUID
    Short(u16),
    /// Full 128-bit UUID, stored big-endian as written
    Full([u8; 16]),
}

/// The Bluetooth base UUID tail appended to short UUIDs
const BASE_UUID_TAIL: &str = "0000-1000-8000-00805f9b34fb";

impl Uuid {
    /// Parse either a bare 16-bit hex UUID ("180A") or a full
    /// 8-4-4-4-12 UUID string.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() == 4 {
            return u16::from_str_radix(text, 16).ok().map(Uuid::Short);
        }
        if text.len() == 36 {
            if text.as_bytes()[8] != b'-'
                || text.as_bytes()[13] != b'-'
                || text.as_bytes()[18] != b'-'
                || text.as_bytes()[23] != b'-'
            {
                return None;
            }
            let hex: String = text.split('-').collect();
            let bytes = hex::decode(hex).ok()?;
            if bytes.len() != 16 {
                return None;
            }
            let mut full = [0u8; 16];
            full.copy_from_slice(&bytes);
            return Some(Uuid::Full(full));
        }
        None
    }

    /// The canonical lowercase 128-bit string used on the bus
    pub fn to_uuid_string(&self) -> String {
        match self {
            Uuid::Short(short) => format!("0000{:04x}-{}", short, BASE_UUID_TAIL),
            Uuid::Full(bytes) => {
                let hex = hex::encode(bytes);
                format!(
                    "{}-{}-{}-{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[12..16],
                    &hex[16..20],
                    &hex[20..32]
                )
            }
        }
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid_string())
    }
}

bitflags! {
    /// Characteristic access flags; they gate which handlers may be bound
    /// and which methods exist on the bus
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicFlags: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
    }
}

impl CharacteristicFlags {
    /// The flag names as published in the `Flags` property
    pub fn to_strings(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.contains(Self::BROADCAST) {
            names.push("broadcast".to_string());
        }
        if self.contains(Self::READ) {
            names.push("read".to_string());
        }
        if self.contains(Self::WRITE_WITHOUT_RESPONSE) {
            names.push("write-without-response".to_string());
        }
        if self.contains(Self::WRITE) {
            names.push("write".to_string());
        }
        if self.contains(Self::NOTIFY) {
            names.push("notify".to_string());
        }
        if self.contains(Self::INDICATE) {
            names.push("indicate".to_string());
        }
        names
    }

    pub fn can_read(&self) -> bool {
        self.intersects(Self::READ)
    }

    pub fn can_write(&self) -> bool {
        self.intersects(Self::WRITE | Self::WRITE_WITHOUT_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.intersects(Self::NOTIFY)
    }
}
