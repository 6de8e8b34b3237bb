//! Device Identity (§3), produced by the Handshake Engine (C4) and
//! consumed by the Mode Manager (C7). Grounded in
//! `other_examples/7b2084c6_tylerferrin-librarian__tauri-src-midi-identity.rs.rs`'s
//! `DeviceIdentity` struct, adapted to this device's 17-byte reply layout.

/// Published once after a successful handshake and read-only thereafter
/// (§9: "No shared mutable identity"); a reconnect replaces it atomically
/// rather than mutating it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    manufacturer: [u8; 3],
    product: [u8; 2],
    family: [u8; 2],
    version: [u8; 4],
}

impl DeviceIdentity {
    pub fn new(manufacturer: [u8; 3], product: [u8; 2], family: [u8; 2], version: [u8; 4]) -> Self {
        DeviceIdentity {
            manufacturer,
            product,
            family,
            version,
        }
    }

    pub fn manufacturer(&self) -> [u8; 3] {
        self.manufacturer
    }

    pub fn product(&self) -> [u8; 2] {
        self.product
    }

    pub fn family(&self) -> [u8; 2] {
        self.family
    }

    pub fn version(&self) -> [u8; 4] {
        self.version
    }
}
