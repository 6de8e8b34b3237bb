//! Byte Codec (C1): pure functions that build and parse every SysEx message
//! variant this device speaks. No I/O, no timing, no threads — matches the
//! scope of the teacher's `automap/protocol` module tree, generalized from
//! the ZeRO MkII's Automap/DbSim message families to the Launch Control
//! XL 3's handshake and custom-mode families.
//!
//! Submodules mirror the teacher's one-file-per-message-family layout:
//! `framing` holds the shared prefix/length-marker/slot-encoding rules,
//! `handshake` the four connection messages, `slot` the control-pair
//! messages, and `custom_mode` the read/write transaction payloads.

pub mod custom_mode;
pub mod framing;
pub mod handshake;
pub mod slot;

pub use framing::{decode_slot, encode_slot, EOX, NOVATION_PREFIX};
