//! # lcxl3-core
//!
//! Host-side driver core for the Novation Launch Control XL 3's
//! proprietary custom-mode SysEx protocol (see `SPEC_FULL.md`): a
//! connection/handshake state machine across two named MIDI port pairs, a
//! SysEx framing/parsing/building layer for the full custom-mode
//! read/write protocol, a multi-page transaction engine with
//! acknowledgement correlation, and a durable in-memory custom-mode model.
//!
//! External collaborators — a fluent mode-builder API, LED real-time
//! control, canonical-map YAML parsing, Ardour XML export, and any GUI or
//! CLI presentation layer — are out of scope for this crate; it exposes
//! only the pieces named above.
//!
//! ## Example
//!
//! ```no_run
//! use lcxl3_core::{DriverConfig, DriverPorts, ModeManager, PortNames};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ports = DriverPorts {
//!     data: PortNames { input: "LCXL3 1 MIDI In/Out".into(), output: "LCXL3 1 MIDI In/Out".into() },
//!     control: PortNames { input: "LCXL3 1 DAW In/Out".into(), output: "LCXL3 1 DAW In/Out".into() },
//! };
//! let mut manager = ModeManager::connect("lcxl3-core", ports, DriverConfig::default()).await?;
//! let outcome = manager.read_mode(4).await?;
//! println!("slot 4: {}", outcome.mode().name());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod manager;
pub mod model;
pub mod transport;

pub(crate) mod engine;
mod handshake;
mod slot_selector;

pub use config::DriverConfig;
pub use error::{Error, Result};
pub use handshake::ConnectionState;
pub use identity::DeviceIdentity;
pub use manager::{ModeManager, ReadOutcome, Warning, WriteOutcome};
pub use model::{Behaviour, ControlBinding, ControlId, ControlType, CustomMode};
pub use transport::{DriverPorts, PortNames};
