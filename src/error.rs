//! Error taxonomy (C9). One `thiserror` enum per component, composed into
//! [`Error`] via `#[from]`, grounded in how `dataO1-Mesh`'s `mesh-midi` and
//! `mesh-core` crates compose a per-module error enum into a crate-level one
//! instead of the teacher's single flat `DecodeError`.

use std::fmt;

/// Which handshake step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Syn,
    Inquiry,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStep::Syn => write!(f, "syn"),
            HandshakeStep::Inquiry => write!(f, "inquiry"),
        }
    }
}

/// Which page of a two-page transaction an error pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Page0,
    Page1,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Page0 => write!(f, "0"),
            Page::Page1 => write!(f, "1"),
        }
    }
}

/// Errors produced by the Byte Codec (C1). No I/O, no timing.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected framing: {0}")]
    UnexpectedFraming(String),
    #[error("unknown command bytes: {0:02X?}")]
    UnknownCommand(Vec<u8>),
    #[error("truncated message: expected at least {expected} bytes, got {got}")]
    TruncatedMessage { expected: usize, got: usize },
    #[error("field {field} out of range (value {value})")]
    FieldOutOfRange { field: &'static str, value: i32 },
    #[error("name too long: {len} bytes (max 18)")]
    NameTooLong { len: usize },
    #[error("label too long: {len} bytes (max 23)")]
    LabelTooLong { len: usize },
    #[error("unknown control type code: {0:#04X}")]
    UnknownTypeCode(u8),
}

/// Errors produced by the Mode Model (C2).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invariant violated: {which}")]
    InvariantViolated { which: String },
}

/// Errors produced by the Transport Adapter (C3).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI port not found: {0}")]
    PortNotFound(String),
    #[error("MIDI port closed")]
    PortClosed,
    #[error("failed to send on MIDI port: {0}")]
    SendFailed(String),
}

/// Errors produced by the Handshake Engine (C4).
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake timed out at step {step}")]
    HandshakeTimeout { step: HandshakeStep },
    #[error("handshake response malformed at step {step}: {source}")]
    HandshakeMalformed {
        step: HandshakeStep,
        #[source]
        source: CodecError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors produced by the Slot Selector (C5).
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    #[error("invalid slot {0} (must be 0..=14 for writes, 0..=15 for reads)")]
    InvalidSlot(u8),
    /// Not fatal: the sequencer proceeds after the fixed dwell.
    #[error("slot select echo not observed within timeout")]
    SlotSelectTimeout,
}

/// Errors produced by the Transaction Engine (C6).
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("read timed out on page {page}")]
    ReadTimeout { page: Page },
    #[error("write timed out on page {page}")]
    WriteTimeout { page: Page },
    /// Fatal on page 0; page 1 produces a [`crate::manager::Warning`] instead.
    #[error("ack slot mismatch on page {page}: observed {observed:#04X}, expected {expected:#04X}")]
    AckSlotMismatch { page: Page, observed: u8, expected: u8 },
    #[error("page 1 ack arrived before page 0 ack")]
    UnexpectedAckOrdering,
    #[error(transparent)]
    Protocol(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Top-level crate error. Every public, fallible operation on
/// [`crate::manager::ModeManager`] returns `Result<_, Error>`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("protocol error: {0}")]
    Protocol(#[from] CodecError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, Error>;
