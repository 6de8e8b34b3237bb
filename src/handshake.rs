//! Handshake Engine (C4, §4.4): the four-message connection sequence and
//! the `Disconnected -> Handshaking -> Ready` state machine, with
//! `reconnect()`'s exponential backoff. Each await is a
//! `tokio::time::timeout` around a sequencer wait, generalizing
//! `tylerferrin-librarian`'s `request_device_identity` (which polls a
//! shared `Vec` under a `Mutex` with a sleep loop) to this crate's
//! single-sequencer, correlation-by-oneshot model.
//!
//! `sequencer`/`config` are passed into each call rather than stored on
//! the engine: [`crate::manager::ModeManager`] owns both alongside this
//! engine, and a borrowing field here would make `ModeManager`
//! self-referential.

use log::info;
use tokio::time::timeout;

use crate::codec::handshake as codec;
use crate::config::DriverConfig;
use crate::engine::{CorrelationKey, SequencerHandle, SequencerOutcome};
use crate::error::{HandshakeError, HandshakeStep};
use crate::identity::DeviceIdentity;
use crate::transport::Pair;

/// Connection state (§4.4). `Ready` carries nothing extra: the published
/// [`DeviceIdentity`] lives on the [`HandshakeEngine`], not the state
/// itself, since it is read-only and replaced atomically on reconnect
/// rather than being part of a state transition payload (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Ready,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

#[derive(Default)]
pub(crate) struct HandshakeEngine {
    state: ConnectionState,
    identity: Option<DeviceIdentity>,
}

impl HandshakeEngine {
    pub(crate) fn new() -> Self {
        HandshakeEngine::default()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }

    /// Forces the engine back to `Disconnected` (§4.4: "on any transport
    /// disconnect, the engine returns to Disconnected"). Called by
    /// [`crate::manager::ModeManager`] whenever a read/write operation
    /// surfaces a transport error after the handshake already completed,
    /// since neither [`Self::handshake`] nor [`Self::reconnect`] run again
    /// on their own to notice the drop.
    pub(crate) fn mark_disconnected(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("transport disconnected, returning to Disconnected");
        }
        self.state = ConnectionState::Disconnected;
        self.identity = None;
    }

    /// Runs the four-step sequence once. On success, transitions to
    /// `Ready` and publishes the identity; on failure, leaves the engine
    /// `Disconnected`.
    pub(crate) async fn handshake(
        &mut self,
        sequencer: &SequencerHandle,
        config: &DriverConfig,
    ) -> Result<DeviceIdentity, HandshakeError> {
        self.state = ConnectionState::Handshaking;

        let syn = codec::build_syn().to_vec();
        let syn_ack_outcome = timeout(
            config.t_syn,
            sequencer.send_and_await(Pair::Data, syn, CorrelationKey::SynAck),
        )
        .await;
        let syn_ack_bytes = match syn_ack_outcome {
            Ok(SequencerOutcome::Frame(bytes)) => bytes,
            Ok(SequencerOutcome::Transport(e)) => {
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::Transport(e));
            }
            Ok(SequencerOutcome::UnexpectedOrdering) => {
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::HandshakeMalformed {
                    step: HandshakeStep::Syn,
                    source: crate::error::CodecError::UnexpectedFraming("unexpected ordering during handshake".into()),
                });
            }
            Err(_elapsed) => {
                sequencer.cancel_wait(CorrelationKey::SynAck).await;
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::HandshakeTimeout { step: HandshakeStep::Syn });
            }
        };
        if let Err(e) = codec::decode_syn_ack(&syn_ack_bytes) {
            self.state = ConnectionState::Disconnected;
            return Err(HandshakeError::HandshakeMalformed { step: HandshakeStep::Syn, source: e });
        }

        let inquiry = codec::build_universal_inquiry().to_vec();
        let reply_outcome = timeout(
            config.t_inquiry,
            sequencer.send_and_await(Pair::Data, inquiry, CorrelationKey::IdentityReply),
        )
        .await;
        let reply_bytes = match reply_outcome {
            Ok(SequencerOutcome::Frame(bytes)) => bytes,
            Ok(SequencerOutcome::Transport(e)) => {
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::Transport(e));
            }
            Ok(SequencerOutcome::UnexpectedOrdering) => {
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::HandshakeMalformed {
                    step: HandshakeStep::Inquiry,
                    source: crate::error::CodecError::UnexpectedFraming("unexpected ordering during handshake".into()),
                });
            }
            Err(_elapsed) => {
                sequencer.cancel_wait(CorrelationKey::IdentityReply).await;
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::HandshakeTimeout { step: HandshakeStep::Inquiry });
            }
        };
        let identity = match codec::decode_identity_reply(&reply_bytes) {
            Ok(identity) => identity,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(HandshakeError::HandshakeMalformed { step: HandshakeStep::Inquiry, source: e });
            }
        };

        self.identity = Some(identity);
        self.state = ConnectionState::Ready;
        info!("handshake complete");
        Ok(identity)
    }

    /// Retries [`Self::handshake`] up to `config.reconnect_attempts` times
    /// with exponential backoff, doubling from
    /// `reconnect_backoff_initial` and capping at `reconnect_backoff_max`
    /// (§4.4).
    pub(crate) async fn reconnect(
        &mut self,
        sequencer: &SequencerHandle,
        config: &DriverConfig,
    ) -> Result<DeviceIdentity, HandshakeError> {
        self.state = ConnectionState::Disconnected;
        let mut delay = config.reconnect_backoff_initial;
        // At least one attempt runs even if a caller configures
        // `reconnect_attempts: 0`, so this never needs to unwrap an absent
        // error.
        let attempts = config.reconnect_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self.handshake(sequencer, config).await;
            match result {
                Ok(identity) => return Ok(identity),
                Err(e) => {
                    info!("reconnect attempt {attempt} failed: {e}");
                    if attempt >= attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, config.reconnect_backoff_max);
                    attempt += 1;
                }
            }
        }
    }
}

/// Test-only constructor used by [`crate::manager`]'s scenario tests to
/// exercise read/write behaviour against an already-`Ready` engine without
/// re-running the handshake state machine those tests don't care about.
#[cfg(test)]
impl HandshakeEngine {
    pub(crate) fn ready_for_test(identity: DeviceIdentity) -> Self {
        HandshakeEngine {
            state: ConnectionState::Ready,
            identity: Some(identity),
        }
    }
}
