//! The sequencer (§5, §9 "Callbacks vs sequencer"): a single Tokio task
//! that owns the transport and the pending-correlation map, consuming a
//! bounded stream of inbound frames and caller requests. Every suspension
//! point elsewhere in the crate (handshake waits, slot-select echo waits,
//! read/write page/ack waits) is expressed as a request sent to this task
//! and a `oneshot` reply awaited by the caller — nothing outside this
//! module ever touches the transport directly, matching §5's "only the
//! sequencer sends".
//!
//! Grounded in design note §9's suggested shape ("an owned sequencer task
//! consuming a bounded channel of `{InboundFrame, TimerFired,
//! CallerRequest}` events... each pending transaction owns a resolver
//! handle stored in a small `page -> resolver` map") and in how
//! `dataO1-Mesh/crates/mesh-midi`'s `midi::input::CallbackData` bridges a
//! midir callback into an async-consumable channel.

pub mod transaction;

use std::collections::HashMap;

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::codec::{custom_mode, handshake as handshake_codec};
use crate::error::{Page, TransportError};
use crate::transport::{InboundFrame, MidiTransport, Pair};

/// What a pending request is waiting to be correlated against. Mirrors
/// design note §9's "tagged variants over inheritance" philosophy applied
/// to correlation rather than to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CorrelationKey {
    SynAck,
    IdentityReply,
    SlotEcho,
    ReadPage(Page),
    WriteAck(Page),
}

/// Resolution delivered to a waiting caller.
pub(crate) enum SequencerOutcome {
    Frame(Vec<u8>),
    Transport(TransportError),
    /// §5: "if page 1 ack arrives before page 0 ack, it is treated as
    /// `UnexpectedAckOrdering` and fails page 0's wait".
    UnexpectedOrdering,
}

pub(crate) enum SequencerEvent {
    Inbound(InboundFrame),
    SendOnly {
        pair: Pair,
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    SendAndAwait {
        pair: Pair,
        bytes: Vec<u8>,
        key: CorrelationKey,
        reply: oneshot::Sender<SequencerOutcome>,
    },
    /// Removes a stale wait from the correlation map — used when a caller
    /// gives up on a deadline so the map never grows unboundedly (§5:
    /// "Timeouts do not leak memory: pending contexts are removed from the
    /// correlation map on resolve/reject").
    CancelWait { key: CorrelationKey },
}

/// Handle callers use to talk to the sequencer task. Cloneable: the
/// Handshake Engine, Slot Selector and Transaction Engine each hold one,
/// but every request still funnels through the single sequencer task, so
/// the "strict FIFO, one in-flight transaction" guarantee (§5) holds
/// regardless of how many handles exist.
#[derive(Clone)]
pub(crate) struct SequencerHandle {
    tx: flume::Sender<SequencerEvent>,
}

impl SequencerHandle {
    /// Fire-and-forget send (e.g. the feature-control-enable note).
    pub(crate) async fn send(&self, pair: Pair, bytes: Vec<u8>) -> Result<(), TransportError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send_async(SequencerEvent::SendOnly { pair, bytes, reply }).await;
        rx.await.unwrap_or(Err(TransportError::PortClosed))
    }

    /// Registers interest in `key`, sends `bytes` on `pair`, and returns
    /// once either a matching inbound frame arrives or the send itself
    /// fails. Callers wrap this in `tokio::time::timeout` for the
    /// deadline appropriate to their step (§4.4-§4.6).
    pub(crate) async fn send_and_await(&self, pair: Pair, bytes: Vec<u8>, key: CorrelationKey) -> SequencerOutcome {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send_async(SequencerEvent::SendAndAwait { pair, bytes, key, reply })
            .await
            .is_err()
        {
            return SequencerOutcome::Transport(TransportError::PortClosed);
        }
        rx.await.unwrap_or(SequencerOutcome::Transport(TransportError::PortClosed))
    }

    /// Cleans up after a deadline elapses with no resolution.
    pub(crate) async fn cancel_wait(&self, key: CorrelationKey) {
        let _ = self.tx.send_async(SequencerEvent::CancelWait { key }).await;
    }
}

/// Classifies an inbound frame into the correlation key a waiter would
/// have registered for it, or `None` if it doesn't match any family this
/// engine understands.
fn classify(frame: &InboundFrame) -> Option<CorrelationKey> {
    match frame.pair {
        Pair::Control => {
            crate::codec::slot::decode_select_slot_echo(&frame.bytes).map(|_| CorrelationKey::SlotEcho)
        }
        Pair::Data => {
            if let Some(kind) = handshake_codec::sniff(&frame.bytes) {
                return Some(match kind {
                    handshake_codec::HandshakeFrameKind::SynAck => CorrelationKey::SynAck,
                    handshake_codec::HandshakeFrameKind::IdentityReply => CorrelationKey::IdentityReply,
                });
            }
            let (cmd, page_byte) = custom_mode::sniff(&frame.bytes)?;
            let page = match page_byte? {
                0x00 => Page::Page0,
                0x03 => Page::Page1,
                _ => return None,
            };
            match cmd {
                0x10 => Some(CorrelationKey::ReadPage(page)),
                0x15 => Some(CorrelationKey::WriteAck(page)),
                _ => None,
            }
        }
    }
}

/// Runs the sequencer loop until both the inbound-frame channel and the
/// caller-request channel close. Spawned once per
/// [`crate::manager::ModeManager`] connection via `tokio::spawn`; the two
/// input streams (transport callbacks, caller requests) are multiplexed
/// with `tokio::select!` rather than funnelled through an extra hop.
pub(crate) async fn run(
    mut transport: MidiTransport,
    inbound_rx: flume::Receiver<InboundFrame>,
    events_rx: flume::Receiver<SequencerEvent>,
) {
    let mut pending: HashMap<CorrelationKey, oneshot::Sender<SequencerOutcome>> = HashMap::new();
    let mut inbound_open = true;
    let mut events_open = true;

    loop {
        if !inbound_open && !events_open {
            break;
        }
        let event = tokio::select! {
            frame = inbound_rx.recv_async(), if inbound_open => match frame {
                Ok(frame) => SequencerEvent::Inbound(frame),
                Err(_) => { inbound_open = false; continue; }
            },
            event = events_rx.recv_async(), if events_open => match event {
                Ok(event) => event,
                Err(_) => { events_open = false; continue; }
            },
        };
        match event {
            SequencerEvent::Inbound(frame) => {
                let Some(key) = classify(&frame) else {
                    debug!("dropping unclassified inbound frame on {:?}", frame.pair);
                    continue;
                };
                if let Some(resolver) = pending.remove(&key) {
                    let _ = resolver.send(SequencerOutcome::Frame(frame.bytes));
                    continue;
                }
                // §5: a page-1 ack arriving while page-0's ack is still
                // pending fails page 0's wait rather than being dropped.
                if key == CorrelationKey::WriteAck(Page::Page1) {
                    if let Some(resolver) = pending.remove(&CorrelationKey::WriteAck(Page::Page0)) {
                        let _ = resolver.send(SequencerOutcome::UnexpectedOrdering);
                        continue;
                    }
                }
                warn!("unexpected frame for {key:?}, no pending waiter; dropping");
            }
            SequencerEvent::SendOnly { pair, bytes, reply } => {
                let result = transport.send(pair, &bytes);
                let _ = reply.send(result);
            }
            SequencerEvent::SendAndAwait { pair, bytes, key, reply } => {
                match transport.send(pair, &bytes) {
                    Ok(()) => {
                        pending.insert(key, reply);
                    }
                    Err(e) => {
                        let _ = reply.send(SequencerOutcome::Transport(e));
                    }
                }
            }
            SequencerEvent::CancelWait { key } => {
                pending.remove(&key);
            }
        }
    }
    transport.close();
}

/// Spawns the sequencer task, wiring the transport's inbound callbacks
/// into the same event stream as caller requests, and returns the handle
/// callers use to drive it.
pub(crate) fn spawn(
    client_name: &str,
    ports: &crate::transport::DriverPorts,
    queue_capacity: usize,
) -> Result<SequencerHandle, TransportError> {
    let (inbound_tx, inbound_rx) = flume::bounded(queue_capacity);
    let transport = MidiTransport::connect(client_name, ports, inbound_tx)?;

    let (events_tx, events_rx) = flume::bounded::<SequencerEvent>(queue_capacity);
    tokio::spawn(run(transport, inbound_rx, events_rx));

    Ok(SequencerHandle { tx: events_tx })
}

/// A [`SequencerHandle`] with no backing [`run`] loop, plus a fake device
/// that answers the sequencer's requests directly — used by the
/// scenario/boundary tests in `manager`, `handshake` and `slot_selector`
/// to exercise the C4-C7 state machines against spec.md §8's literal byte
/// sequences without opening a real MIDI port. Mirrors how
/// `dataO1-Mesh/crates/mesh-midi` tests its connection layer against an
/// in-process fake rather than a real ALSA/CoreMIDI backend.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::{SequencerEvent, SequencerHandle, SequencerOutcome};
    use crate::error::TransportError;
    use crate::transport::Pair;

    /// A handle whose other end is driven by [`spawn_scripted_device`]
    /// rather than [`super::run`]. Initializes `env_logger` once so `RUST_LOG`
    /// surfaces the `debug!`/`warn!` lines emitted by the engines under test.
    pub(crate) fn handle_and_rx() -> (SequencerHandle, flume::Receiver<SequencerEvent>) {
        let _ = env_logger::try_init();
        let (tx, rx) = flume::unbounded();
        (SequencerHandle { tx }, rx)
    }

    /// One scripted reaction to an outbound `SendAndAwait`.
    pub(crate) enum ScriptedResponse {
        /// Resolve immediately with this inbound frame's bytes.
        Frame(Vec<u8>),
        /// Never resolve — the reply sender is held open for the life of
        /// the device task, so the caller's own `tokio::time::timeout`
        /// deadline is what ends the wait. Used to exercise a real
        /// `HandshakeTimeout`/`ReadTimeout`/`WriteTimeout` path against a
        /// short-configured deadline instead of a transport failure.
        Hang,
    }

    impl From<Vec<u8>> for ScriptedResponse {
        fn from(bytes: Vec<u8>) -> Self {
            ScriptedResponse::Frame(bytes)
        }
    }

    /// Spawns a fake device task that records every outbound `(pair,
    /// bytes)` in arrival order and answers each `SendAndAwait` with the
    /// next entry of `script`; once `script` is exhausted, further
    /// `SendAndAwait`s resolve as a transport failure (so timeout-tolerant
    /// paths like the slot-select echo can be exercised without actually
    /// waiting out a deadline). `SendOnly` always succeeds.
    pub(crate) fn spawn_scripted_device(
        rx: flume::Receiver<SequencerEvent>,
        script: Vec<ScriptedResponse>,
    ) -> Arc<Mutex<Vec<(Pair, Vec<u8>)>>> {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_task = Arc::clone(&sent);
        let mut script = script.into_iter();
        tokio::spawn(async move {
            // Replies that must never be sent (the `Hang` case) are parked
            // here so dropping them doesn't resolve the waiting oneshot.
            let mut held = Vec::new();
            while let Ok(event) = rx.recv_async().await {
                match event {
                    SequencerEvent::Inbound(_) => {}
                    SequencerEvent::SendOnly { pair, bytes, reply } => {
                        sent_task.lock().unwrap().push((pair, bytes));
                        let _ = reply.send(Ok(()));
                    }
                    SequencerEvent::SendAndAwait { pair, bytes, reply, .. } => {
                        sent_task.lock().unwrap().push((pair, bytes));
                        match script.next() {
                            Some(ScriptedResponse::Frame(frame)) => {
                                let _ = reply.send(SequencerOutcome::Frame(frame));
                            }
                            Some(ScriptedResponse::Hang) => held.push(reply),
                            None => {
                                let _ = reply.send(SequencerOutcome::Transport(TransportError::PortClosed));
                            }
                        }
                    }
                    SequencerEvent::CancelWait { .. } => {}
                }
            }
        });
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_slot_echo() {
        let frame = InboundFrame {
            pair: Pair::Control,
            bytes: crate::codec::slot::build_select_slot(4).unwrap().to_vec(),
        };
        assert_eq!(classify(&frame), Some(CorrelationKey::SlotEcho));
    }

    #[test]
    fn classifies_read_response_page() {
        let mut frame_bytes = vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x10, 0x00, 0x06, 0x20];
        frame_bytes.push(0x60 + 1);
        frame_bytes.push(b'A');
        frame_bytes.push(0xF7);
        let frame = InboundFrame { pair: Pair::Data, bytes: frame_bytes };
        assert_eq!(classify(&frame), Some(CorrelationKey::ReadPage(Page::Page0)));
    }

    #[test]
    fn classifies_write_ack_page() {
        let frame = InboundFrame {
            pair: Pair::Data,
            bytes: vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x03, 0x0D, 0xF7],
        };
        assert_eq!(classify(&frame), Some(CorrelationKey::WriteAck(Page::Page1)));
    }
}
