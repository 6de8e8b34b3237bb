//! Mode Manager (C7, §4.7): the public read/write API. Converts between
//! the Mode Model and on-wire page payloads, drives the Slot Selector and
//! Transaction Engine, and is the only type external callers construct
//! directly — mirroring how the teacher's `AutomapDevice` is the single
//! entry point `demo_smol.rs` talks to.

use crate::config::DriverConfig;
use crate::engine::{self, transaction, SequencerHandle};
use crate::error::{Error, SlotError, TransactionError};
use crate::handshake::{ConnectionState, HandshakeEngine};
use crate::identity::DeviceIdentity;
use crate::model::{is_factory_name, CustomMode};
use crate::slot_selector::SlotSelector;
use crate::transport::DriverPorts;

/// §4.4: "on any transport disconnect, the engine returns to
/// Disconnected". `read_mode`/`write_mode` are the only operations that
/// can observe a disconnect after the handshake has already completed
/// (the Slot Selector tolerates transport failure itself, per §4.5), so
/// this is the one predicate both check their `Transaction` result
/// against.
fn is_transport_disconnect(err: &Error) -> bool {
    matches!(err, Error::Transport(_) | Error::Transaction(TransactionError::Transport(_)))
}

pub use crate::engine::transaction::Warning;

/// Result of a successful `writeMode`: empty unless the device exhibited
/// the page-1 ack firmware quirk (§4.1.8, B5), in which case the observed
/// vs. expected status bytes are reported so the caller can log them.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub warnings: Vec<Warning>,
}

/// A successful read, tagged with whether the slot looked unprogrammed
/// (§4.6.1: "the engine still returns the parsed mode; the Mode Manager
/// may then map it to an `EmptySlot` sentinel").
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Programmed(CustomMode),
    EmptySlot(CustomMode),
}

impl ReadOutcome {
    pub fn mode(&self) -> &CustomMode {
        match self {
            ReadOutcome::Programmed(m) | ReadOutcome::EmptySlot(m) => m,
        }
    }
}

/// Sends the Feature-Control-Enable note-on once on the control pair
/// (§4.1.6), as `connect` does right after opening it and before the
/// handshake (which runs entirely on the data pair).
async fn enable_feature_control(sequencer: &SequencerHandle) -> Result<(), crate::error::TransportError> {
    sequencer
        .send(crate::transport::Pair::Control, crate::codec::slot::build_feature_control_enable().to_vec())
        .await
}

/// The crate's single public entry point: owns the sequencer, the
/// handshake state, and the timing/retry configuration for one connected
/// device. `HandshakeEngine` takes `sequencer`/`config` as call arguments
/// rather than borrowing them as fields, so this struct is an ordinary
/// (non-self-referential) owner of all three.
pub struct ModeManager {
    sequencer: SequencerHandle,
    config: DriverConfig,
    handshake: HandshakeEngine,
}

impl ModeManager {
    /// Opens both port pairs, spawns the sequencer, and runs the
    /// handshake. `client_name` is this process's own MIDI client name,
    /// distinct from the device's port names in `ports`.
    pub async fn connect(client_name: &str, ports: DriverPorts, config: DriverConfig) -> Result<Self, Error> {
        let sequencer = engine::spawn(client_name, &ports, config.inbound_queue_capacity)?;
        enable_feature_control(&sequencer).await?;
        let mut handshake = HandshakeEngine::new();
        handshake.handshake(&sequencer, &config).await?;
        Ok(ModeManager { sequencer, config, handshake })
    }

    /// Available after a successful handshake (§4.7).
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.handshake.identity()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handshake.state()
    }

    /// Retries the handshake sequence with exponential backoff (§4.4).
    pub async fn reconnect(&mut self) -> Result<DeviceIdentity, Error> {
        Ok(self.handshake.reconnect(&self.sequencer, &self.config).await?)
    }

    /// `readMode(slot) -> Result<Mode, ReadError>` (§4.7). `slot` may be
    /// 15 (reserved, read-only).
    pub async fn read_mode(&mut self, slot: u8) -> Result<ReadOutcome, Error> {
        if slot > CustomMode::MAX_SLOT {
            return Err(SlotError::InvalidSlot(slot).into());
        }
        SlotSelector::new(&self.sequencer, &self.config).select(slot).await?;

        let result = match transaction::read(&self.sequencer, &self.config).await {
            Ok(result) => result,
            Err(e) => {
                let err = Error::from(e);
                if is_transport_disconnect(&err) {
                    self.handshake.mark_disconnected();
                }
                return Err(err);
            }
        };
        let mode = CustomMode::new(slot, &result.name, result.controls, result.labels, [])
            .map_err(crate::error::Error::Model)?;

        if is_factory_name(&result.name) {
            Ok(ReadOutcome::EmptySlot(mode))
        } else {
            Ok(ReadOutcome::Programmed(mode))
        }
    }

    /// `writeMode(slot, Mode) -> Result<(), WriteError>` (§4.7): validates
    /// the mode (already done at construction, I5), partitions controls
    /// and labels by page (C1's `+0x28`/page-range rules), builds each
    /// page, and drives the Transaction Engine.
    pub async fn write_mode(&mut self, slot: u8, mode: &CustomMode) -> Result<WriteOutcome, Error> {
        if slot > CustomMode::MAX_WRITABLE_SLOT {
            return Err(SlotError::InvalidSlot(slot).into());
        }
        let expected_slot_encoding = crate::codec::framing::encode_slot(slot).map_err(crate::error::Error::Protocol)?;

        SlotSelector::new(&self.sequencer, &self.config).select(slot).await?;
        tokio::time::sleep(self.config.slot_select_dwell).await;

        let controls: Vec<_> = mode.controls().values().copied().collect();
        let labels: Vec<_> = mode.labels().iter().map(|(id, s)| (*id, s.clone())).collect();
        let colors: Vec<_> = mode.colors().iter().map(|(id, c)| (*id, *c)).collect();

        let warnings = match transaction::write(
            &self.sequencer,
            &self.config,
            expected_slot_encoding,
            mode.name(),
            &controls,
            &labels,
            &colors,
        )
        .await
        {
            Ok(warnings) => warnings,
            Err(e) => {
                let err = Error::from(e);
                if is_transport_disconnect(&err) {
                    self.handshake.mark_disconnected();
                }
                return Err(err);
            }
        };

        Ok(WriteOutcome { warnings })
    }
}

/// Test-only constructor: builds a [`ModeManager`] against an
/// already-`Ready` handshake, driven by a scripted sequencer instead of a
/// real `midir` connection, so §8's read/write scenarios and boundary
/// cases can be exercised without opening a MIDI port.
#[cfg(test)]
impl ModeManager {
    pub(crate) fn for_test(sequencer: SequencerHandle, config: DriverConfig, identity: DeviceIdentity) -> Self {
        ModeManager {
            sequencer,
            config,
            handshake: HandshakeEngine::ready_for_test(identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{handle_and_rx, spawn_scripted_device, ScriptedResponse};
    use crate::error::{Error, TransactionError};

    fn dummy_identity() -> DeviceIdentity {
        DeviceIdentity::new([0x00, 0x20, 0x29], [0x48, 0x01], [0x00, 0x00], [0x01, 0x00, 0x0A, 0x54])
    }

    fn read_request(page_byte: u8) -> Vec<u8> {
        vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x40, page_byte, 0x00, 0xF7]
    }

    /// End-to-end scenario 3 (spec §8): reading an empty slot decodes the
    /// factory name pattern and is tagged `EmptySlot`.
    #[tokio::test]
    async fn read_empty_slot_is_tagged_empty() {
        let (sequencer, rx) = handle_and_rx();
        let mut page0 = vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x10, 0x00, 0x06, 0x20];
        page0.push(0x60 + 8);
        page0.extend_from_slice(b"Custom 1");
        page0.push(0xF7);
        let page1 = vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x10, 0x03, 0xF7];
        let sent = spawn_scripted_device(
            rx,
            vec![
                ScriptedResponse::Frame(vec![0xB6, 0x1E, 0x06]), // slot 0 select echo
                ScriptedResponse::Frame(page0),
                ScriptedResponse::Frame(page1),
            ],
        );

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        let outcome = manager.read_mode(0).await.unwrap();

        match &outcome {
            ReadOutcome::EmptySlot(mode) => {
                assert_eq!(mode.name(), "Custom 1");
                assert!(mode.controls().is_empty());
            }
            ReadOutcome::Programmed(_) => panic!("factory-named slot must be tagged EmptySlot"),
        }
        assert_eq!(sent.lock().unwrap()[1].1, read_request(0x00));
    }

    /// End-to-end scenarios 4 and 5 (spec §8): page-0 ack matches the
    /// expected slot encoding, page-1 ack carries the documented firmware
    /// quirk (status `0x0D` where `0x12` is expected) and surfaces only as
    /// a warning.
    #[tokio::test]
    async fn write_slot4_reports_page1_quirk_as_warning() {
        let (sequencer, rx) = handle_and_rx();
        let _sent = spawn_scripted_device(
            rx,
            vec![
                ScriptedResponse::Frame(vec![0xB6, 0x1E, 0x12]), // slot 4 select echo
                ScriptedResponse::Frame(vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x00, 0x12, 0xF7]),
                ScriptedResponse::Frame(vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x03, 0x0D, 0xF7]),
            ],
        );

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        let mode = CustomMode::new(4, "CHANNEVE", vec![], vec![], vec![]).unwrap();
        let outcome = manager.write_mode(4, &mode).await.unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        let warning = outcome.warnings[0];
        assert_eq!(warning.page, crate::error::Page::Page1);
        assert_eq!(warning.observed, 0x0D);
        assert_eq!(warning.expected, 0x12);
    }

    /// End-to-end scenario 6 (spec §8): a page-0 ack status byte that
    /// encodes a different slot (here, the currently-active slot 3, status
    /// `0x09`) is fatal and the write never reaches page 1.
    #[tokio::test]
    async fn write_page0_ack_mismatch_is_fatal() {
        let (sequencer, rx) = handle_and_rx();
        let sent = spawn_scripted_device(
            rx,
            vec![
                ScriptedResponse::Frame(vec![0xB6, 0x1E, 0x12]),
                ScriptedResponse::Frame(vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x00, 0x09, 0xF7]),
            ],
        );

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        let mode = CustomMode::new(4, "CHANNEVE", vec![], vec![], vec![]).unwrap();
        let err = manager.write_mode(4, &mode).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Transaction(TransactionError::AckSlotMismatch {
                page: crate::error::Page::Page0,
                observed: 0x09,
                expected: 0x12,
            })
        ));
        // Only the slot-select and page-0 write were sent; page 1 never went out.
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    /// B1: writing to slot 15 (reserved) is rejected before anything is
    /// sent to the device.
    #[tokio::test]
    async fn write_slot_fifteen_rejected_without_any_send() {
        let (sequencer, rx) = handle_and_rx();
        let sent = spawn_scripted_device(rx, vec![]);

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        let mode = CustomMode::new(15, "Reserved", vec![], vec![], vec![]).unwrap();
        let err = manager.write_mode(15, &mode).await.unwrap_err();

        assert!(matches!(err, Error::Slot(crate::error::SlotError::InvalidSlot(15))));
        assert!(sent.lock().unwrap().is_empty());
    }

    /// B3: an empty control set is accepted on write.
    #[tokio::test]
    async fn write_with_zero_controls_is_accepted() {
        let (sequencer, rx) = handle_and_rx();
        let _sent = spawn_scripted_device(
            rx,
            vec![
                ScriptedResponse::Frame(vec![0xB6, 0x1E, 0x12]),
                ScriptedResponse::Frame(vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x00, 0x12, 0xF7]),
                ScriptedResponse::Frame(vec![0xF0, 0x00, 0x20, 0x29, 0x02, 0x15, 0x05, 0x00, 0x15, 0x03, 0x12, 0xF7]),
            ],
        );

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        let mode = CustomMode::new(4, "Empty", vec![], vec![], vec![]).unwrap();
        let outcome = manager.write_mode(4, &mode).await.unwrap();
        assert!(outcome.warnings.is_empty());
    }

    /// §4.4: a transport failure surfacing from the Transaction Engine
    /// forces the engine back to `Disconnected` automatically, without the
    /// caller calling `reconnect()` first.
    #[tokio::test]
    async fn read_mode_marks_disconnected_on_transport_failure() {
        let (sequencer, rx) = handle_and_rx();
        // Only the slot-select echo is scripted; the page-0 read request
        // that follows finds the script exhausted and resolves as a
        // transport failure.
        let _sent = spawn_scripted_device(rx, vec![ScriptedResponse::Frame(vec![0xB6, 0x1E, 0x06])]);

        let mut manager = ModeManager::for_test(sequencer, DriverConfig::default(), dummy_identity());
        assert_eq!(manager.connection_state(), ConnectionState::Ready);

        let err = manager.read_mode(0).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(TransactionError::Transport(crate::error::TransportError::PortClosed))
        ));
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    }

    /// §4.1.6: the feature-control-enable note is the first thing sent on
    /// the control pair after opening it.
    #[tokio::test]
    async fn connect_sends_feature_control_enable_first() {
        let (sequencer, rx) = handle_and_rx();
        let sent = spawn_scripted_device(rx, vec![]);

        enable_feature_control(&sequencer).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (crate::transport::Pair::Control, vec![0x9F, 11, 127]));
    }
}
