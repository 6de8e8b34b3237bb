//! Slot Selector (C5, §4.5): the single `select` operation, sent on the
//! control pair, with a non-fatal echo-wait timeout — firmware that
//! doesn't echo is tolerated via the fixed dwell rather than failing the
//! caller.

use log::debug;
use tokio::time::timeout;

use crate::codec::slot as slot_codec;
use crate::config::DriverConfig;
use crate::engine::{CorrelationKey, SequencerHandle, SequencerOutcome};
use crate::error::SlotError;
use crate::transport::Pair;

pub(crate) struct SlotSelector<'a> {
    sequencer: &'a SequencerHandle,
    config: &'a DriverConfig,
}

impl<'a> SlotSelector<'a> {
    pub(crate) fn new(sequencer: &'a SequencerHandle, config: &'a DriverConfig) -> Self {
        SlotSelector { sequencer, config }
    }

    /// Selects `slot` (0..=14 for writes; the Mode Manager enforces the
    /// writable range, this just validates the wire-encodable range
    /// 0..=15). Returns `Ok(())` whether or not the echo arrived — a
    /// timeout is logged, not propagated as failure, per §4.5. Does not
    /// dwell: write transactions own the "100ms minimum safe dwell" after
    /// select (§4.6.2), since reads have no such requirement.
    pub(crate) async fn select(&self, slot: u8) -> Result<(), SlotError> {
        let bytes = slot_codec::build_select_slot(slot).map_err(|_| SlotError::InvalidSlot(slot))?.to_vec();

        match timeout(
            self.config.t_slot_select,
            self.sequencer.send_and_await(Pair::Control, bytes, CorrelationKey::SlotEcho),
        )
        .await
        {
            Ok(SequencerOutcome::Frame(_)) => {
                debug!("slot {slot} select echoed");
            }
            Ok(SequencerOutcome::Transport(_)) | Ok(SequencerOutcome::UnexpectedOrdering) => {
                debug!("slot {slot} select send failed or was misrouted; proceeding after dwell");
            }
            Err(_elapsed) => {
                self.sequencer.cancel_wait(CorrelationKey::SlotEcho).await;
                debug!("slot {slot} select echo timed out ({:?})", SlotError::SlotSelectTimeout);
            }
        }
        Ok(())
    }
}
