//! Transaction Engine (C6): the read and write page/ack state machines
//! (§4.6). Both drive the sequencer through [`super::SequencerHandle`],
//! wrapping each wait in `tokio::time::timeout` for the step's configured
//! deadline — the async analogue of `tylerferrin-librarian`'s
//! poll-with-deadline loop, but resolved by a correlated `oneshot` instead
//! of re-polling a shared buffer.

use tokio::time::timeout;

use crate::codec::custom_mode::{self, ReadResponse, WriteAck};
use crate::config::DriverConfig;
use crate::error::{CodecError, Page, TransactionError};
use crate::model::{ControlBinding, ControlId, PAGE0_RANGE, PAGE1_RANGE};
use crate::transport::Pair;

use super::{CorrelationKey, SequencerHandle, SequencerOutcome};

/// The two pages of a mode merged together, before the Mode Manager (C7)
/// turns them into a [`crate::model::CustomMode`].
pub(crate) struct ReadResult {
    pub name: String,
    pub controls: Vec<ControlBinding>,
    pub labels: Vec<(ControlId, String)>,
}

/// One non-fatal anomaly observed while writing (§4.1.8, §7): surfaced to
/// the caller rather than raised as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warning {
    pub page: Page,
    pub observed: u8,
    pub expected: u8,
}

async fn await_outcome(
    sequencer: &SequencerHandle,
    pair: Pair,
    bytes: Vec<u8>,
    key: CorrelationKey,
    deadline: std::time::Duration,
    on_timeout: impl FnOnce() -> TransactionError,
) -> Result<Vec<u8>, TransactionError> {
    match timeout(deadline, sequencer.send_and_await(pair, bytes, key)).await {
        Ok(SequencerOutcome::Frame(bytes)) => Ok(bytes),
        Ok(SequencerOutcome::Transport(e)) => Err(TransactionError::Transport(e)),
        Ok(SequencerOutcome::UnexpectedOrdering) => Err(TransactionError::UnexpectedAckOrdering),
        Err(_elapsed) => {
            sequencer.cancel_wait(key).await;
            Err(on_timeout())
        }
    }
}

/// Runs a full read transaction for an already-selected slot (§4.6.1):
/// request page 0, then page 1, merging both into one [`ReadResult`].
pub(crate) async fn read(sequencer: &SequencerHandle, config: &DriverConfig) -> Result<ReadResult, TransactionError> {
    let page0_bytes = await_outcome(
        sequencer,
        Pair::Data,
        custom_mode::build_read_request(Page::Page0).to_vec(),
        CorrelationKey::ReadPage(Page::Page0),
        config.t_read,
        || TransactionError::ReadTimeout { page: Page::Page0 },
    )
    .await?;
    let page0: ReadResponse = custom_mode::decode_read_response(&page0_bytes)?;

    let page1_bytes = await_outcome(
        sequencer,
        Pair::Data,
        custom_mode::build_read_request(Page::Page1).to_vec(),
        CorrelationKey::ReadPage(Page::Page1),
        config.t_read,
        || TransactionError::ReadTimeout { page: Page::Page1 },
    )
    .await?;
    let page1: ReadResponse = custom_mode::decode_read_response(&page1_bytes)?;

    let name = page0.name.ok_or_else(|| {
        TransactionError::Protocol(CodecError::UnexpectedFraming("page 0 response missing name".into()))
    })?;
    let mut controls = page0.controls;
    controls.extend(page1.controls);
    let mut labels = page0.labels;
    labels.extend(page1.labels);

    Ok(ReadResult { name, controls, labels })
}

/// Runs a full write transaction for an already-selected, already-dwelt
/// slot (§4.6.2): page 0, its ack, page 1, its ack. Page-0 ack mismatch is
/// fatal; page-1 ack mismatch is a [`Warning`].
pub(crate) async fn write(
    sequencer: &SequencerHandle,
    config: &DriverConfig,
    expected_slot_encoding: u8,
    name: &str,
    controls: &[ControlBinding],
    labels: &[(ControlId, String)],
    colors: &[(ControlId, u8)],
) -> Result<Vec<Warning>, TransactionError> {
    let page0_controls: Vec<_> = controls.iter().filter(|c| PAGE0_RANGE.contains(&c.control_id)).cloned().collect();
    let page1_controls: Vec<_> = controls.iter().filter(|c| PAGE1_RANGE.contains(&c.control_id)).cloned().collect();
    let page0_labels: Vec<(ControlId, &str)> = labels
        .iter()
        .filter(|(id, _)| PAGE0_RANGE.contains(id))
        .map(|(id, s)| (*id, s.as_str()))
        .collect();
    let page1_labels: Vec<(ControlId, &str)> = labels
        .iter()
        .filter(|(id, _)| PAGE1_RANGE.contains(id))
        .map(|(id, s)| (*id, s.as_str()))
        .collect();
    let page0_colors: Vec<_> = colors.iter().filter(|(id, _)| PAGE0_RANGE.contains(id)).copied().collect();
    let page1_colors: Vec<_> = colors.iter().filter(|(id, _)| PAGE1_RANGE.contains(id)).copied().collect();

    let mut warnings = Vec::new();

    let page0_req = custom_mode::build_write_request(Page::Page0, Some(name), &page0_controls, &page0_labels, &page0_colors)?;
    let ack0_bytes = await_outcome(
        sequencer,
        Pair::Data,
        page0_req,
        CorrelationKey::WriteAck(Page::Page0),
        config.t_ack_page0,
        || TransactionError::WriteTimeout { page: Page::Page0 },
    )
    .await?;
    let ack0: WriteAck = custom_mode::decode_write_ack(&ack0_bytes)?;
    if ack0.status != expected_slot_encoding {
        return Err(TransactionError::AckSlotMismatch {
            page: Page::Page0,
            observed: ack0.status,
            expected: expected_slot_encoding,
        });
    }

    let page1_req = custom_mode::build_write_request(Page::Page1, None, &page1_controls, &page1_labels, &page1_colors)?;
    let ack1_bytes = await_outcome(
        sequencer,
        Pair::Data,
        page1_req,
        CorrelationKey::WriteAck(Page::Page1),
        config.t_ack_page1,
        || TransactionError::WriteTimeout { page: Page::Page1 },
    )
    .await?;
    let ack1: WriteAck = custom_mode::decode_write_ack(&ack1_bytes)?;
    if ack1.status != expected_slot_encoding {
        warnings.push(Warning {
            page: Page::Page1,
            observed: ack1.status,
            expected: expected_slot_encoding,
        });
    }

    Ok(warnings)
}
