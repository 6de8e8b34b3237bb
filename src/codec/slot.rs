//! Control-pair messages (§4.1.5, §4.1.6): slot selection and the one-shot
//! feature-control-enable note. Both are short, non-SysEx control-change/
//! note-on messages, unlike the rest of the codec's `F0..F7` frames — kept
//! separate from `custom_mode.rs` the way the teacher keeps plain
//! `AutomapCommand` CC-encode helpers apart from its SysEx enums.

use crate::error::CodecError;

use super::framing::encode_slot;

const SLOT_SELECT_CHANNEL: u8 = 6;
const SLOT_SELECT_CONTROLLER: u8 = 0x1E;

/// Builds the Slot-Select control-change (§4.1.5): channel index 6,
/// controller `0x1E`, value = the slot's nonlinear wire encoding.
///
/// Scenario 2 from spec §8: `select_slot(4)` emits `B6 1E 12`.
pub fn build_select_slot(slot: u8) -> Result<[u8; 3], CodecError> {
    let value = encode_slot(slot)?;
    Ok([0xB0 | SLOT_SELECT_CHANNEL, SLOT_SELECT_CONTROLLER, value])
}

/// Recognizes the device's echo of a Slot-Select on the control input,
/// returning the decoded slot if `bytes` is a slot-select CC at all.
pub fn decode_select_slot_echo(bytes: &[u8]) -> Option<u8> {
    if bytes.len() == 3 && bytes[0] == (0xB0 | SLOT_SELECT_CHANNEL) && bytes[1] == SLOT_SELECT_CONTROLLER {
        super::framing::decode_slot(bytes[2]).ok()
    } else {
        None
    }
}

/// Builds the Feature-Control-Enable note-on (§4.1.6): channel 16, note 11,
/// velocity 127. Sent once after opening the control pair.
pub fn build_feature_control_enable() -> [u8; 3] {
    [0x90 | 0x0F, 11, 127]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_select_slot_four_matches_scenario() {
        assert_eq!(build_select_slot(4).unwrap(), [0xB6, 0x1E, 0x12]);
    }

    #[test]
    fn echo_roundtrips() {
        let frame = build_select_slot(7).unwrap();
        assert_eq!(decode_select_slot_echo(&frame), Some(7));
        assert_eq!(decode_select_slot_echo(&[0x90, 11, 127]), None);
    }

    #[test]
    fn feature_enable_is_fixed() {
        assert_eq!(build_feature_control_enable(), [0x9F, 11, 127]);
    }
}
