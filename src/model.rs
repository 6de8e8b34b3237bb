//! Mode Model (C2): the canonical in-memory Custom Mode value type and its
//! invariants (I1..I6). Pure value type, no wire concerns — those live in
//! `crate::codec`. Enum shape follows the teacher's
//! `automap/protocol/cc.rs`/`template.rs` style: small `#[repr(u8)]` enums
//! with explicit discriminants for every fixed-set field.

use std::collections::BTreeMap;

use derive_more::{Debug, TryFrom};

use crate::error::ModelError;

/// One of the 48 physical control identifiers (see §6's control-id map).
/// Stored as a plain `u8` rather than an enum: the 48 values are contiguous
/// ranges keyed by family, not a hand-enumerable closed set a caller spells
/// out by name.
pub type ControlId = u8;

pub const ENCODER_TOP: std::ops::RangeInclusive<ControlId> = 0x10..=0x17;
pub const ENCODER_MID: std::ops::RangeInclusive<ControlId> = 0x18..=0x1F;
pub const ENCODER_BOT: std::ops::RangeInclusive<ControlId> = 0x20..=0x27;
pub const FADER: std::ops::RangeInclusive<ControlId> = 0x28..=0x2F;
pub const TRACK_FOCUS_BUTTON: std::ops::RangeInclusive<ControlId> = 0x30..=0x37;
pub const TRACK_CONTROL_BUTTON: std::ops::RangeInclusive<ControlId> = 0x38..=0x3F;

/// Lowest id carried on page 1; ids below this belong to page 0.
pub const PAGE1_START: ControlId = 0x28;
pub const PAGE0_RANGE: std::ops::RangeInclusive<ControlId> = 0x10..=0x27;
pub const PAGE1_RANGE: std::ops::RangeInclusive<ControlId> = 0x28..=0x3F;

/// Control family, inferable from `controlId` range but redundantly stored
/// on [`ControlBinding`] for validation (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    EncoderTop,
    EncoderMid,
    EncoderBot,
    Fader,
    Button,
}

impl ControlType {
    /// Infers the control type from a physical control id, per §6's map.
    pub fn from_control_id(id: ControlId) -> Result<Self, ModelError> {
        if ENCODER_TOP.contains(&id) {
            Ok(ControlType::EncoderTop)
        } else if ENCODER_MID.contains(&id) {
            Ok(ControlType::EncoderMid)
        } else if ENCODER_BOT.contains(&id) {
            Ok(ControlType::EncoderBot)
        } else if FADER.contains(&id) {
            Ok(ControlType::Fader)
        } else if TRACK_FOCUS_BUTTON.contains(&id) || TRACK_CONTROL_BUTTON.contains(&id) {
            Ok(ControlType::Button)
        } else {
            Err(ModelError::InvariantViolated {
                which: format!("control id {id:#04x} is not one of the 48 physical controls"),
            })
        }
    }

    pub fn is_encoder(&self) -> bool {
        matches!(
            self,
            ControlType::EncoderTop | ControlType::EncoderMid | ControlType::EncoderBot
        )
    }
}

/// Control behaviour (§3). Faders/encoders accept absolute and relative
/// variants; buttons accept absolute/toggle. Discriminants match the wire
/// behaviour-code field (`behaviour_to_code`/`code_to_behaviour` in
/// `crate::codec::custom_mode`), so the codec can round-trip this enum
/// with a plain `as u8`/`try_from` pair instead of a separate match, the
/// way the teacher's `cc.rs` enums mirror their wire values directly.
#[derive(TryFrom, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[try_from(repr)]
pub enum Behaviour {
    Absolute = 0x01,
    Relative1 = 0x02,
    Relative2 = 0x03,
    Relative3 = 0x04,
    Toggle = 0x05,
}

impl Behaviour {
    pub fn is_valid_for(&self, control_type: ControlType) -> bool {
        match self {
            Behaviour::Absolute => true,
            Behaviour::Relative1 | Behaviour::Relative2 | Behaviour::Relative3 => {
                control_type.is_encoder() || control_type == ControlType::Fader
            }
            Behaviour::Toggle => control_type == ControlType::Button,
        }
    }
}

/// One physical control's binding within a Custom Mode (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBinding {
    pub control_id: ControlId,
    pub control_type: ControlType,
    pub midi_channel: u8,
    pub cc_number: u8,
    pub min_value: u8,
    pub max_value: u8,
    pub behaviour: Behaviour,
}

impl ControlBinding {
    /// Validates I5 (numeric ranges) and that `behaviour` fits `control_type`,
    /// and that the redundantly-stored `control_type` matches `control_id`'s
    /// range. Constructs nothing invalid (I5: "enforced at construction").
    pub fn new(
        control_id: ControlId,
        control_type: ControlType,
        midi_channel: u8,
        cc_number: u8,
        min_value: u8,
        max_value: u8,
        behaviour: Behaviour,
    ) -> Result<Self, ModelError> {
        let inferred = ControlType::from_control_id(control_id)?;
        if inferred != control_type {
            return Err(ModelError::InvariantViolated {
                which: format!(
                    "control {control_id:#04x} has type {inferred:?}, not {control_type:?}"
                ),
            });
        }
        if midi_channel > 15 {
            return Err(ModelError::InvariantViolated {
                which: format!("midiChannel {midi_channel} out of range 0..=15"),
            });
        }
        if cc_number > 127 {
            return Err(ModelError::InvariantViolated {
                which: format!("ccNumber {cc_number} out of range 0..=127"),
            });
        }
        if min_value > 127 || max_value > 127 {
            return Err(ModelError::InvariantViolated {
                which: "minValue/maxValue out of range 0..=127".into(),
            });
        }
        if min_value > max_value {
            return Err(ModelError::InvariantViolated {
                which: format!("minValue {min_value} > maxValue {max_value}"),
            });
        }
        if !behaviour.is_valid_for(control_type) {
            return Err(ModelError::InvariantViolated {
                which: format!("behaviour {behaviour:?} is not valid for {control_type:?}"),
            });
        }
        Ok(ControlBinding {
            control_id,
            control_type,
            midi_channel,
            cc_number,
            min_value,
            max_value,
            behaviour,
        })
    }
}

/// The canonical in-memory representation of a device Custom Mode (§3).
///
/// Two modes are equal iff controls/labels/colors match as multisets by id,
/// with identical byte-level field values, and identical names — which
/// falls out of deriving `PartialEq` over `BTreeMap`s keyed by `ControlId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomMode {
    slot: u8,
    name: String,
    controls: BTreeMap<ControlId, ControlBinding>,
    labels: BTreeMap<ControlId, String>,
    colors: BTreeMap<ControlId, u8>,
}

impl CustomMode {
    /// Slot 15 is reserved and read-only from this API; writable slots are
    /// 0..=14 (I3). `readMode(15)` is permitted by the Mode Manager, so the
    /// model itself only rejects slots above 15.
    pub const MAX_SLOT: u8 = 15;
    pub const MAX_WRITABLE_SLOT: u8 = 14;
    pub const MAX_NAME_LEN: usize = 18;
    pub const MAX_LABEL_LEN: usize = 23;

    /// Builds a mode, validating I1..I5. Call sites that need the writable
    /// range (I3) must check `slot <= MAX_WRITABLE_SLOT` themselves — the
    /// Mode Manager does this before a write, since `readMode(15)` must
    /// still be representable as a `CustomMode`.
    pub fn new(
        slot: u8,
        name: impl Into<String>,
        controls: impl IntoIterator<Item = ControlBinding>,
        labels: impl IntoIterator<Item = (ControlId, String)>,
        colors: impl IntoIterator<Item = (ControlId, u8)>,
    ) -> Result<Self, ModelError> {
        if slot > Self::MAX_SLOT {
            return Err(ModelError::InvariantViolated {
                which: format!("slot {slot} out of range 0..=15"),
            });
        }
        let name = name.into();
        if name.is_empty() || name.len() > Self::MAX_NAME_LEN {
            return Err(ModelError::InvariantViolated {
                which: format!("name length {} out of range 1..=18", name.len()),
            });
        }
        if !name.is_ascii() {
            return Err(ModelError::InvariantViolated {
                which: "name must be 7-bit ASCII".into(),
            });
        }

        let mut control_map = BTreeMap::new();
        for c in controls {
            if control_map.insert(c.control_id, c).is_some() {
                return Err(ModelError::InvariantViolated {
                    which: format!("control id {:#04x} appears more than once", c.control_id),
                });
            }
        }

        let mut label_map = BTreeMap::new();
        for (id, text) in labels {
            if !control_map.contains_key(&id) {
                return Err(ModelError::InvariantViolated {
                    which: format!("label for {id:#04x} has no matching control (I1)"),
                });
            }
            if text.is_empty() || text.len() > Self::MAX_LABEL_LEN || !text.is_ascii() {
                return Err(ModelError::InvariantViolated {
                    which: format!("label for {id:#04x} has invalid length or encoding"),
                });
            }
            label_map.insert(id, text);
        }

        let mut color_map = BTreeMap::new();
        for (id, code) in colors {
            if !control_map.contains_key(&id) {
                return Err(ModelError::InvariantViolated {
                    which: format!("color for {id:#04x} has no matching control (I1)"),
                });
            }
            if code > 127 {
                return Err(ModelError::InvariantViolated {
                    which: format!("color code {code} for {id:#04x} out of range 0..=127"),
                });
            }
            color_map.insert(id, code);
        }

        Ok(CustomMode {
            slot,
            name,
            controls: control_map,
            labels: label_map,
            colors: color_map,
        })
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controls(&self) -> &BTreeMap<ControlId, ControlBinding> {
        &self.controls
    }

    pub fn labels(&self) -> &BTreeMap<ControlId, String> {
        &self.labels
    }

    pub fn colors(&self) -> &BTreeMap<ControlId, u8> {
        &self.colors
    }

    /// Deterministic canonical form for snapshot tests (§4.2): the name,
    /// then every control/label/color sorted by id, one field per line.
    pub fn canonical_form(&self) -> String {
        let mut out = format!("slot={} name={:?}\n", self.slot, self.name);
        for (id, c) in &self.controls {
            out.push_str(&format!(
                "control {id:#04x} type={:?} ch={} cc={} min={} max={} behaviour={:?}\n",
                c.control_type, c.midi_channel, c.cc_number, c.min_value, c.max_value, c.behaviour
            ));
        }
        for (id, text) in &self.labels {
            out.push_str(&format!("label {id:#04x}={text:?}\n"));
        }
        for (id, code) in &self.colors {
            out.push_str(&format!("color {id:#04x}={code}\n"));
        }
        out
    }
}

/// Factory-default name pattern observed on unprogrammed slots (§4.6.1,
/// scenario 3): `"Custom N"` for some N. The Mode Manager uses this to tag
/// a read result as an empty/factory slot.
pub fn is_factory_name(name: &str) -> bool {
    name.strip_prefix("Custom ")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(id: ControlId) -> ControlBinding {
        ControlBinding::new(id, ControlType::EncoderTop, 0, 1, 0, 127, Behaviour::Absolute).unwrap()
    }

    #[test]
    fn rejects_duplicate_control_id() {
        let err = CustomMode::new(0, "X", vec![enc(0x10), enc(0x10)], vec![], vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_label_without_control() {
        let err = CustomMode::new(0, "X", vec![], vec![(0x10, "Vol".into())], vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_name_length_zero_and_nineteen() {
        assert!(CustomMode::new(0, "", vec![], vec![], vec![]).is_err());
        assert!(CustomMode::new(0, "A".repeat(19), vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn accepts_empty_controls() {
        assert!(CustomMode::new(0, "Empty", vec![], vec![], vec![]).is_ok());
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let err = ControlBinding::new(0x10, ControlType::EncoderTop, 0, 1, 100, 10, Behaviour::Absolute);
        assert!(err.is_err());
    }

    #[test]
    fn factory_name_pattern() {
        assert!(is_factory_name("Custom 1"));
        assert!(is_factory_name("Custom 42"));
        assert!(!is_factory_name("CHANNEVE"));
        assert!(!is_factory_name("Custom"));
    }
}
