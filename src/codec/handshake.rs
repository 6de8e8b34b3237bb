//! The four handshake messages (§4.1.1-§4.1.4): Novation SYN/SYN-ACK and
//! Universal Device Inquiry/Reply. Kept in their own file the way the
//! teacher splits `command.rs` (outbound) from `event.rs` (inbound) by
//! direction, rather than lumping everything into one enum.

use crate::error::CodecError;
use crate::identity::DeviceIdentity;

use super::framing::EOX;

const SYN: [u8; 8] = [0xF0, 0x00, 0x20, 0x29, 0x00, 0x42, 0x02, 0xF7];
const SYN_ACK_SERIAL_LEN: usize = 14;
const UNIVERSAL_INQUIRY_BROADCAST_DEV_ID: u8 = 0x7F;

/// Builds the outbound Novation-SYN message (§4.1.1): always the same 8
/// bytes, so there is nothing to validate.
pub fn build_syn() -> [u8; 8] {
    SYN
}

/// Parses an inbound Novation-SYN-ACK (§4.1.2): the same prefix, `02`, a
/// 14-byte ASCII serial, then `F7`. Returns the serial number string.
pub fn decode_syn_ack(frame: &[u8]) -> Result<String, CodecError> {
    let expected_len = 4 + 1 + SYN_ACK_SERIAL_LEN + 1;
    if frame.len() != expected_len {
        return Err(CodecError::TruncatedMessage {
            expected: expected_len,
            got: frame.len(),
        });
    }
    if frame[..4] != [0xF0, 0x00, 0x20, 0x29] {
        return Err(CodecError::UnexpectedFraming("missing Novation prefix".into()));
    }
    if frame[4] != 0x02 {
        return Err(CodecError::UnknownCommand(frame[4..5].to_vec()));
    }
    if frame[frame.len() - 1] != EOX {
        return Err(CodecError::UnexpectedFraming("missing trailing F7".into()));
    }
    let serial_bytes = &frame[5..5 + SYN_ACK_SERIAL_LEN];
    if !serial_bytes.is_ascii() {
        return Err(CodecError::UnexpectedFraming("serial is not 7-bit ASCII".into()));
    }
    Ok(String::from_utf8_lossy(serial_bytes).into_owned())
}

/// Builds the outbound Universal Device Inquiry (§4.1.3). The device-id
/// byte is always broadcast (`7F`); this codec has no way to build any
/// other value, so the "reject on build-side validation" requirement is
/// satisfied by construction rather than a runtime check.
pub fn build_universal_inquiry() -> [u8; 6] {
    [0xF0, 0x7E, UNIVERSAL_INQUIRY_BROADCAST_DEV_ID, 0x06, 0x01, EOX]
}

/// Parses an inbound Device Identity Reply (§4.1.4, 17 bytes):
/// `F0 7E <devId> 06 02 <mfg triple> <productId x2> <family x2> <version x4> F7`.
pub fn decode_identity_reply(frame: &[u8]) -> Result<DeviceIdentity, CodecError> {
    const LEN: usize = 17;
    if frame.len() != LEN {
        return Err(CodecError::TruncatedMessage {
            expected: LEN,
            got: frame.len(),
        });
    }
    if frame[0] != 0xF0 || frame[1] != 0x7E {
        return Err(CodecError::UnexpectedFraming(
            "missing universal sysex prefix F0 7E".into(),
        ));
    }
    if frame[3] != 0x06 || frame[4] != 0x02 {
        return Err(CodecError::UnknownCommand(frame[3..5].to_vec()));
    }
    if frame[LEN - 1] != EOX {
        return Err(CodecError::UnexpectedFraming("missing trailing F7".into()));
    }
    let mfg = [frame[5], frame[6], frame[7]];
    let product = [frame[8], frame[9]];
    let family = [frame[10], frame[11]];
    let version = [frame[12], frame[13], frame[14], frame[15]];
    Ok(DeviceIdentity::new(mfg, product, family, version))
}

/// Classification used by the sequencer (§5, §9): is this data-pair frame
/// a SYN-ACK or an identity reply, without fully decoding/validating it.
pub(crate) fn sniff(frame: &[u8]) -> Option<HandshakeFrameKind> {
    if frame.len() == 4 + 1 + SYN_ACK_SERIAL_LEN + 1 && frame[..4] == [0xF0, 0x00, 0x20, 0x29] && frame[4] == 0x02 {
        Some(HandshakeFrameKind::SynAck)
    } else if frame.first() == Some(&0xF0) && frame.get(1) == Some(&0x7E) && frame.get(4) == Some(&0x02) {
        Some(HandshakeFrameKind::IdentityReply)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeFrameKind {
    SynAck,
    IdentityReply,
}
