//! Transport Adapter (C3), re-grounded on `midir` named MIDI ports instead
//! of the teacher's raw-USB `nusb::io::{EndpointRead,EndpointWrite}`
//! (`automap/device.rs`): this device appears as two ordinary OS MIDI port
//! pairs (§6), not a vendor USB interface. The connect/callback/channel
//! shape follows `dataO1-Mesh/crates/mesh-midi`'s
//! `midi::connection::MidiConnection` and `midi::input::MidiInputHandler`.

use log::{debug, trace, warn};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::error::TransportError;

/// Which logical port pair a frame was sent on or arrived from (§4.3,
/// §6): the data pair carries custom-mode traffic and the universal
/// inquiry; the control pair carries slot selection and feature enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pair {
    Data,
    Control,
}

/// The two named-port names for one logical pair (§6: "addressed by name
/// strings supplied by the caller").
#[derive(Debug, Clone)]
pub struct PortNames {
    pub output: String,
    pub input: String,
}

/// Both port pairs' names, supplied by the caller at connect time.
#[derive(Debug, Clone)]
pub struct DriverPorts {
    pub data: PortNames,
    pub control: PortNames,
}

/// One complete inbound frame, tagged with which pair it arrived on. For
/// the data pair this is always a full `F0..F7` SysEx message; for the
/// control pair it is the port's natural 1-3 byte message.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub pair: Pair,
    pub bytes: Vec<u8>,
}

/// Re-assembles SysEx frames that arrive split across multiple backend
/// callbacks. Most backends deliver one complete `F0..F7` per callback;
/// this buffers defensively when one does not end in `F7`, matching
/// SPEC_FULL §4.3's note on chunked callbacks.
#[derive(Default)]
struct FrameReassembler {
    pending: Vec<u8>,
}

impl FrameReassembler {
    /// Feeds a raw callback payload, returning zero or more complete
    /// frames. Short (non-SysEx) control-port messages never need
    /// reassembly and are expected to be fed one at a time.
    fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        if self.pending.is_empty() && chunk.first() == Some(&0xF0) && chunk.last() == Some(&0xF7) {
            return vec![chunk.to_vec()];
        }
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == 0xF7) {
            out.push(self.pending[..=end].to_vec());
            self.pending.drain(..=end);
        }
        if !out.is_empty() {
            trace!("reassembled {} SysEx frame(s) across chunked callbacks", out.len());
        }
        out
    }
}

/// An opened output half of one port pair.
pub struct OutputHandle {
    name: String,
    conn: MidiOutputConnection,
}

impl OutputHandle {
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.conn
            .send(bytes)
            .map_err(|e| TransportError::SendFailed(format!("{} ({e})", self.name)))
    }

    /// Explicitly closes the underlying MIDI output connection (§4.3:
    /// "close(handle)") rather than relying solely on its `Drop` impl.
    fn close(self) {
        let _ = self.conn.close();
        debug!("closed MIDI output port {:?}", self.name);
    }
}

/// An opened input half of one port pair. Kept alive for as long as the
/// caller wants inbound delivery.
pub struct InputHandle {
    name: String,
    conn: MidiInputConnection<()>,
}

impl InputHandle {
    /// Explicitly closes the underlying MIDI input connection (§4.3:
    /// "close(handle)") rather than relying solely on its `Drop` impl.
    fn close(self) {
        let _ = self.conn.close();
        debug!("closed MIDI input port {:?}", self.name);
    }
}

/// Opens a named output port by exact name, mirroring
/// `mesh-midi::MidiConnection::try_connect_output`'s name-match-then-open
/// shape.
fn open_output(client_name: &str, port_name: &str) -> Result<OutputHandle, TransportError> {
    let midi_out = MidiOutput::new(client_name)
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    let port = midi_out
        .ports()
        .into_iter()
        .find(|p| midi_out.port_name(p).map(|n| n == port_name).unwrap_or(false))
        .ok_or_else(|| TransportError::PortNotFound(port_name.to_string()))?;
    let conn = midi_out
        .connect(&port, port_name)
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    debug!("opened MIDI output port {port_name:?}");
    Ok(OutputHandle {
        name: port_name.to_string(),
        conn,
    })
}

/// Opens a named input port and forwards every received frame, tagged
/// with `pair`, onto `frame_tx`. Overflow on the bounded channel drops the
/// frame and logs a warning (§5).
fn open_input(
    client_name: &str,
    port_name: &str,
    pair: Pair,
    frame_tx: flume::Sender<InboundFrame>,
) -> Result<InputHandle, TransportError> {
    let midi_in = MidiInput::new(client_name).map_err(|e| TransportError::SendFailed(e.to_string()))?;
    let port = midi_in
        .ports()
        .into_iter()
        .find(|p| midi_in.port_name(p).map(|n| n == port_name).unwrap_or(false))
        .ok_or_else(|| TransportError::PortNotFound(port_name.to_string()))?;

    let mut reassembler = FrameReassembler::default();
    let owned_name = port_name.to_string();
    let conn = midi_in
        .connect(
            &port,
            port_name,
            move |_stamp, message, ()| {
                for frame in reassembler.feed(message) {
                    let inbound = InboundFrame { pair, bytes: frame };
                    if frame_tx.try_send(inbound).is_err() {
                        warn!("dropping inbound frame from {owned_name:?}: sequencer queue full");
                    }
                }
            },
            (),
        )
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    debug!("opened MIDI input port {port_name:?} ({pair:?})");
    Ok(InputHandle {
        name: port_name.to_string(),
        conn,
    })
}

/// Owns both port pairs' output handles and keeps both input connections
/// alive, exactly as the teacher's `AutomapDevice` owns one USB reader and
/// writer pair — generalized from one device endpoint to two named MIDI
/// port pairs.
pub struct MidiTransport {
    data_out: OutputHandle,
    control_out: OutputHandle,
    data_in: InputHandle,
    control_in: InputHandle,
}

impl MidiTransport {
    /// Opens both pairs. `client_name` is the name this process registers
    /// under with the OS MIDI subsystem (distinct from the device's own
    /// port names in `ports`). There is no separate `open_output`/
    /// `open_input` pair of operations: the sequencer always wants both
    /// pairs up before it starts draining frames, so opening is one atomic
    /// step rather than four independently callable ones.
    pub fn connect(
        client_name: &str,
        ports: &DriverPorts,
        frame_tx: flume::Sender<InboundFrame>,
    ) -> Result<Self, TransportError> {
        let data_out = open_output(client_name, &ports.data.output)?;
        let control_out = open_output(client_name, &ports.control.output)?;
        let data_in = open_input(client_name, &ports.data.input, Pair::Data, frame_tx.clone())?;
        let control_in = open_input(client_name, &ports.control.input, Pair::Control, frame_tx)?;
        Ok(MidiTransport {
            data_out,
            control_out,
            data_in,
            control_in,
        })
    }

    /// Sends on the named pair. The sequencer is the only caller of this
    /// method (§5: "only the sequencer sends").
    pub fn send(&mut self, pair: Pair, bytes: &[u8]) -> Result<(), TransportError> {
        match pair {
            Pair::Data => self.data_out.send(bytes),
            Pair::Control => self.control_out.send(bytes),
        }
    }

    /// Closes all four port connections (§4.3: "close(handle)"). Called by
    /// the sequencer once it stops draining frames, so the OS MIDI ports
    /// are released deterministically rather than whenever `Drop` happens
    /// to run.
    pub fn close(self) {
        self.data_out.close();
        self.control_out.close();
        self.data_in.close();
        self.control_in.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembler_passes_through_complete_frames() {
        let mut r = FrameReassembler::default();
        let frames = r.feed(&[0xF0, 0x00, 0x20, 0x29, 0xF7]);
        assert_eq!(frames, vec![vec![0xF0, 0x00, 0x20, 0x29, 0xF7]]);
        assert!(r.pending.is_empty());
    }

    #[test]
    fn reassembler_buffers_split_frame() {
        let mut r = FrameReassembler::default();
        assert!(r.feed(&[0xF0, 0x00, 0x20]).is_empty());
        let frames = r.feed(&[0x29, 0xF7]);
        assert_eq!(frames, vec![vec![0xF0, 0x00, 0x20, 0x29, 0xF7]]);
    }

    #[test]
    fn reassembler_handles_two_frames_in_one_chunk() {
        let mut r = FrameReassembler::default();
        let frames = r.feed(&[0xF0, 0x01, 0xF7, 0xF0, 0x02, 0xF7]);
        assert_eq!(frames, vec![vec![0xF0, 0x01, 0xF7], vec![0xF0, 0x02, 0xF7]]);
    }
}
