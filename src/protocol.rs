//! Real-time status stream framing
//!
//! The controller pushes status packets over a raw TCP stream:
//!
//! ```text
//! 0x5A 0x5A | reserved (1) | length L (u16 LE) | payload (L bytes) | checksum (u16 LE)
//! ```
//!
//! The checksum is the low 16 bits of the byte-sum of everything from the
//! sync marker through the end of the payload. Both the length and the
//! checksum are composed little-endian, exactly as the controller emits
//! them.
//!
//! [`FrameDecoder`] reassembles frames from arbitrarily chunked reads: a
//! partial header or body is buffered until more bytes arrive, and a
//! checksum mismatch resumes scanning right after the failed sync marker so
//! a corrupt packet never desynchronizes the frames behind it.

use crate::error::DecodeError;
use crate::state::{ArmMode, ArmState, CartesianVector, StatusFrame};
use tracing::warn;

pub const SYNC_BYTE: u8 = 0x5A;
/// Sync marker (2) + reserved byte (1) + length field (2).
pub const HEADER_LEN: usize = 5;
pub const CHECKSUM_LEN: usize = 2;
/// Fixed size of the status payload struct.
pub const STATUS_PAYLOAD_LEN: usize = 163;

// Payload field offsets (all little-endian).
const OFF_STATE: usize = 0;
const OFF_MODE: usize = 1;
const OFF_MOTION_DONE: usize = 2;
const OFF_COLLISION: usize = 3;
const OFF_EMERGENCY_STOP: usize = 4;
const OFF_MAIN_ERROR: usize = 5;
const OFF_SUB_ERROR: usize = 9;
const OFF_JOINT_POS: usize = 13;
const OFF_CARTESIAN: usize = 61;
const OFF_JOINT_TORQUE: usize = 109;
const OFF_DIGITAL_OUT_LOW: usize = 157;
const OFF_DIGITAL_OUT_HIGH: usize = 158;
const OFF_DIGITAL_IN_LOW: usize = 159;
const OFF_DIGITAL_IN_HIGH: usize = 160;
const OFF_TOOL_OUT: usize = 161;
const OFF_TOOL_IN: usize = 162;

/// Low 16 bits of the byte-sum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().map(|&b| b as u32).sum::<u32>() as u16
}

fn read_f64(p: &[u8], off: usize) -> f64 {
    f64::from_le_bytes([
        p[off],
        p[off + 1],
        p[off + 2],
        p[off + 3],
        p[off + 4],
        p[off + 5],
        p[off + 6],
        p[off + 7],
    ])
}

fn read_i32(p: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([p[off], p[off + 1], p[off + 2], p[off + 3]])
}

fn read_f64_block(p: &[u8], off: usize) -> [f64; 6] {
    let mut out = [0.0; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = read_f64(p, off + i * 8);
    }
    out
}

/// Decode one checksum-validated payload into a status frame.
pub fn decode_status(payload: &[u8]) -> Result<StatusFrame, DecodeError> {
    if payload.len() != STATUS_PAYLOAD_LEN {
        return Err(DecodeError::PayloadLength(payload.len()));
    }

    Ok(StatusFrame {
        state: ArmState::from_code(payload[OFF_STATE])?,
        mode: ArmMode::from_code(payload[OFF_MODE])?,
        motion_done: payload[OFF_MOTION_DONE] != 0,
        collision: payload[OFF_COLLISION] != 0,
        emergency_stop: payload[OFF_EMERGENCY_STOP] != 0,
        main_error: read_i32(payload, OFF_MAIN_ERROR),
        sub_error: read_i32(payload, OFF_SUB_ERROR),
        joint_positions: read_f64_block(payload, OFF_JOINT_POS),
        cartesian: CartesianVector::from_array(read_f64_block(payload, OFF_CARTESIAN)),
        joint_torques: read_f64_block(payload, OFF_JOINT_TORQUE),
        digital_output_low: payload[OFF_DIGITAL_OUT_LOW],
        digital_output_high: payload[OFF_DIGITAL_OUT_HIGH],
        digital_input_low: payload[OFF_DIGITAL_IN_LOW],
        digital_input_high: payload[OFF_DIGITAL_IN_HIGH],
        tool_output: payload[OFF_TOOL_OUT],
        tool_input: payload[OFF_TOOL_IN],
    })
}

/// Incremental frame decoder over a chunked byte stream.
///
/// Unconsumed bytes (a lone sync byte at a chunk boundary, a partial body)
/// persist across `feed` calls, so the decoded frame sequence is identical
/// no matter how the input is chunked.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Drop all buffered state, e.g. after a stream reconnect.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feed one chunk of stream bytes; returns every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StatusFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut pos = 0;
        while self.buf.len() - pos >= 2 {
            if self.buf[pos] != SYNC_BYTE || self.buf[pos + 1] != SYNC_BYTE {
                pos += 1;
                continue;
            }

            // Sync marker found; wait for the rest of the header.
            if self.buf.len() - pos < HEADER_LEN {
                break;
            }
            let len = u16::from_le_bytes([self.buf[pos + 3], self.buf[pos + 4]]) as usize;
            let total = HEADER_LEN + len + CHECKSUM_LEN;
            if self.buf.len() - pos < total {
                break;
            }

            let body_end = pos + HEADER_LEN + len;
            let expected = checksum(&self.buf[pos..body_end]);
            let received =
                u16::from_le_bytes([self.buf[body_end], self.buf[body_end + 1]]);
            if expected != received {
                warn!(
                    "status frame checksum mismatch (expected {:#06x}, got {:#06x}), resyncing",
                    expected, received
                );
                // Rescan from the byte after the failed marker, not past the
                // whole body; the real next frame may start inside it.
                pos += 2;
                continue;
            }

            match decode_status(&self.buf[pos + HEADER_LEN..body_end]) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("dropping undecodable status frame: {}", e),
            }
            pos += total;
        }

        self.buf.drain(..pos);
        frames
    }
}

#[cfg(test)]
pub(crate) fn encode_status(frame: &StatusFrame) -> Vec<u8> {
    fn state_code(state: ArmState) -> u8 {
        match state {
            ArmState::Stop => 1,
            ArmState::Run => 2,
            ArmState::Suspend => 3,
            ArmState::Drag => 4,
        }
    }

    let mut payload = vec![0u8; STATUS_PAYLOAD_LEN];
    payload[OFF_STATE] = state_code(frame.state);
    payload[OFF_MODE] = frame.mode.code() as u8;
    payload[OFF_MOTION_DONE] = frame.motion_done as u8;
    payload[OFF_COLLISION] = frame.collision as u8;
    payload[OFF_EMERGENCY_STOP] = frame.emergency_stop as u8;
    payload[OFF_MAIN_ERROR..OFF_MAIN_ERROR + 4].copy_from_slice(&frame.main_error.to_le_bytes());
    payload[OFF_SUB_ERROR..OFF_SUB_ERROR + 4].copy_from_slice(&frame.sub_error.to_le_bytes());
    for i in 0..6 {
        let o = OFF_JOINT_POS + i * 8;
        payload[o..o + 8].copy_from_slice(&frame.joint_positions[i].to_le_bytes());
        let o = OFF_CARTESIAN + i * 8;
        payload[o..o + 8].copy_from_slice(&frame.cartesian.to_array()[i].to_le_bytes());
        let o = OFF_JOINT_TORQUE + i * 8;
        payload[o..o + 8].copy_from_slice(&frame.joint_torques[i].to_le_bytes());
    }
    payload[OFF_DIGITAL_OUT_LOW] = frame.digital_output_low;
    payload[OFF_DIGITAL_OUT_HIGH] = frame.digital_output_high;
    payload[OFF_DIGITAL_IN_LOW] = frame.digital_input_low;
    payload[OFF_DIGITAL_IN_HIGH] = frame.digital_input_high;
    payload[OFF_TOOL_OUT] = frame.tool_output;
    payload[OFF_TOOL_IN] = frame.tool_input;

    encode_raw(&payload)
}

/// Wrap an arbitrary payload in sync/length/checksum framing.
#[cfg(test)]
pub(crate) fn encode_raw(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    bytes.push(SYNC_BYTE);
    bytes.push(SYNC_BYTE);
    bytes.push(0x00);
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    let sum = checksum(&bytes);
    bytes.extend_from_slice(&sum.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(y: f64) -> StatusFrame {
        StatusFrame {
            state: ArmState::Run,
            mode: ArmMode::Automatic,
            motion_done: true,
            joint_positions: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            cartesian: CartesianVector::from_array([200.0, y, 500.0, -90.0, 0.0, -45.0]),
            joint_torques: [0.5, 0.25, 0.125, 1.0, 2.0, 4.0],
            digital_output_low: 0x05,
            digital_input_low: 0x0F,
            tool_output: 0x01,
            ..Default::default()
        }
    }

    /// The test frames must not contain accidental sync markers, otherwise
    /// the resync assertions below would be testing the wrong thing.
    fn assert_single_marker(bytes: &[u8]) {
        let markers = bytes
            .windows(2)
            .filter(|w| w == &[SYNC_BYTE, SYNC_BYTE])
            .count();
        assert_eq!(markers, 1, "frame encoding contains stray sync markers");
    }

    #[test]
    fn test_roundtrip() {
        let frame = sample_frame(60.0);
        let bytes = encode_status(&frame);
        assert_single_marker(&bytes);
        assert_eq!(bytes.len(), HEADER_LEN + STATUS_PAYLOAD_LEN + CHECKSUM_LEN);

        let mut decoder = FrameDecoder::new();
        let decoded = decoder.feed(&bytes);
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn test_chunking_invariance() {
        let frames: Vec<StatusFrame> = (0..3).map(|i| sample_frame(10.0 * i as f64)).collect();
        let mut stream = Vec::new();
        for frame in &frames {
            stream.extend_from_slice(&encode_status(frame));
        }

        let mut whole = FrameDecoder::new();
        let all_at_once = whole.feed(&stream);

        let mut bytewise = FrameDecoder::new();
        let mut one_at_a_time = Vec::new();
        for &byte in &stream {
            one_at_a_time.extend(bytewise.feed(&[byte]));
        }

        assert_eq!(all_at_once, frames);
        assert_eq!(one_at_a_time, frames);
    }

    #[test]
    fn test_partial_feed_is_buffered() {
        let frame = sample_frame(42.0);
        let bytes = encode_status(&frame);

        let mut decoder = FrameDecoder::new();
        // Split right after the first sync byte, the worst case for the
        // lookahead in the seek phase.
        assert!(decoder.feed(&bytes[..1]).is_empty());
        assert!(decoder.feed(&bytes[1..4]).is_empty());
        assert_eq!(decoder.feed(&bytes[4..]), vec![frame]);
    }

    #[test]
    fn test_garbage_prefix_is_skipped() {
        let frame = sample_frame(7.0);
        let mut stream = vec![0x00, 0xFF, 0x5A, 0x01, 0x20];
        stream.extend_from_slice(&encode_status(&frame));

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(&stream), vec![frame]);
    }

    #[test]
    fn test_single_byte_corruption_never_cascades() {
        let bad = sample_frame(11.0);
        let good = sample_frame(99.0);
        let bad_bytes = encode_status(&bad);
        let good_bytes = encode_status(&good);
        assert_single_marker(&bad_bytes);

        for i in 0..STATUS_PAYLOAD_LEN {
            let mut stream = bad_bytes.clone();
            stream[HEADER_LEN + i] ^= 0xFF;
            stream.extend_from_slice(&good_bytes);

            let mut decoder = FrameDecoder::new();
            let decoded = decoder.feed(&stream);
            assert_eq!(
                decoded,
                vec![good.clone()],
                "corrupting payload byte {} must drop only the corrupt frame",
                i
            );
        }
    }

    #[test]
    fn test_invalid_state_code_drops_frame_only() {
        let mut payload = vec![0u8; STATUS_PAYLOAD_LEN];
        payload[0] = 9; // out-of-range robot state
        payload[1] = 0;
        let mut stream = encode_raw(&payload);

        let good = sample_frame(1.0);
        stream.extend_from_slice(&encode_status(&good));

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(&stream), vec![good]);
    }

    #[test]
    fn test_unexpected_payload_length_drops_frame_only() {
        let mut stream = encode_raw(&[1u8, 0, 0, 0]);
        let good = sample_frame(2.0);
        stream.extend_from_slice(&encode_status(&good));

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(&stream), vec![good]);
    }

    #[test]
    fn test_reset_discards_partial_body() {
        let frame = sample_frame(3.0);
        let bytes = encode_status(&frame);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&bytes[..40]).is_empty());
        decoder.reset();
        // The buffered partial body is gone; a fresh frame decodes cleanly.
        assert_eq!(decoder.feed(&bytes), vec![frame]);
    }

    #[test]
    fn test_checksum_is_low_16_bits_of_sum() {
        assert_eq!(checksum(&[0x5A, 0x5A]), 0xB4);
        // 300 * 0xFF = 76500 = 0x12AD4; only the low 16 bits survive
        assert_eq!(checksum(&[0xFF; 300]), 0x2AD4);
    }
}
