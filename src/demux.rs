//! Decoder for the container-exec multiplexed output stream.
//!
//! Each frame is an 8-byte header followed by a payload: byte 0 is the
//! stream kind (1 = stdout, 2 = stderr), bytes `[4..8)` are a big-endian
//! `u32` payload length. This implementation merges both kinds into one
//! byte stream, matching the engine's policy of reporting combined output
//! under either `stdout` or `stderr` depending on exit status (see
//! `crate::engine`). Truncated trailing bytes are silently dropped rather
//! than treated as an error — a container can be killed mid-frame and the
//! caller still wants whatever was fully received.

const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    ReadHeader,
    ReadPayload { remaining: usize },
    Done,
}

/// Concatenate every complete frame's payload bytes found in `raw`.
///
/// A dropped trailing partial frame (too few header bytes, or a header
/// whose declared length runs past the end of `raw`) is not an error: the
/// function simply stops at the last complete frame.
pub fn decode_frames(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut state = DemuxState::ReadHeader;

    loop {
        state = match state {
            DemuxState::ReadHeader => {
                if cursor + HEADER_LEN > raw.len() {
                    DemuxState::Done
                } else {
                    let len_bytes = [
                        raw[cursor + 4],
                        raw[cursor + 5],
                        raw[cursor + 6],
                        raw[cursor + 7],
                    ];
                    let frame_len = u32::from_be_bytes(len_bytes) as usize;
                    cursor += HEADER_LEN;
                    DemuxState::ReadPayload {
                        remaining: frame_len,
                    }
                }
            }
            DemuxState::ReadPayload { remaining } => {
                if cursor + remaining > raw.len() {
                    DemuxState::Done
                } else {
                    out.extend_from_slice(&raw[cursor..cursor + remaining]);
                    cursor += remaining;
                    DemuxState::ReadHeader
                }
            }
            DemuxState::Done => break,
        };
    }

    out
}

/// Decode the framed stream into trimmed UTF-8 text.
///
/// Invalid UTF-8 is replaced lossily rather than rejected — the stream can
/// legitimately contain binary output from a misbehaving fragment, and the
/// contract only promises *some* text back, not a guarantee of losslessness.
pub fn decode_exec_stream(raw: &[u8]) -> String {
    let bytes = decode_frames(raw);
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Reframe a demultiplexed chunk (as handed back by a Docker client that
/// already split stdout/stderr) into the documented wire format, so that
/// [`decode_exec_stream`] remains the single source of truth for decoding
/// regardless of which client produced the bytes.
pub fn frame(stream_kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
    framed.push(stream_kind);
    framed.extend_from_slice(&[0, 0, 0]);
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_raw(kind: u8, payload: &[u8]) -> Vec<u8> {
        frame(kind, payload)
    }

    #[test]
    fn single_stdout_frame() {
        let raw = frame_raw(1, b"hello");
        assert_eq!(decode_exec_stream(&raw), "hello");
    }

    #[test]
    fn interleaved_stdout_and_stderr_merge() {
        let mut raw = frame_raw(1, b"out-1 ");
        raw.extend(frame_raw(2, b"err-1 "));
        raw.extend(frame_raw(1, b"out-2"));
        assert_eq!(decode_exec_stream(&raw), "out-1 err-1 out-2");
    }

    #[test]
    fn zero_length_frame_contributes_nothing() {
        let mut raw = frame_raw(1, b"");
        raw.extend(frame_raw(1, b"after"));
        assert_eq!(decode_exec_stream(&raw), "after");
    }

    #[test]
    fn truncated_header_is_dropped_silently() {
        let mut raw = frame_raw(1, b"complete");
        raw.extend_from_slice(&[1, 0, 0]); // only 3 of 8 header bytes
        assert_eq!(decode_exec_stream(&raw), "complete");
    }

    #[test]
    fn truncated_payload_is_dropped_silently() {
        let mut raw = frame_raw(1, b"complete");
        let mut partial = frame_raw(1, b"1234567890");
        partial.truncate(HEADER_LEN + 3); // header claims 10 bytes, only 3 present
        raw.extend(partial);
        assert_eq!(decode_exec_stream(&raw), "complete");
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let raw = frame_raw(1, b"hello\n\n  ");
        assert_eq!(decode_exec_stream(&raw), "hello");
    }

    #[test]
    fn empty_input_decodes_to_empty_string() {
        assert_eq!(decode_exec_stream(&[]), "");
    }
}
