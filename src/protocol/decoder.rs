//! Incremental frame decoder.
//!
//! Serial data arrives with no message boundaries, so the decoder is an explicit
//! state machine fed one byte at a time:
//! - `AwaitStart`: scanning for `0xAA`; anything else is line noise and is dropped
//! - `ReadLenHi` / `ReadLenLo`: the 16-bit big-endian payload length
//! - `ReadCmd`: the command byte
//! - `ReadPayload`: `remaining` payload bytes still expected
//! - `ReadChecksum`: the trailing CRC-8
//!
//! A checksum mismatch (or a declared length above the configured limit) never trusts the
//! header that produced it. The decoder drops back to `AwaitStart` and rescans every byte
//! of the rejected candidate after its start marker, so a real frame hidden behind a
//! truncated one is still found.
//!
//! A corrupted length byte that grows the declared length cannot be caught until enough
//! bytes arrive to fill it. On an idle line the decoder simply waits. Callers that know
//! their largest payload should set [`FrameDecoder::with_max_payload`] so such headers are
//! rejected on the spot.
//!
//! Chunked and byte-at-a-time input go through the same path:
//!
//! ```
//! use neural_link::protocol::{encode, FrameDecoder, FrameEvent};
//!
//! let bytes = encode(0x11, &[0x80, 0x00]).unwrap();
//! let mut decoder = FrameDecoder::new();
//!
//! let mut frames = Vec::new();
//! for &b in bytes.iter() {
//!     if let FrameEvent::FrameReady(frame) = decoder.feed(b) {
//!         frames.push(frame);
//!     }
//! }
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), &[0x80, 0x00]);
//! ```

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use super::checksum::Crc8;
use super::frame::Frame;
use super::wire_format::{Header, MAX_PAYLOAD_SIZE, START_MARKER};

/// Outcome of feeding input to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// More bytes are needed.
    Incomplete,
    /// A complete frame passed its checksum.
    FrameReady(Frame),
    /// A frame failed its checksum and was dropped.
    Corrupt,
}

/// Parser position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStart,
    ReadLenHi,
    ReadLenLo { hi: u8 },
    ReadCmd { length: u16 },
    ReadPayload {
        length: u16,
        command: u8,
        remaining: u16,
    },
    ReadChecksum { length: u16, command: u8 },
}

/// Running counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed the checksum.
    pub frames: u64,
    /// Frames rejected by the checksum.
    pub corrupt: u64,
    /// Headers rejected for declaring more than `max_payload` bytes.
    pub oversized: u64,
    /// Noise bytes dropped while scanning for a start marker.
    pub discarded: u64,
}

/// Byte-stream to frame decoder.
pub struct FrameDecoder {
    /// Current parsing state.
    state: State,
    /// Raw bytes of the current candidate, after its start marker.
    candidate: BytesMut,
    /// Running checksum over the candidate.
    crc: Crc8,
    /// Bytes from a rejected candidate waiting to be rescanned.
    replay: VecDeque<u8>,
    /// Events not yet handed to the caller.
    events: VecDeque<FrameEvent>,
    /// Largest payload length accepted from a header.
    max_payload: u16,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a decoder that accepts any 16-bit payload length.
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE as u16)
    }

    /// Create a decoder that rejects headers declaring more than `max_payload` bytes.
    ///
    /// A tight limit lets the decoder recover from a garbled length immediately
    /// instead of swallowing up to 64 KiB before the checksum gives it away.
    pub fn with_max_payload(max_payload: u16) -> Self {
        Self {
            state: State::AwaitStart,
            candidate: BytesMut::with_capacity(256),
            crc: Crc8::new(),
            replay: VecDeque::new(),
            events: VecDeque::new(),
            max_payload,
            stats: DecoderStats::default(),
        }
    }

    /// Feed a single byte.
    ///
    /// Returns the oldest pending event. Rescanning a rejected candidate can complete
    /// more than one frame from a single byte; the extras stay queued for
    /// [`next_event`](Self::next_event) or the next call.
    pub fn feed(&mut self, byte: u8) -> FrameEvent {
        self.process(byte);
        self.events.pop_front().unwrap_or(FrameEvent::Incomplete)
    }

    /// Pop a queued event, if any.
    pub fn next_event(&mut self) -> Option<FrameEvent> {
        self.events.pop_front()
    }

    /// Push a chunk of bytes and collect every event it completes.
    ///
    /// `Incomplete` is never included in the result.
    pub fn push(&mut self, data: &[u8]) -> Vec<FrameEvent> {
        for &b in data {
            self.process(b);
        }
        self.events.drain(..).collect()
    }

    /// Drop any partial frame and queued events.
    pub fn reset(&mut self) {
        self.state = State::AwaitStart;
        self.candidate.clear();
        self.replay.clear();
        self.events.clear();
    }

    /// Whether the decoder sits between frames.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitStart && self.events.is_empty()
    }

    /// Running counters.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn process(&mut self, byte: u8) {
        self.step(byte);
        while let Some(b) = self.replay.pop_front() {
            self.step(b);
        }
    }

    fn step(&mut self, byte: u8) {
        if self.state == State::AwaitStart {
            if byte == START_MARKER {
                self.candidate.clear();
                self.crc = Crc8::new();
                self.state = State::ReadLenHi;
            } else {
                self.stats.discarded += 1;
            }
            return;
        }

        self.candidate.extend_from_slice(&[byte]);

        let state = self.state;
        self.state = match state {
            State::AwaitStart => State::AwaitStart,
            State::ReadLenHi => {
                self.crc.update(byte);
                State::ReadLenLo { hi: byte }
            }
            State::ReadLenLo { hi } => {
                self.crc.update(byte);
                let length = u16::from_be_bytes([hi, byte]);
                if length > self.max_payload {
                    self.stats.oversized += 1;
                    tracing::debug!("Header declares {} byte payload, resyncing", length);
                    self.resync();
                    return;
                }
                State::ReadCmd { length }
            }
            State::ReadCmd { length } => {
                self.crc.update(byte);
                if length == 0 {
                    State::ReadChecksum {
                        length,
                        command: byte,
                    }
                } else {
                    State::ReadPayload {
                        length,
                        command: byte,
                        remaining: length,
                    }
                }
            }
            State::ReadPayload {
                length,
                command,
                remaining,
            } => {
                self.crc.update(byte);
                if remaining > 1 {
                    State::ReadPayload {
                        length,
                        command,
                        remaining: remaining - 1,
                    }
                } else {
                    State::ReadChecksum { length, command }
                }
            }
            State::ReadChecksum { length, command } => {
                if self.crc.finish() == byte {
                    self.complete(Header::new(command, length), byte);
                } else {
                    self.stats.corrupt += 1;
                    self.events.push_back(FrameEvent::Corrupt);
                    self.resync();
                }
                return;
            }
        };
    }

    fn complete(&mut self, header: Header, checksum: u8) {
        // Candidate layout: len_hi, len_lo, command, payload..., checksum
        let mut raw = self.candidate.split();
        raw.advance(3);
        raw.truncate(header.payload_length as usize);

        self.stats.frames += 1;
        self.events
            .push_back(FrameEvent::FrameReady(Frame::verified(header, raw.freeze(), checksum)));
        self.state = State::AwaitStart;
    }

    /// Abandon the candidate and queue its bytes for rescanning.
    fn resync(&mut self) {
        self.state = State::AwaitStart;
        let rejected = self.candidate.split();
        for &b in rejected.iter().rev() {
            self.replay.push_front(b);
        }
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitStart => "AwaitStart",
            State::ReadLenHi => "ReadLenHi",
            State::ReadLenLo { .. } => "ReadLenLo",
            State::ReadCmd { .. } => "ReadCmd",
            State::ReadPayload { .. } => "ReadPayload",
            State::ReadChecksum { .. } => "ReadChecksum",
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
