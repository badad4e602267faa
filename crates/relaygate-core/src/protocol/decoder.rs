//! Resumable frame decoder.
//!
//! Parsing rules:
//! - Every state consumes exactly the bytes it needs, once. When they are not
//!   buffered yet the decoder returns without side effects and resumes from
//!   the same checkpoint on the next `feed`.
//! - Length prefixes are checked against `DecoderLimits` before anything is
//!   allocated for them. A rejected frame is skipped to its announced end,
//!   so its payload is never read as headers.
//! - Never index (`buf[0]`): always `Buf` with `remaining()` checks.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{RelayError, Result};
use crate::protocol::category::ProtocolCategory;
use crate::protocol::message::{MessageBody, TransportMessage};

/// Default upper bound for a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

const ACK_LEN: usize = 8;
const TOPIC_LENGTHS_LEN: usize = 2;
const BODY_HEADER_LEN: usize = 8 + 4 + 2;
const CRC_LEN: usize = 8;

/// Bounds applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Largest frame accepted, fixed header and CRC included.
    pub max_frame_bytes: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Public view of the decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    FixedHeader,
    AckBody,
    TopicLengths,
    TopicNames,
    MessageBody,
    MessageText,
    Crc,
    /// Dropping the remainder of a rejected frame.
    Skip,
}

/// Frame being assembled.
#[derive(Debug, Clone, Copy)]
struct Pending {
    category: ProtocolCategory,
    client_type: u8,
    /// Bytes accounted to this frame so far, including announced lengths.
    size: usize,
}

impl Pending {
    fn reserve(&mut self, field: &'static str, len: usize, limits: &DecoderLimits) -> Result<()> {
        let next = self.size.saturating_add(len);
        if next > limits.max_frame_bytes {
            return Err(RelayError::FrameTooLarge {
                field,
                len: next,
                max: limits.max_frame_bytes,
            });
        }
        self.size = next;
        Ok(())
    }
}

#[derive(Debug)]
enum State {
    FixedHeader,
    AckBody {
        frame: Pending,
    },
    TopicLengths {
        frame: Pending,
    },
    TopicNames {
        frame: Pending,
        from_len: usize,
        to_len: usize,
    },
    MessageBody {
        frame: Pending,
        from: Bytes,
        to: Bytes,
    },
    MessageText {
        frame: Pending,
        from: Bytes,
        to: Bytes,
        message_id: u64,
        body_len: usize,
        additional_len: usize,
    },
    Crc {
        frame: Pending,
        from: Bytes,
        to: Bytes,
        message_id: u64,
        body: Bytes,
        additional: Bytes,
    },
    Skip {
        remaining: usize,
    },
}

enum Step {
    Emit(TransportMessage),
    Continue(State),
    NeedMore(State),
}

/// Per-connection decoder: one byte stream, one cursor.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    state: State,
    limits: DecoderLimits,
    skipped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DecoderLimits::default())
    }
}

impl FrameDecoder {
    pub fn new(limits: DecoderLimits) -> Self {
        Self {
            buf: BytesMut::new(),
            state: State::FixedHeader,
            limits,
            skipped: 0,
        }
    }

    /// Append `bytes` and return the messages that became complete.
    ///
    /// The iterator is lazy: frames are parsed as it is advanced. Dropping it
    /// early keeps the remaining bytes buffered for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Decoded<'_> {
        self.buf.extend_from_slice(bytes);
        Decoded {
            decoder: self,
            done: false,
        }
    }

    /// Parse at most one message from the buffered bytes.
    ///
    /// `Ok(None)` means more input is required. On `Err` the rejected frame
    /// is dropped: bytes already read are gone and the rest of its announced
    /// length is discarded as it arrives, then the decoder expects a header.
    pub fn decode_next(&mut self) -> Result<Option<TransportMessage>> {
        loop {
            let state = std::mem::replace(&mut self.state, State::FixedHeader);
            match self.step(state)? {
                Step::Emit(msg) => return Ok(Some(msg)),
                Step::Continue(next) => self.state = next,
                Step::NeedMore(same) => {
                    self.state = same;
                    return Ok(None);
                }
            }
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        match self.state {
            State::FixedHeader => Checkpoint::FixedHeader,
            State::AckBody { .. } => Checkpoint::AckBody,
            State::TopicLengths { .. } => Checkpoint::TopicLengths,
            State::TopicNames { .. } => Checkpoint::TopicNames,
            State::MessageBody { .. } => Checkpoint::MessageBody,
            State::MessageText { .. } => Checkpoint::MessageText,
            State::Crc { .. } => Checkpoint::Crc,
            State::Skip { .. } => Checkpoint::Skip,
        }
    }

    /// Bytes received but not yet consumed by any state.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Header bytes dropped because their category was not recognised.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    fn step(&mut self, state: State) -> Result<Step> {
        match state {
            State::FixedHeader => {
                if self.buf.remaining() < 1 {
                    return Ok(Step::NeedMore(State::FixedHeader));
                }
                let header = self.buf.get_u8();
                let (client_type, category) = ProtocolCategory::from_header(header);
                let frame = Pending {
                    category,
                    client_type,
                    size: 1,
                };
                match category {
                    ProtocolCategory::Ping => Ok(Step::Emit(TransportMessage::ping(client_type))),
                    ProtocolCategory::Unknown(code) => {
                        self.skipped += 1;
                        tracing::debug!(header, code, "unknown frame category, resyncing");
                        Ok(Step::Continue(State::FixedHeader))
                    }
                    c if c.is_ack() => Ok(Step::Continue(State::AckBody { frame })),
                    _ => Ok(Step::Continue(State::TopicLengths { frame })),
                }
            }

            State::AckBody { frame } => {
                if self.buf.remaining() < ACK_LEN {
                    return Ok(Step::NeedMore(State::AckBody { frame }));
                }
                let message_id = self.buf.get_u64();
                Ok(Step::Emit(TransportMessage::ack(
                    frame.category,
                    frame.client_type,
                    message_id,
                )))
            }

            State::TopicLengths { mut frame } => {
                if self.buf.remaining() < TOPIC_LENGTHS_LEN {
                    return Ok(Step::NeedMore(State::TopicLengths { frame }));
                }
                let from_len = self.buf.get_u8() as usize;
                let to_len = self.buf.get_u8() as usize;
                let announced = TOPIC_LENGTHS_LEN + from_len + to_len;
                if let Err(e) = frame.reserve("topic", announced, &self.limits) {
                    return self.reject(e, from_len + to_len);
                }
                Ok(Step::Continue(State::TopicNames {
                    frame,
                    from_len,
                    to_len,
                }))
            }

            State::TopicNames {
                frame,
                from_len,
                to_len,
            } => {
                if self.buf.remaining() < from_len + to_len {
                    return Ok(Step::NeedMore(State::TopicNames {
                        frame,
                        from_len,
                        to_len,
                    }));
                }
                let from = self.buf.split_to(from_len).freeze();
                let to = self.buf.split_to(to_len).freeze();

                if frame.category.topic_only() {
                    let msg = match (text(&from), text(&to)) {
                        (Some(from), Some(to)) => TransportMessage::body(
                            frame.category,
                            frame.client_type,
                            MessageBody::topic(from, to),
                        ),
                        _ => discard(&frame),
                    };
                    return Ok(Step::Emit(msg));
                }
                Ok(Step::Continue(State::MessageBody { frame, from, to }))
            }

            State::MessageBody {
                mut frame,
                from,
                to,
            } => {
                if self.buf.remaining() < BODY_HEADER_LEN {
                    return Ok(Step::NeedMore(State::MessageBody { frame, from, to }));
                }
                let message_id = self.buf.get_u64();
                let body_len = self.buf.get_u32() as usize;
                let additional_len = self.buf.get_u16() as usize;
                let tail = body_len.saturating_add(additional_len).saturating_add(CRC_LEN);
                let announced = BODY_HEADER_LEN.saturating_add(tail);
                if let Err(e) = frame.reserve("message body", announced, &self.limits) {
                    return self.reject(e, tail);
                }
                Ok(Step::Continue(State::MessageText {
                    frame,
                    from,
                    to,
                    message_id,
                    body_len,
                    additional_len,
                }))
            }

            State::MessageText {
                frame,
                from,
                to,
                message_id,
                body_len,
                additional_len,
            } => {
                if self.buf.remaining() < body_len + additional_len {
                    return Ok(Step::NeedMore(State::MessageText {
                        frame,
                        from,
                        to,
                        message_id,
                        body_len,
                        additional_len,
                    }));
                }
                let body = self.buf.split_to(body_len).freeze();
                let additional = self.buf.split_to(additional_len).freeze();
                Ok(Step::Continue(State::Crc {
                    frame,
                    from,
                    to,
                    message_id,
                    body,
                    additional,
                }))
            }

            State::Crc {
                frame,
                from,
                to,
                message_id,
                body,
                additional,
            } => {
                if self.buf.remaining() < CRC_LEN {
                    return Ok(Step::NeedMore(State::Crc {
                        frame,
                        from,
                        to,
                        message_id,
                        body,
                        additional,
                    }));
                }
                let timestamp = self.buf.get_u64();
                let msg = match (text(&from), text(&to), text(&body), text(&additional)) {
                    (Some(from), Some(to), Some(body), Some(additional)) => TransportMessage::body(
                        frame.category,
                        frame.client_type,
                        MessageBody {
                            from,
                            to,
                            message_id,
                            body,
                            additional,
                            timestamp,
                        },
                    ),
                    _ => discard(&frame),
                };
                Ok(Step::Emit(msg))
            }

            State::Skip { remaining } => {
                let n = remaining.min(self.buf.remaining());
                self.buf.advance(n);
                match remaining - n {
                    0 => Ok(Step::Continue(State::FixedHeader)),
                    left => Ok(Step::NeedMore(State::Skip { remaining: left })),
                }
            }
        }
    }

    /// Fail the current frame and skip the `remaining` bytes it announced.
    fn reject(&mut self, err: RelayError, remaining: usize) -> Result<Step> {
        tracing::debug!(error = %err, remaining, "frame rejected, skipping its payload");
        self.state = State::Skip { remaining };
        Err(err)
    }
}

fn text(raw: &Bytes) -> Option<String> {
    std::str::from_utf8(raw).ok().map(str::to_owned)
}

fn discard(frame: &Pending) -> TransportMessage {
    tracing::debug!(category = %frame.category, "frame text is not utf-8, discarding");
    TransportMessage::discarded(frame.category, frame.client_type)
}

/// Lazy sequence of messages produced by one `feed`.
pub struct Decoded<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Decoded<'_> {
    type Item = Result<TransportMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode_next() {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::encoder::encode_to_bytes;

    fn one() -> TransportMessage {
        TransportMessage::body(
            ProtocolCategory::One,
            0,
            MessageBody {
                from: "u1".into(),
                to: "u2".into(),
                message_id: 42,
                body: "hi".into(),
                additional: String::new(),
                timestamp: 1000,
            },
        )
    }

    #[test]
    fn checkpoints_follow_the_frame() {
        let raw = encode_to_bytes(&one()).unwrap();
        let mut dec = FrameDecoder::default();

        assert_eq!(dec.feed(&raw[..1]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::TopicLengths);

        assert_eq!(dec.feed(&raw[1..3]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::TopicNames);

        assert_eq!(dec.feed(&raw[3..7]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::MessageBody);

        assert_eq!(dec.feed(&raw[7..21]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::MessageText);

        assert_eq!(dec.feed(&raw[21..23]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::Crc);
        assert_eq!(dec.buffered(), 0);

        let out: Vec<_> = dec.feed(&raw[23..]).collect::<Result<_>>().unwrap();
        assert_eq!(out, vec![one()]);
        assert_eq!(dec.checkpoint(), Checkpoint::FixedHeader);
    }

    #[test]
    fn partial_state_consumes_nothing() {
        let raw = encode_to_bytes(&one()).unwrap();
        let mut dec = FrameDecoder::default();
        assert_eq!(dec.feed(&raw[..8]).count(), 0);
        // MessageBody needs 14 bytes; the single byte past the topic stays buffered.
        assert_eq!(dec.checkpoint(), Checkpoint::MessageBody);
        assert_eq!(dec.buffered(), 1);
    }

    #[test]
    fn oversized_topic_is_rejected_before_allocation() {
        let mut dec = FrameDecoder::new(DecoderLimits { max_frame_bytes: 16 });
        let mut it = dec.feed(&[ProtocolCategory::Join.header(0), 200, 200]);
        let err = it.next().unwrap().unwrap_err();
        assert!(matches!(err, RelayError::FrameTooLarge { field: "topic", .. }));
        assert!(it.next().is_none());
        assert_eq!(dec.checkpoint(), Checkpoint::Skip);
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn rejected_topic_names_are_skipped_across_feeds() {
        let mut dec = FrameDecoder::new(DecoderLimits { max_frame_bytes: 16 });
        let mut it = dec.feed(&[ProtocolCategory::Join.header(0), 10, 10]);
        assert!(it.next().unwrap().is_err());
        drop(it);

        // 20 announced name bytes, all of them valid PING headers
        assert_eq!(dec.feed(&[0x01; 12]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::Skip);
        assert_eq!(dec.feed(&[0x01; 8]).count(), 0);
        assert_eq!(dec.checkpoint(), Checkpoint::FixedHeader);

        let out: Vec<_> = dec.feed(&[0x01]).collect::<Result<_>>().unwrap();
        assert_eq!(out, vec![TransportMessage::ping(0)]);
    }

    #[test]
    fn invalid_utf8_yields_discard_sentinel() {
        let mut dec = FrameDecoder::default();
        let frame = [ProtocolCategory::Leave.header(2), 1, 1, 0xFF, b'r'];
        let out: Vec<_> = dec.feed(&frame).collect::<Result<_>>().unwrap();
        assert_eq!(out, vec![TransportMessage::discarded(ProtocolCategory::Leave, 2)]);
        assert_eq!(dec.checkpoint(), Checkpoint::FixedHeader);
    }
}
