//! Binary framing protocol.
//!
//! A frame starts with a one-byte fixed header (high nibble: client type,
//! low nibble: category) followed by a category-specific tail:
//! - PING: nothing.
//! - GROUPACK / ACCEPT: 8-byte message id.
//! - JOIN / LEAVE: topic header (from/to).
//! - ONE / GROUP / ONLINE: topic header, message body, 8-byte CRC slot
//!   carrying the timestamp.
//!
//! All integers are big-endian. Parsers never index raw buffers and never
//! panic on hostile input.

pub mod category;
pub mod decoder;
pub mod encoder;
pub mod message;

pub use category::ProtocolCategory;
pub use decoder::{Checkpoint, Decoded, DecoderLimits, FrameDecoder};
pub use encoder::{encode, encode_to_bytes};
pub use message::{AckMessage, MessageBody, OfflineMessage, Payload, TransportMessage};
