//! Frame encoder, symmetric with [`FrameDecoder`](super::decoder::FrameDecoder).
//!
//! Used for outbound delivery and for serializing offline records.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{RelayError, Result};
use crate::protocol::category::ProtocolCategory;
use crate::protocol::message::{MessageBody, Payload, TransportMessage};

/// Encode `msg` into `dst`.
///
/// Nothing is written when the message cannot be represented on the wire
/// (discard sentinel, unknown category, payload mismatch, oversized field).
pub fn encode(msg: &TransportMessage, dst: &mut impl BufMut) -> Result<()> {
    if msg.discard {
        return Err(RelayError::Framing("discard sentinel has no wire form".into()));
    }
    let header = msg.category.header(msg.client_type);

    match (msg.category, &msg.payload) {
        (ProtocolCategory::Ping, Payload::None) => {
            dst.put_u8(header);
        }
        (c, Payload::Ack(ack)) if c.is_ack() => {
            dst.put_u8(header);
            dst.put_u64(ack.message_id);
        }
        (c, Payload::Body(body)) if c.topic_only() => {
            check_topic(body)?;
            dst.put_u8(header);
            put_topic(body, dst);
        }
        (c, Payload::Body(body)) if c.has_topic() => {
            check_topic(body)?;
            let body_len = u32::try_from(body.body.len()).map_err(|_| too_long("body"))?;
            let additional_len =
                u16::try_from(body.additional.len()).map_err(|_| too_long("additional"))?;

            dst.put_u8(header);
            put_topic(body, dst);
            dst.put_u64(body.message_id);
            dst.put_u32(body_len);
            dst.put_u16(additional_len);
            dst.put_slice(body.body.as_bytes());
            dst.put_slice(body.additional.as_bytes());
            dst.put_u64(body.timestamp);
        }
        (category, _) => {
            return Err(RelayError::Framing(format!(
                "payload does not match category {category}"
            )));
        }
    }
    Ok(())
}

/// Encode `msg` into a fresh buffer.
pub fn encode_to_bytes(msg: &TransportMessage) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(encoded_len_hint(msg));
    encode(msg, &mut buf)?;
    Ok(buf.freeze())
}

fn encoded_len_hint(msg: &TransportMessage) -> usize {
    match &msg.payload {
        Payload::None => 1,
        Payload::Ack(_) => 9,
        Payload::Body(b) => 1 + 2 + b.from.len() + b.to.len() + 14 + b.body.len() + b.additional.len() + 8,
    }
}

fn check_topic(body: &MessageBody) -> Result<()> {
    if body.from.len() > u8::MAX as usize {
        return Err(too_long("from"));
    }
    if body.to.len() > u8::MAX as usize {
        return Err(too_long("to"));
    }
    Ok(())
}

fn put_topic(body: &MessageBody, dst: &mut impl BufMut) {
    // lengths checked by check_topic
    dst.put_u8(body.from.len() as u8);
    dst.put_u8(body.to.len() as u8);
    dst.put_slice(body.from.as_bytes());
    dst.put_slice(body.to.as_bytes());
}

fn too_long(field: &str) -> RelayError {
    RelayError::Framing(format!("{field} exceeds its length prefix"))
}
