//! Decoded message model.

use crate::protocol::category::ProtocolCategory;

/// Addressed message content (ONE, GROUP, ONLINE; JOIN/LEAVE fill only
/// `from`/`to`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub from: String,
    pub to: String,
    pub message_id: u64,
    pub body: String,
    pub additional: String,
    /// Carried in the trailing CRC slot.
    pub timestamp: u64,
}

impl MessageBody {
    /// Topic-only body used by JOIN/LEAVE.
    pub fn topic(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }
}

/// Acknowledgement content (GROUPACK, ACCEPT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckMessage {
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    None,
    Body(MessageBody),
    Ack(AckMessage),
}

/// One decoded frame. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub category: ProtocolCategory,
    /// High nibble of the fixed header; opaque to the gateway.
    pub client_type: u8,
    /// Sentinel: the frame was consumed but its content is unusable.
    pub discard: bool,
    pub payload: Payload,
}

impl TransportMessage {
    pub fn ping(client_type: u8) -> Self {
        Self {
            category: ProtocolCategory::Ping,
            client_type,
            discard: false,
            payload: Payload::None,
        }
    }

    pub fn ack(category: ProtocolCategory, client_type: u8, message_id: u64) -> Self {
        Self {
            category,
            client_type,
            discard: false,
            payload: Payload::Ack(AckMessage { message_id }),
        }
    }

    pub fn body(category: ProtocolCategory, client_type: u8, body: MessageBody) -> Self {
        Self {
            category,
            client_type,
            discard: false,
            payload: Payload::Body(body),
        }
    }

    pub fn discarded(category: ProtocolCategory, client_type: u8) -> Self {
        Self {
            category,
            client_type,
            discard: true,
            payload: Payload::None,
        }
    }

    pub fn as_body(&self) -> Option<&MessageBody> {
        match &self.payload {
            Payload::Body(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_ack(&self) -> Option<&AckMessage> {
        match &self.payload {
            Payload::Ack(a) => Some(a),
            _ => None,
        }
    }
}

/// A message parked for a recipient that could not be reached directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineMessage {
    pub user_id: String,
    pub message: TransportMessage,
}

impl OfflineMessage {
    pub fn new(user_id: impl Into<String>, message: TransportMessage) -> Self {
        Self {
            user_id: user_id.into(),
            message,
        }
    }
}
