//! JSON test vector loader shared by decoder tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use base64::Engine;
use serde::Deserialize;

use relaygate_core::protocol::{MessageBody, Payload, ProtocolCategory, TransportMessage};

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub frame: FrameData,
    #[serde(default)]
    pub max_frame_bytes: Option<usize>,
    #[serde(default)]
    pub expect: Vec<ExpectMessage>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub encoding: String,
    pub data: String,
}

impl FrameData {
    pub fn decode(&self) -> Vec<u8> {
        match self.encoding.as_str() {
            "base64" => base64::engine::general_purpose::STANDARD
                .decode(&self.data)
                .expect("invalid base64 in test vector"),
            "hex" => hex::decode(&self.data).expect("invalid hex in test vector"),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpectMessage {
    pub category: String,
    pub client_type: u8,
    #[serde(default)]
    pub discard: bool,
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub additional: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl ExpectMessage {
    /// Build the message the vector describes.
    pub fn to_message(&self) -> TransportMessage {
        let category = match self.category.as_str() {
            "ping" => ProtocolCategory::Ping,
            "one" => ProtocolCategory::One,
            "group" => ProtocolCategory::Group,
            "join" => ProtocolCategory::Join,
            "leave" => ProtocolCategory::Leave,
            "online" => ProtocolCategory::Online,
            "groupack" => ProtocolCategory::GroupAck,
            "accept" => ProtocolCategory::Accept,
            other => panic!("unknown category in vector: {other}"),
        };

        if self.discard {
            return TransportMessage::discarded(category, self.client_type);
        }

        let payload = if category == ProtocolCategory::Ping {
            Payload::None
        } else if category.is_ack() {
            return TransportMessage::ack(category, self.client_type, self.message_id.unwrap());
        } else {
            Payload::Body(MessageBody {
                from: self.from.clone().unwrap_or_default(),
                to: self.to.clone().unwrap_or_default(),
                message_id: self.message_id.unwrap_or_default(),
                body: self.body.clone().unwrap_or_default(),
                additional: self.additional.clone().unwrap_or_default(),
                timestamp: self.timestamp.unwrap_or_default(),
            })
        };

        TransportMessage {
            category,
            client_type: self.client_type,
            discard: false,
            payload,
        }
    }
}

pub fn load(name: &str) -> TestVector {
    let s = std::fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

pub const ALL: [&str; 12] = [
    "one_basic.json",
    "ping.json",
    "join_room.json",
    "leave_room.json",
    "groupack.json",
    "accept_client_type.json",
    "group_additional.json",
    "online.json",
    "unknown_then_ping.json",
    "two_frames.json",
    "utf8_invalid.json",
    "body_too_large.json",
];
