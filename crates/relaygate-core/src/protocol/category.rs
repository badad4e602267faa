//! Frame categories carried in the low nibble of the fixed header.

use std::fmt;

/// Mask for the category nibble.
pub const CATEGORY_MASK: u8 = 0x0F;

/// Frame semantics.
///
/// The numeric codes are the contract between encoder and decoder; both ends
/// of a connection must agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolCategory {
    Ping,
    One,
    Group,
    Join,
    Leave,
    Online,
    GroupAck,
    Accept,
    /// Unrecognised code; never emitted by the decoder.
    Unknown(u8),
}

impl ProtocolCategory {
    /// Split a fixed header byte into `(client_type, category)`.
    pub fn from_header(header: u8) -> (u8, Self) {
        (header >> 4, Self::from_code(header & CATEGORY_MASK))
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ProtocolCategory::Ping,
            2 => ProtocolCategory::One,
            3 => ProtocolCategory::Group,
            4 => ProtocolCategory::Join,
            5 => ProtocolCategory::Leave,
            6 => ProtocolCategory::Online,
            7 => ProtocolCategory::GroupAck,
            8 => ProtocolCategory::Accept,
            other => ProtocolCategory::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ProtocolCategory::Ping => 1,
            ProtocolCategory::One => 2,
            ProtocolCategory::Group => 3,
            ProtocolCategory::Join => 4,
            ProtocolCategory::Leave => 5,
            ProtocolCategory::Online => 6,
            ProtocolCategory::GroupAck => 7,
            ProtocolCategory::Accept => 8,
            ProtocolCategory::Unknown(c) => c & CATEGORY_MASK,
        }
    }

    /// Compose a fixed header byte.
    pub fn header(self, client_type: u8) -> u8 {
        ((client_type & 0x0F) << 4) | self.code()
    }

    /// Frames that carry a topic header (from/to).
    pub fn has_topic(self) -> bool {
        matches!(
            self,
            ProtocolCategory::One
                | ProtocolCategory::Group
                | ProtocolCategory::Join
                | ProtocolCategory::Leave
                | ProtocolCategory::Online
        )
    }

    /// Frames that end right after the topic header.
    pub fn topic_only(self) -> bool {
        matches!(self, ProtocolCategory::Join | ProtocolCategory::Leave)
    }

    /// Frames whose tail is a single message id.
    pub fn is_ack(self) -> bool {
        matches!(self, ProtocolCategory::GroupAck | ProtocolCategory::Accept)
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolCategory::Ping => "ping",
            ProtocolCategory::One => "one",
            ProtocolCategory::Group => "group",
            ProtocolCategory::Join => "join",
            ProtocolCategory::Leave => "leave",
            ProtocolCategory::Online => "online",
            ProtocolCategory::GroupAck => "groupack",
            ProtocolCategory::Accept => "accept",
            ProtocolCategory::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ProtocolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
