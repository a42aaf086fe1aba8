//! SPDY frame types and the common 8-byte header.
//!
//! Every frame starts with the same 8-byte prefix; the high bit of the first
//! byte selects between the two layouts:
//!
//! ```text
//! +-+-------------------------------+-------------------------------+
//! |C|      version (15)             |          type (16)            |  control
//! +-+-------------------------------+-------------------------------+
//! |C|                      stream id (31)                           |  data
//! +-+-------------------------------+-------------------------------+
//! |   flags (8)   |                  length (24)                    |
//! +---------------+-------------------------------------------------+
//! ```
//!
//! [`FrameHeader::parse`] decodes the prefix into a descriptor;
//! [`control::parse_control_payload`] handles the type-specific payloads.

pub mod control;
mod header;

pub use control::{ControlPayload, RstStatus, Setting, SettingId};

/// Size of the common frame prefix.
pub const FRAME_HEADER_LEN: usize = 8;

/// Lowest control-frame version this dissector decodes.
pub const MIN_VERSION: u16 = 3;

/// Last frame in this direction of the stream (DATA, SYN_STREAM, SYN_REPLY,
/// HEADERS).
pub const FLAG_FIN: u8 = 0x01;
/// Sender will not accept a reply on this stream (SYN_STREAM).
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;
/// Clear previously persisted settings (SETTINGS frame flag).
pub const FLAG_SETTINGS_CLEAR_SETTINGS: u8 = 0x01;

/// Per-entry SETTINGS flags.
pub const SETTINGS_FLAG_PERSIST_VALUE: u8 = 0x01;
pub const SETTINGS_FLAG_PERSISTED: u8 = 0x02;

/// 31-bit stream identifier. The wire reserves the high bit of the four-byte
/// word; constructors mask it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

/// Which peer opened a stream, derived from id parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Client,
    Server,
}

impl StreamId {
    pub fn new(raw: u32) -> Self {
        Self(raw & 0x7FFF_FFFF)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Odd ids are client-initiated, even ids server-initiated.
    pub fn initiator(self) -> Initiator {
        if self.0 % 2 == 1 {
            Initiator::Client
        } else {
            Initiator::Server
        }
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Control frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    SynStream,
    SynReply,
    RstStream,
    Settings,
    Noop,
    Ping,
    Goaway,
    Headers,
    WindowUpdate,
    Credential,
}

impl ControlType {
    /// Maps a wire code to a frame type. DATA has no code (it is selected by
    /// a clear control bit); anything outside 1..=10 is invalid.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(ControlType::SynStream),
            2 => Some(ControlType::SynReply),
            3 => Some(ControlType::RstStream),
            4 => Some(ControlType::Settings),
            5 => Some(ControlType::Noop),
            6 => Some(ControlType::Ping),
            7 => Some(ControlType::Goaway),
            8 => Some(ControlType::Headers),
            9 => Some(ControlType::WindowUpdate),
            10 => Some(ControlType::Credential),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ControlType::SynStream => 1,
            ControlType::SynReply => 2,
            ControlType::RstStream => 3,
            ControlType::Settings => 4,
            ControlType::Noop => 5,
            ControlType::Ping => 6,
            ControlType::Goaway => 7,
            ControlType::Headers => 8,
            ControlType::WindowUpdate => 9,
            ControlType::Credential => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlType::SynStream => "SYN_STREAM",
            ControlType::SynReply => "SYN_REPLY",
            ControlType::RstStream => "RST_STREAM",
            ControlType::Settings => "SETTINGS",
            ControlType::Noop => "NOOP",
            ControlType::Ping => "PING",
            ControlType::Goaway => "GOAWAY",
            ControlType::Headers => "HEADERS",
            ControlType::WindowUpdate => "WINDOW_UPDATE",
            ControlType::Credential => "CREDENTIAL",
        }
    }

    /// Frames whose payload carries a compressed header block.
    pub fn carries_header_block(self) -> bool {
        matches!(
            self,
            ControlType::SynStream | ControlType::SynReply | ControlType::Headers
        )
    }
}

/// First word of the common header, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDescriptor {
    /// Control bit clear; the word holds the stream id.
    Data { stream_id: StreamId },
    /// Control bit set with a recognised type code.
    Control { version: u16, kind: ControlType },
    /// Control bit set but the type code is outside the enumerated set.
    UnknownControl { version: u16, code: u16 },
}

/// Decoded common frame prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub descriptor: FrameDescriptor,
    pub flags: u8,
    /// 24-bit payload length; the whole frame is `8 + length` bytes.
    pub length: u32,
}

impl FrameHeader {
    pub fn total_len(&self) -> usize {
        FRAME_HEADER_LEN + self.length as usize
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn type_name(&self) -> &'static str {
        match self.descriptor {
            FrameDescriptor::Data { .. } => "DATA",
            FrameDescriptor::Control { kind, .. } => kind.name(),
            FrameDescriptor::UnknownControl { .. } => "INVALID",
        }
    }
}
