//! Decode records and collaborator surfaces.
//!
//! Every frame produces exactly one [`FrameRecord`]; decode failures become
//! diagnostics on that record rather than out-of-band signals. The record
//! stream returned by the driver is the output-sink interface: callers tap
//! it, render it, or feed assembled bodies through a
//! [`BodySubdissectorRegistry`].

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::Diagnostic;
use crate::frame::{FrameDescriptor, FrameHeader, RstStatus, Setting, StreamId};
use crate::headers::HeaderBlock;

/// A reassembled entity body, ready for media-type subdissection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledBody {
    pub content_type: Option<String>,
    pub content_type_params: Option<String>,
    pub content_encoding: Option<String>,
    pub data: Bytes,
    /// True when `data` is the inflated form of a gzip/deflate body.
    pub decompressed: bool,
    /// DATA frames that contributed to the body.
    pub frame_count: u32,
}

/// Typed frame payload attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Data {
        stream_id: StreamId,
        data: Bytes,
        /// Set on the FIN frame once the whole body is available.
        body: Option<AssembledBody>,
        /// FIN not yet seen; the payload is a body fragment.
        partial: bool,
    },
    SynStream {
        stream_id: StreamId,
        associated_stream_id: StreamId,
        priority: u8,
        slot: u8,
        headers: Option<HeaderBlock>,
    },
    SynReply {
        stream_id: StreamId,
        headers: Option<HeaderBlock>,
    },
    Headers {
        stream_id: StreamId,
        headers: Option<HeaderBlock>,
    },
    RstStream {
        stream_id: StreamId,
        status: RstStatus,
    },
    Settings {
        clear_settings: bool,
        entries: Vec<Setting>,
    },
    Ping {
        id: u32,
    },
    Goaway {
        last_good_stream_id: StreamId,
        status: u32,
    },
    WindowUpdate {
        stream_id: StreamId,
        delta: u32,
    },
    Noop,
    Credential {
        payload: Bytes,
    },
    /// Control frame below the minimum version; payload skipped.
    Unsupported,
    /// Payload could not be decoded; see the record's diagnostics.
    Malformed,
}

/// One decoded frame: descriptor, typed payload, and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub descriptor: FrameDescriptor,
    pub flags: u8,
    pub length: u32,
    /// Offset of the frame's first byte within the dissected buffer.
    pub offset: usize,
    pub payload: FramePayload,
    pub diagnostics: Vec<Diagnostic>,
    /// Human-readable summary, e.g. `PING ID=42`.
    pub info: String,
}

impl FrameRecord {
    pub(crate) fn new(header: FrameHeader, offset: usize) -> Self {
        Self {
            descriptor: header.descriptor,
            flags: header.flags,
            length: header.length,
            offset,
            payload: FramePayload::Malformed,
            diagnostics: Vec::new(),
            info: String::new(),
        }
    }

    /// Stream id of the frame, wherever the wire put it.
    pub fn stream_id(&self) -> Option<StreamId> {
        match (&self.descriptor, &self.payload) {
            (FrameDescriptor::Data { stream_id }, _) => Some(*stream_id),
            (_, FramePayload::SynStream { stream_id, .. })
            | (_, FramePayload::SynReply { stream_id, .. })
            | (_, FramePayload::Headers { stream_id, .. })
            | (_, FramePayload::RstStream { stream_id, .. })
            | (_, FramePayload::WindowUpdate { stream_id, .. }) => Some(*stream_id),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Handler invoked with a reassembled body.
pub type BodyHandler = Box<dyn FnMut(&AssembledBody) + Send>;

/// Media-type keyed dispatch for reassembled bodies.
///
/// The dissector itself never interprets body bytes; it exposes the content
/// type and assembled data on the DATA record, and this registry is the
/// conventional way to route them to an actual media parser.
#[derive(Default)]
pub struct BodySubdissectorRegistry {
    handlers: HashMap<String, BodyHandler>,
}

impl BodySubdissectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a lower-case media type such as `text/html`.
    pub fn register(&mut self, content_type: &str, handler: BodyHandler) {
        self.handlers
            .insert(content_type.to_ascii_lowercase(), handler);
    }

    /// Routes a body to its media-type handler. Returns false when no
    /// handler matched (callers typically fall back to a raw-data view).
    pub fn dispatch(&mut self, body: &AssembledBody) -> bool {
        let Some(content_type) = body.content_type.as_deref() else {
            return false;
        };
        match self.handlers.get_mut(content_type) {
            Some(handler) => {
                handler(body);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for BodySubdissectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySubdissectorRegistry")
            .field("media_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
