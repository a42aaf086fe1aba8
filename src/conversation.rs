//! Per-conversation state.
//!
//! One [`Conversation`] exists per transport connection (keyed by the 5-tuple
//! on the caller's side) and exclusively owns everything long-lived: the two
//! direction inflaters, the stream registry, and the memo of header blocks
//! already decompressed per captured frame. Nothing here is shared across
//! conversations, so the whole dissector runs single-threaded per
//! connection.

use std::collections::HashMap;

use bytes::Bytes;

use crate::config::{HeadersDirectionPolicy, SpdyConfig};
use crate::error::Diagnostic;
use crate::frame::{ControlType, Initiator, StreamId};
use crate::headers::dictionary::DICTIONARY_ADLER;
use crate::headers::{Direction, HeaderInflater};
use crate::stream::StreamMap;

/// Memo key: a captured frame is identified by its capture index plus the
/// (stream id, frame type) pair inside it, since one TCP segment can carry
/// several SPDY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    frame_index: u32,
    stream_id: u32,
    type_code: u16,
}

/// Long-lived decoder state for one connection.
#[derive(Debug, Default)]
pub struct Conversation {
    request_inflater: Option<HeaderInflater>,
    reply_inflater: Option<HeaderInflater>,
    pub streams: StreamMap,
    header_memo: HashMap<MemoKey, Bytes>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adler-32 the peers must present when requesting the preset dictionary.
    pub fn dictionary_id(&self) -> u32 {
        *DICTIONARY_ADLER
    }

    /// Selects the inflater direction for a header-carrying frame.
    ///
    /// Even stream ids are server-initiated and always decode with the reply
    /// inflater. SYN_STREAM comes from the requester; SYN_REPLY from the
    /// responder. HEADERS follows the configured policy, and anything else
    /// defaults to the reply side for compatibility with observed peers.
    pub fn direction_for(
        kind: ControlType,
        stream_id: StreamId,
        policy: HeadersDirectionPolicy,
    ) -> Direction {
        if stream_id.initiator() == Initiator::Server {
            return Direction::Reply;
        }
        match kind {
            ControlType::SynStream => Direction::Request,
            ControlType::SynReply => Direction::Reply,
            ControlType::Headers => match policy {
                HeadersDirectionPolicy::AlwaysReply => Direction::Reply,
                HeadersDirectionPolicy::ByStreamParity => Direction::Request,
            },
            _ => Direction::Reply,
        }
    }

    fn inflater_mut(&mut self, direction: Direction) -> &mut HeaderInflater {
        let slot = match direction {
            Direction::Request => &mut self.request_inflater,
            Direction::Reply => &mut self.reply_inflater,
        };
        slot.get_or_insert_with(HeaderInflater::new)
    }

    /// Compressed input consumed so far on a direction. `None` until the
    /// direction's inflater has been created.
    pub fn inflater_total_in(&self, direction: Direction) -> Option<u64> {
        match direction {
            Direction::Request => self.request_inflater.as_ref().map(|i| i.total_in()),
            Direction::Reply => self.reply_inflater.as_ref().map(|i| i.total_in()),
        }
    }

    /// Decompresses a header block exactly once per captured frame.
    ///
    /// A memo hit returns the stored bytes without touching the inflater;
    /// this is what keeps re-decoding a frame (display refresh, second pass)
    /// from corrupting the shared zlib stream for every later frame on the
    /// direction.
    pub fn decompress_header_block(
        &mut self,
        frame_index: u32,
        stream_id: StreamId,
        kind: ControlType,
        compressed: &[u8],
        config: &SpdyConfig,
    ) -> Result<Bytes, Diagnostic> {
        let key = MemoKey {
            frame_index,
            stream_id: stream_id.value(),
            type_code: kind.code(),
        };
        if let Some(cached) = self.header_memo.get(&key) {
            return Ok(cached.clone());
        }

        let direction = Self::direction_for(kind, stream_id, config.headers_direction);
        let initial = config.header_block_initial_capacity;
        let max = config.max_header_block_size;
        let block = self
            .inflater_mut(direction)
            .inflate(compressed, initial, max)?;

        let block = Bytes::from(block);
        self.header_memo.insert(key, block.clone());
        Ok(block)
    }
}
