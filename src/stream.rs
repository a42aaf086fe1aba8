//! Per-stream metadata and DATA reassembly.
//!
//! A stream record is created the first time a SYN_STREAM / SYN_REPLY header
//! block reveals a content type, and owns every DATA payload seen on that
//! stream until FIN triggers assembly. Chunks are copied out of the transport
//! buffer because the buffer does not outlive the frame; they stay with the
//! stream record for the lifetime of the conversation so replay passes can
//! re-display the assembled body.

use std::collections::BTreeMap;
use std::io::Read;

use bytes::{Bytes, BytesMut};

use crate::error::Diagnostic;
use crate::frame::StreamId;

/// One retained DATA payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub bytes: Bytes,
    /// Capture frame the chunk arrived in.
    pub frame_index: u32,
}

/// Metadata and accumulated body for one stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub content_type: Option<String>,
    pub content_type_params: Option<String>,
    pub content_encoding: Option<String>,
    chunks: Vec<DataChunk>,
    assembled: Option<Bytes>,
    /// Count of DATA frames observed, maintained even when chunks are not
    /// retained (count-only mode).
    data_frame_count: u32,
}

impl StreamInfo {
    pub fn data_frame_count(&self) -> u32 {
        self.data_frame_count
    }

    pub fn chunks(&self) -> &[DataChunk] {
        &self.chunks
    }

    pub fn push_chunk(&mut self, bytes: Bytes, frame_index: u32) {
        self.chunks.push(DataChunk { bytes, frame_index });
        self.data_frame_count += 1;
    }

    pub fn count_frame(&mut self) {
        self.data_frame_count += 1;
    }

    /// Concatenates the retained chunks, memoizing the result. Returns `None`
    /// if nothing was retained. A single chunk is handed back without
    /// copying.
    pub fn assemble(&mut self) -> Option<Bytes> {
        if self.assembled.is_none() {
            self.assembled = match self.chunks.as_slice() {
                [] => None,
                [single] => Some(single.bytes.clone()),
                many => {
                    let total: usize = many.iter().map(|c| c.bytes.len()).sum();
                    let mut buf = BytesMut::with_capacity(total);
                    for chunk in many {
                        buf.extend_from_slice(&chunk.bytes);
                    }
                    Some(buf.freeze())
                }
            };
        }
        self.assembled.clone()
    }
}

/// Sparse ordered map of stream id to stream record.
#[derive(Debug, Default)]
pub struct StreamMap {
    streams: BTreeMap<u32, StreamInfo>,
}

impl StreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: StreamId) -> Option<&StreamInfo> {
        self.streams.get(&id.value())
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut StreamInfo> {
        self.streams.get_mut(&id.value())
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Records metadata for a newly observed stream. The slot must be empty;
    /// a second registration is a protocol error and the first writer wins.
    pub fn save_stream_info(
        &mut self,
        id: StreamId,
        content_type: Option<String>,
        content_type_params: Option<String>,
        content_encoding: Option<String>,
    ) -> Result<(), Diagnostic> {
        if self.streams.contains_key(&id.value()) {
            return Err(Diagnostic::StreamAlreadyRegistered(id.value()));
        }
        self.streams.insert(
            id.value(),
            StreamInfo {
                content_type,
                content_type_params,
                content_encoding,
                ..StreamInfo::default()
            },
        );
        Ok(())
    }

    /// HEADERS-style update: fills fields that are still unset, never
    /// replacing recorded metadata, creating the record if needed.
    pub fn update_stream_info(
        &mut self,
        id: StreamId,
        content_type: Option<String>,
        content_type_params: Option<String>,
        content_encoding: Option<String>,
    ) {
        let info = self.streams.entry(id.value()).or_default();
        if info.content_type.is_none() {
            info.content_type = content_type;
            info.content_type_params = content_type_params;
        }
        if info.content_encoding.is_none() {
            info.content_encoding = content_encoding;
        }
    }
}

/// Inflates a gzip or deflate entity body with a fresh decoder.
///
/// `deflate` means zlib-wrapped on the wire in well-behaved peers, but some
/// send raw deflate; the zlib attempt falls back to raw before giving up.
pub fn decompress_body(encoding: &str, data: &[u8]) -> Result<Vec<u8>, Diagnostic> {
    let mut out = Vec::with_capacity(data.len() * 2);
    if encoding.eq_ignore_ascii_case("gzip") {
        let mut decoder = flate2::read::GzDecoder::new(data);
        decoder
            .read_to_end(&mut out)
            .map_err(|_| Diagnostic::BodyInflateFailed)?;
        return Ok(out);
    }

    debug_assert!(encoding.eq_ignore_ascii_case("deflate"));
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) => {
            out.clear();
            let mut raw = flate2::read::DeflateDecoder::new(data);
            raw.read_to_end(&mut out)
                .map_err(|_| Diagnostic::BodyInflateFailed)?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_concatenates_in_order() {
        let mut info = StreamInfo::default();
        info.push_chunk(Bytes::from_static(b"hello "), 1);
        info.push_chunk(Bytes::from_static(b"spdy "), 2);
        info.push_chunk(Bytes::from_static(b"world"), 3);
        assert_eq!(info.data_frame_count(), 3);
        assert_eq!(info.assemble().unwrap().as_ref(), b"hello spdy world");
        // Memoized: a second call yields the same buffer.
        assert_eq!(info.assemble().unwrap().as_ref(), b"hello spdy world");
    }

    #[test]
    fn test_assemble_single_chunk_is_zero_copy() {
        let mut info = StreamInfo::default();
        let chunk = Bytes::from_static(b"only");
        info.push_chunk(chunk.clone(), 7);
        let assembled = info.assemble().unwrap();
        // Same refcounted storage, not a copy.
        assert_eq!(assembled.as_ptr(), chunk.as_ptr());
    }

    #[test]
    fn test_assemble_empty_is_none() {
        let mut info = StreamInfo::default();
        assert!(info.assemble().is_none());
    }

    #[test]
    fn test_double_registration_is_protocol_error() {
        let mut map = StreamMap::new();
        map.save_stream_info(StreamId::new(1), Some("text/html".into()), None, None)
            .unwrap();
        let err = map
            .save_stream_info(StreamId::new(1), Some("image/png".into()), None, None)
            .unwrap_err();
        assert_eq!(err, Diagnostic::StreamAlreadyRegistered(1));
        // First writer wins.
        assert_eq!(
            map.get(StreamId::new(1)).unwrap().content_type.as_deref(),
            Some("text/html")
        );
    }

    #[test]
    fn test_update_never_replaces() {
        let mut map = StreamMap::new();
        map.save_stream_info(
            StreamId::new(3),
            Some("text/plain".into()),
            None,
            Some("gzip".into()),
        )
        .unwrap();
        map.update_stream_info(StreamId::new(3), Some("image/gif".into()), None, None);
        let info = map.get(StreamId::new(3)).unwrap();
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
        assert_eq!(info.content_encoding.as_deref(), Some("gzip"));
    }

    #[test]
    fn test_update_fills_missing() {
        let mut map = StreamMap::new();
        map.update_stream_info(StreamId::new(5), Some("text/css".into()), None, None);
        assert_eq!(
            map.get(StreamId::new(5)).unwrap().content_type.as_deref(),
            Some("text/css")
        );
    }

    #[test]
    fn test_body_gzip_round_trip() {
        use flate2::{write::GzEncoder, Compression};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"gzip body payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress_body("GZIP", &compressed).unwrap();
        assert_eq!(out, b"gzip body payload");
    }

    #[test]
    fn test_body_deflate_round_trip() {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"deflate body payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress_body("deflate", &compressed).unwrap();
        assert_eq!(out, b"deflate body payload");
    }

    #[test]
    fn test_body_raw_deflate_fallback() {
        use flate2::{write::DeflateEncoder, Compression};
        use std::io::Write;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"raw deflate stream").unwrap();
        let compressed = encoder.finish().unwrap();

        let out = decompress_body("deflate", &compressed).unwrap();
        assert_eq!(out, b"raw deflate stream");
    }

    #[test]
    fn test_body_garbage_fails() {
        assert_eq!(
            decompress_body("gzip", b"not gzip at all"),
            Err(Diagnostic::BodyInflateFailed)
        );
    }
}
