//! Desegmenting driver.
//!
//! [`Dissector::dissect`] loops over one transport buffer, cutting it into
//! frames. An incomplete frame produces a [`DesegmentRequest`] telling the
//! transport feeder how many more bytes to supply and at which offset to
//! resume; the feeder re-invokes the driver with a buffer extending the
//! previous one from that offset. [`Dissector::probe`] is the heuristic
//! entry point for traffic not positively identified as SPDY.

pub mod record;

use bytes::Bytes;
use tracing::debug;

use crate::config::SpdyConfig;
use crate::conversation::Conversation;
use crate::cursor::Cursor;
use crate::error::Diagnostic;
use crate::frame::control::{parse_control_payload, ControlPayload};
use crate::frame::{
    ControlType, FrameDescriptor, FrameHeader, StreamId, FLAG_FIN,
    FLAG_SETTINGS_CLEAR_SETTINGS, FRAME_HEADER_LEN, MIN_VERSION,
};
use crate::headers::{parse_header_block, HeaderBlock, HeaderSummary};
use crate::stream::decompress_body;

use record::{AssembledBody, FramePayload, FrameRecord};

/// One transport buffer plus capture bookkeeping.
///
/// `frame_index` identifies the captured packet the buffer came from;
/// `visited` is true on replay passes over a packet already dissected once.
/// Both drive the decode-once discipline for compression and chunk state.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub bytes: &'a [u8],
    pub frame_index: u32,
    pub visited: bool,
}

/// How much more input the driver needs to finish the frame at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesegmentNeed {
    /// Not even the 8-byte prefix is available; any amount helps.
    OneMoreSegment,
    /// The prefix declared a frame this many bytes short of complete.
    Bytes(usize),
}

/// Marker handed back to the transport feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesegmentRequest {
    /// Buffer offset of the incomplete frame's first byte.
    pub offset: usize,
    pub need: DesegmentNeed,
}

/// Outcome of one driver pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DissectResult {
    /// Bytes covered by completely dissected frames.
    pub consumed: usize,
    /// One record per frame, in wire order.
    pub records: Vec<FrameRecord>,
    pub desegment: Option<DesegmentRequest>,
    /// Fenced one-line summary of every frame in the buffer.
    pub info: String,
}

/// Info column with fencing: the first frame's text is protected once
/// written, so later frames in the same buffer append instead of
/// overwriting.
#[derive(Debug, Default)]
struct InfoColumn {
    text: String,
    fence: usize,
}

impl InfoColumn {
    fn set(&mut self, s: &str) {
        self.text.truncate(self.fence);
        if self.fence > 0 {
            self.text.push_str(", ");
        }
        self.text.push_str(s);
    }

    fn set_fence(&mut self) {
        self.fence = self.text.len();
    }
}

/// Stateless driver; all decode state lives in the [`Conversation`].
#[derive(Debug, Clone)]
pub struct Dissector {
    config: SpdyConfig,
}

impl Dissector {
    /// Panics if the configuration fails validation.
    pub fn new(config: SpdyConfig) -> Self {
        if let Err(msg) = config.validate() {
            panic!("invalid SPDY dissector configuration: {msg}");
        }
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SpdyConfig::default())
    }

    pub fn config(&self) -> &SpdyConfig {
        &self.config
    }

    /// Dissects every whole frame in the buffer.
    ///
    /// Stops at the first incomplete frame and reports the deficit; the
    /// returned `consumed` offset is where the next buffer must resume.
    pub fn dissect(&self, conv: &mut Conversation, segment: &Segment<'_>) -> DissectResult {
        let buf = segment.bytes;
        let mut offset = 0usize;
        let mut records = Vec::new();
        let mut column = InfoColumn::default();
        let mut desegment = None;

        while offset < buf.len() {
            let remaining = buf.len() - offset;
            if remaining < FRAME_HEADER_LEN {
                desegment = Some(DesegmentRequest {
                    offset,
                    need: DesegmentNeed::OneMoreSegment,
                });
                break;
            }

            let expected = expected_frame_len(&buf[offset..]);
            if expected > remaining {
                desegment = Some(DesegmentRequest {
                    offset,
                    need: DesegmentNeed::Bytes(expected - remaining),
                });
                break;
            }

            let mut cur = Cursor::new(&buf[offset..offset + expected]);
            let Ok(header) = FrameHeader::parse(&mut cur) else {
                // Unreachable: the length checks above guarantee 8 bytes.
                break;
            };

            if self.config.debug_trace {
                debug!(
                    frame_index = segment.frame_index,
                    offset,
                    len = expected,
                    kind = header.type_name(),
                    "dissecting frame"
                );
            }

            let record = self.dissect_frame(conv, segment, offset, header, cur.rest());
            column.set(&record.info);
            column.set_fence();
            records.push(record);
            offset += expected;
        }

        DissectResult {
            consumed: offset,
            records,
            desegment,
            info: column.text,
        }
    }

    /// Heuristic entry point.
    ///
    /// Rejects buffers whose first byte can never start a SPDY frame, and
    /// buffers where not even one whole frame could be dissected. `None`
    /// means "not SPDY" and guarantees the conversation was left untouched;
    /// the caller keeps whatever desegmentation marker it had before.
    pub fn probe(&self, conv: &mut Conversation, segment: &Segment<'_>) -> Option<DissectResult> {
        // A frame starts with either a clear control bit and a 31-bit stream
        // id (in practice < 2^24, so 0x00) or a set control bit with version
        // high byte 0x80.
        let first = *segment.bytes.first()?;
        if first != 0x00 && first != 0x80 {
            return None;
        }

        let result = self.dissect(conv, segment);
        if result.consumed > 0 {
            Some(result)
        } else {
            None
        }
    }

    fn dissect_frame(
        &self,
        conv: &mut Conversation,
        segment: &Segment<'_>,
        offset: usize,
        header: FrameHeader,
        payload: &[u8],
    ) -> FrameRecord {
        let mut record = FrameRecord::new(header, offset);
        record.info = header.type_name().to_string();

        match header.descriptor {
            FrameDescriptor::UnknownControl { code, .. } => {
                record.diagnostics.push(Diagnostic::MalformedType(code));
            }
            FrameDescriptor::Data { stream_id } => {
                self.dissect_data(conv, segment, stream_id, header.flags, payload, &mut record);
            }
            FrameDescriptor::Control { version, kind } => {
                if version < MIN_VERSION {
                    record.payload = FramePayload::Unsupported;
                    record
                        .diagnostics
                        .push(Diagnostic::UnsupportedVersion(version));
                    record.info.push_str(" [Unsupported Version]");
                    return record;
                }

                match parse_control_payload(kind, payload) {
                    Err(diag) => {
                        record.diagnostics.push(diag);
                    }
                    Ok((parsed, note)) => {
                        if let Some(diag) = note {
                            record.diagnostics.push(diag);
                        }
                        self.finish_control(conv, segment, kind, header.flags, parsed, &mut record);
                    }
                }
            }
        }

        record
    }

    fn finish_control(
        &self,
        conv: &mut Conversation,
        segment: &Segment<'_>,
        kind: ControlType,
        flags: u8,
        parsed: ControlPayload,
        record: &mut FrameRecord,
    ) {
        match parsed {
            ControlPayload::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                slot,
                header_block,
            } => {
                record.info.push_str(&format!("[{stream_id}]"));
                let headers =
                    self.decode_headers(conv, segment, kind, stream_id, &header_block, record);
                record.payload = FramePayload::SynStream {
                    stream_id,
                    associated_stream_id,
                    priority,
                    slot,
                    headers,
                };
            }
            ControlPayload::SynReply {
                stream_id,
                header_block,
            } => {
                record.info.push_str(&format!("[{stream_id}]"));
                let headers =
                    self.decode_headers(conv, segment, kind, stream_id, &header_block, record);
                record.payload = FramePayload::SynReply { stream_id, headers };
            }
            ControlPayload::Headers {
                stream_id,
                header_block,
            } => {
                record.info.push_str(&format!("[{stream_id}]"));
                let headers =
                    self.decode_headers(conv, segment, kind, stream_id, &header_block, record);
                record.payload = FramePayload::Headers { stream_id, headers };
            }
            ControlPayload::RstStream { stream_id, status } => {
                record.info.push_str(&format!("[{stream_id}] {status}"));
                record.payload = FramePayload::RstStream { stream_id, status };
            }
            ControlPayload::Settings { entries } => {
                if !entries.is_empty() {
                    let ids = entries
                        .iter()
                        .map(|e| e.id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    record.info.push_str(&format!(" [{ids}]"));
                }
                record.payload = FramePayload::Settings {
                    clear_settings: flags & FLAG_SETTINGS_CLEAR_SETTINGS != 0,
                    entries,
                };
            }
            ControlPayload::Ping { id } => {
                record.info.push_str(&format!(" ID={id}"));
                record.payload = FramePayload::Ping { id };
            }
            ControlPayload::Goaway {
                last_good_stream_id,
                status,
            } => {
                record
                    .info
                    .push_str(&format!("[{last_good_stream_id}] status={status}"));
                record.payload = FramePayload::Goaway {
                    last_good_stream_id,
                    status,
                };
            }
            ControlPayload::WindowUpdate { stream_id, delta } => {
                record.info.push_str(&format!("[{stream_id}] Delta={delta}"));
                record.payload = FramePayload::WindowUpdate { stream_id, delta };
            }
            ControlPayload::Noop => {
                record.payload = FramePayload::Noop;
            }
            ControlPayload::Credential { payload } => {
                record.payload = FramePayload::Credential { payload };
            }
        }
    }

    /// Decompresses and parses a header block, recording stream metadata on
    /// first sight. Returns `None` when header decompression is disabled or
    /// failed; the record carries the reason.
    fn decode_headers(
        &self,
        conv: &mut Conversation,
        segment: &Segment<'_>,
        kind: ControlType,
        stream_id: StreamId,
        compressed: &[u8],
        record: &mut FrameRecord,
    ) -> Option<HeaderBlock> {
        if !self.config.decompress_headers {
            return None;
        }

        let block_bytes = match conv.decompress_header_block(
            segment.frame_index,
            stream_id,
            kind,
            compressed,
            &self.config,
        ) {
            Ok(bytes) => bytes,
            Err(diag) => {
                record.info.push_str(" [Error: Header decompression failed]");
                record.diagnostics.push(diag);
                return None;
            }
        };

        let (block, diag) = parse_header_block(&block_bytes);
        if let Some(diag) = diag {
            record.diagnostics.push(diag);
        }

        let summary = HeaderSummary::from_headers(&block.headers);
        if let Some(line) = summary.request_line(kind) {
            record.info.push_str(": ");
            record.info.push_str(&line);
        }

        // Remember content type and encoding for DATA frames to come, once
        // per stream, on the first pass only.
        if !segment.visited && summary.content_type.is_some() {
            if self.config.debug_trace {
                debug!(
                    stream = stream_id.value(),
                    content_type = summary.content_type.as_deref(),
                    "recording stream metadata"
                );
            }
            let HeaderSummary {
                content_type,
                content_type_params,
                content_encoding,
                ..
            } = summary;
            if kind == ControlType::Headers {
                conv.streams.update_stream_info(
                    stream_id,
                    content_type,
                    content_type_params,
                    content_encoding,
                );
            } else if let Err(diag) = conv.streams.save_stream_info(
                stream_id,
                content_type,
                content_type_params,
                content_encoding,
            ) {
                record.diagnostics.push(diag);
            }
        }

        Some(block)
    }

    fn dissect_data(
        &self,
        conv: &mut Conversation,
        segment: &Segment<'_>,
        stream_id: StreamId,
        flags: u8,
        payload: &[u8],
        record: &mut FrameRecord,
    ) {
        let fin = flags & FLAG_FIN != 0;
        let frame_length = payload.len();
        record.info = format!("DATA[{stream_id}] length={frame_length}");

        let data = Bytes::copy_from_slice(payload);
        let prior_frames = conv
            .streams
            .get(stream_id)
            .map_or(0, |si| si.data_frame_count());

        let mut body = None;
        let mut partial = false;

        if frame_length != 0 || prior_frames != 0 {
            // A frame that is the stream's entire body never enters the
            // chunk list.
            let is_single_chunk = if frame_length != 0 {
                let single = prior_frames == 0 && fin;
                if !segment.visited && !single {
                    if let Some(si) = conv.streams.get_mut(stream_id) {
                        if self.config.assemble_entity_bodies {
                            if self.config.debug_trace {
                                debug!(
                                    frame_index = segment.frame_index,
                                    stream = stream_id.value(),
                                    len = data.len(),
                                    "retaining data chunk for reassembly"
                                );
                            }
                            si.push_chunk(data.clone(), segment.frame_index);
                        } else {
                            si.count_frame();
                        }
                    }
                }
                single
            } else {
                prior_frames == 1
            };

            if !fin {
                partial = true;
                record.info.push_str(" (partial entity)");
            } else if let Some(si) = conv.streams.get_mut(stream_id) {
                let have_entire_body = is_single_chunk || self.config.assemble_entity_bodies;
                if have_entire_body {
                    let mut data_view = si.assemble().unwrap_or_else(|| data.clone());
                    let frame_count = si.data_frame_count().max(1);
                    let content_type = si.content_type.clone();
                    let content_type_params = si.content_type_params.clone();
                    let content_encoding = si.content_encoding.clone();

                    let mut decompressed = false;
                    if let Some(encoding) = content_encoding
                        .as_deref()
                        .filter(|e| !e.eq_ignore_ascii_case("identity"))
                    {
                        let inflatable = encoding.eq_ignore_ascii_case("gzip")
                            || encoding.eq_ignore_ascii_case("deflate");
                        if self.config.decompress_body && inflatable {
                            match decompress_body(encoding, &data_view) {
                                Ok(out) => {
                                    data_view = Bytes::from(out);
                                    decompressed = true;
                                }
                                Err(diag) => {
                                    record.info.push_str(" [Error: Body decompression failed]");
                                    record.diagnostics.push(diag);
                                }
                            }
                        } else {
                            record
                                .info
                                .push_str(&format!(" (content-encoded entity: {encoding})"));
                        }
                    }

                    body = Some(AssembledBody {
                        content_type,
                        content_type_params,
                        content_encoding,
                        data: data_view,
                        decompressed,
                        frame_count,
                    });
                }
            }
            // A DATA frame for an unregistered stream stays raw bytes.
        }

        record.payload = FramePayload::Data {
            stream_id,
            data,
            body,
            partial,
        };
    }
}

/// Whole-frame size declared by the 24-bit length at prefix offset 5.
fn expected_frame_len(buf: &[u8]) -> usize {
    debug_assert!(buf.len() >= FRAME_HEADER_LEN);
    let length = (buf[5] as usize) << 16 | (buf[6] as usize) << 8 | buf[7] as usize;
    FRAME_HEADER_LEN + length
}
