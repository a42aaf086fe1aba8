//! Shared builders for wire-format fixtures.
#![allow(dead_code)]

use flate2::{Compress, Compression, FlushCompress};
use spdytap::headers::dictionary::SPDY_DICTIONARY;

/// Builds a version-3 control frame with the given type code.
pub fn control_frame(code: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&0x8003u16.to_be_bytes());
    out.extend_from_slice(&code.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

/// Builds a DATA frame.
pub fn data_frame(stream_id: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&stream_id.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

/// Serialises an uncompressed name/value block.
pub fn name_value_block(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (name, value) in pairs {
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}

/// One peer's header compressor: a single deflate stream primed with the
/// SPDY dictionary, sync-flushed per block, exactly as on the wire.
pub struct PeerCompressor {
    stream: Compress,
}

impl PeerCompressor {
    pub fn new() -> Self {
        let mut stream = Compress::new(Compression::default(), true);
        stream.set_dictionary(SPDY_DICTIONARY).unwrap();
        Self { stream }
    }

    pub fn compress(&mut self, block: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(block.len() + 128);
        let start_in = self.stream.total_in();
        loop {
            let consumed = (self.stream.total_in() - start_in) as usize;
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(64));
            }
            self.stream
                .compress_vec(&block[consumed..], &mut out, FlushCompress::Sync)
                .unwrap();
            let consumed = (self.stream.total_in() - start_in) as usize;
            if consumed == block.len() && out.len() < out.capacity() {
                return out;
            }
        }
    }

    pub fn compress_pairs(&mut self, pairs: &[(&str, &str)]) -> Vec<u8> {
        self.compress(&name_value_block(pairs))
    }
}

/// SYN_STREAM payload: stream id, associated id, priority/slot, block.
pub fn syn_stream_payload(
    stream_id: u32,
    associated_stream_id: u32,
    priority: u8,
    slot: u8,
    compressed_block: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + compressed_block.len());
    out.extend_from_slice(&stream_id.to_be_bytes());
    out.extend_from_slice(&associated_stream_id.to_be_bytes());
    out.push(priority << 5);
    out.push(slot);
    out.extend_from_slice(compressed_block);
    out
}

/// SYN_REPLY / HEADERS payload: stream id then block.
pub fn stream_headers_payload(stream_id: u32, compressed_block: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + compressed_block.len());
    out.extend_from_slice(&stream_id.to_be_bytes());
    out.extend_from_slice(compressed_block);
    out
}

/// The S1 reference frame: PING with id 42.
pub fn ping_frame() -> Vec<u8> {
    control_frame(6, 0, &42u32.to_be_bytes())
}
