//! Dissector configuration and identification constants.

use serde::{Deserialize, Serialize};

/// Default plain-TCP port for SPDY.
pub const TCP_PORT: u16 = 6121;
/// Default TLS port, negotiated with the [`ALPN_LABEL`].
pub const TLS_PORT: u16 = 443;
/// ALPN protocol label used over TLS.
pub const ALPN_LABEL: &str = "spdy";

/// Which inflater decodes HEADERS frames on client-initiated streams.
///
/// The protocol allows HEADERS from either peer, but no known client sends
/// them, so decoding with the reply inflater matches observed traffic.
/// `ByStreamParity` is for captures of peers that do send client HEADERS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadersDirectionPolicy {
    #[default]
    AlwaysReply,
    ByStreamParity,
}

/// Tunable dissection behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpdyConfig {
    /// Reassemble bodies that span multiple DATA frames (default: true).
    ///
    /// When disabled only the per-stream frame count is maintained; bodies
    /// spanning several frames are never delivered.
    pub assemble_entity_bodies: bool,

    /// Decompress SYN_STREAM / SYN_REPLY / HEADERS header blocks
    /// (default: true).
    ///
    /// When disabled the compressed block is carried through undecoded and
    /// no stream metadata is learned.
    pub decompress_headers: bool,

    /// Inflate gzip/deflate entity bodies after reassembly (default: true).
    pub decompress_body: bool,

    /// Emit verbose per-frame trace events (default: false).
    pub debug_trace: bool,

    /// Inflater selection for HEADERS frames on odd streams.
    pub headers_direction: HeadersDirectionPolicy,

    /// Cap on a single decompressed header block (default: 1 MiB).
    ///
    /// Bounds worst-case memory from adversarial input; exceeding it
    /// abandons the block and poisons the direction, since the shared
    /// inflate state has already consumed part of it.
    pub max_header_block_size: usize,

    /// Initial decompression buffer size (default: 16 KiB). Grows by
    /// doubling up to the cap.
    pub header_block_initial_capacity: usize,
}

impl Default for SpdyConfig {
    fn default() -> Self {
        Self {
            assemble_entity_bodies: true,
            decompress_headers: true,
            decompress_body: true,
            debug_trace: false,
            headers_direction: HeadersDirectionPolicy::default(),
            max_header_block_size: 1024 * 1024,
            header_block_initial_capacity: 16 * 1024,
        }
    }
}

impl SpdyConfig {
    /// Validate configuration values are within reasonable bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_header_block_size == 0 {
            return Err("max_header_block_size must be non-zero".into());
        }
        if self.header_block_initial_capacity == 0 {
            return Err("header_block_initial_capacity must be non-zero".into());
        }
        if self.header_block_initial_capacity > self.max_header_block_size {
            return Err("header_block_initial_capacity cannot exceed max_header_block_size".into());
        }
        Ok(())
    }
}
