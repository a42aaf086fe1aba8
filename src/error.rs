//! Diagnostic kinds attached to decode records.
//!
//! The dissector never throws decode failures at the caller: every frame
//! produces exactly one record, and anything that went wrong while decoding
//! it is attached to that record as a [`Diagnostic`]. Only the byte cursor
//! uses `Result` internally, and its [`Truncated`] error is converted into a
//! diagnostic at the frame boundary.

use thiserror::Error;

/// Short read while extracting a field.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("not enough bytes: needed {needed}, had {remaining}")]
pub struct Truncated {
    /// Bytes the field demanded.
    pub needed: usize,
    /// Bytes that were actually left.
    pub remaining: usize,
}

/// Per-frame diagnostic annotations.
///
/// Structural kinds (`Truncated`, `Malformed*`) terminate decoding of the
/// current frame only; the driver advances by the frame's declared length and
/// re-syncs on the next one. `InflateFailed` and `DictionaryMismatch` poison
/// header decoding for one direction but leave framing intact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Fewer bytes than a field demands.
    #[error("truncated frame: needed {needed}, had {remaining}")]
    Truncated { needed: usize, remaining: usize },

    /// Control-frame type code outside the enumerated set.
    #[error("invalid control frame type: {0}")]
    MalformedType(u16),

    /// Control-frame version below the supported minimum.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// SETTINGS frame too small for its own entry count.
    #[error("SETTINGS frame too small: length {length} for {entries} entries")]
    MalformedSettings { length: u32, entries: u32 },

    /// Decompressed header block does not hold its declared pair count.
    #[error("malformed header block: {declared} pairs declared, {remaining} bytes remain")]
    MalformedHeaderBlock { declared: u32, remaining: usize },

    /// RST_STREAM status code outside the defined range.
    #[error("invalid RST_STREAM status: {0}")]
    MalformedRstStream(u32),

    /// Header decompression failed; the direction's inflater is poisoned.
    #[error("header inflation failed")]
    InflateFailed,

    /// Peer asked for a different preset dictionary than ours.
    #[error("peer requested dictionary {requested:#010x}, ours is {expected:#010x}")]
    DictionaryMismatch { requested: u32, expected: u32 },

    /// Entity-body decompression failed; the raw bytes are retained.
    #[error("entity body decompression failed; compressed bytes retained")]
    BodyInflateFailed,

    /// Decompressed header block exceeded the configured cap.
    #[error("decompressed header block exceeds {max} bytes")]
    OversizedHeaderBlock { max: usize },

    /// A second SYN-style registration arrived for an occupied stream slot.
    #[error("stream {0} already has recorded metadata")]
    StreamAlreadyRegistered(u32),
}

impl From<Truncated> for Diagnostic {
    fn from(t: Truncated) -> Self {
        Diagnostic::Truncated {
            needed: t.needed,
            remaining: t.remaining,
        }
    }
}
