//! Per-direction header-block inflation.
//!
//! SPDY compresses the header blocks of SYN_STREAM / SYN_REPLY / HEADERS with
//! one stateful zlib stream per direction: decoding frame N depends on having
//! decoded frames 1..N-1 exactly once, in order. The inflater therefore lives
//! for the whole conversation, and callers must guarantee (via the
//! per-frame memo in [`crate::conversation`]) that no block is ever fed
//! twice.
//!
//! On failure the direction is poisoned but the zlib state is deliberately
//! not reset: a reset would desynchronise us from the peer's compressor and
//! turn one bad block into garbage for the rest of the capture.

use flate2::{Decompress, FlushDecompress, Status};
use tracing::warn;

use crate::error::Diagnostic;

use super::dictionary::{DICTIONARY_ADLER, SPDY_DICTIONARY};

/// Which peer's compressor produced a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client-to-server blocks (SYN_STREAM).
    Request,
    /// Server-to-client blocks (SYN_REPLY, and HEADERS by default policy).
    Reply,
}

/// One direction's long-lived inflate state.
pub struct HeaderInflater {
    stream: Decompress,
    poisoned: bool,
}

impl std::fmt::Debug for HeaderInflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderInflater")
            .field("total_in", &self.stream.total_in())
            .field("total_out", &self.stream.total_out())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl HeaderInflater {
    pub fn new() -> Self {
        Self {
            stream: Decompress::new(true),
            poisoned: false,
        }
    }

    /// Total compressed bytes this direction has consumed. Replaying a frame
    /// must leave this untouched.
    pub fn total_in(&self) -> u64 {
        self.stream.total_in()
    }

    /// True once an inflate error has desynchronised this direction.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Feeds one compressed header block and returns the decompressed bytes.
    ///
    /// The output buffer starts at `initial_capacity` and doubles while input
    /// remains, up to `max_size`. Every error poisons the direction: once the
    /// shared stream has swallowed part of a block there is no way back.
    pub fn inflate(
        &mut self,
        input: &[u8],
        initial_capacity: usize,
        max_size: usize,
    ) -> Result<Vec<u8>, Diagnostic> {
        if self.poisoned {
            return Err(Diagnostic::InflateFailed);
        }

        let mut out = Vec::with_capacity(initial_capacity.min(max_size));
        let start_in = self.stream.total_in();

        loop {
            let consumed = (self.stream.total_in() - start_in) as usize;
            if consumed >= input.len() {
                break;
            }

            if out.len() == out.capacity() {
                if out.capacity() >= max_size {
                    self.poisoned = true;
                    warn!(max = max_size, "header block exceeds decompression cap");
                    return Err(Diagnostic::OversizedHeaderBlock { max: max_size });
                }
                out.reserve(out.capacity().min(max_size - out.capacity()));
            }

            match self
                .stream
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
            {
                Ok(Status::StreamEnd) => break,
                Ok(Status::Ok) => {}
                Ok(Status::BufError) => {
                    // No forward progress. With spare output this means the
                    // block itself is short; return what we have and let the
                    // name/value parser flag the truncation.
                    if out.len() < out.capacity() {
                        break;
                    }
                }
                Err(err) => match err.needs_dictionary() {
                    Some(requested) if requested == *DICTIONARY_ADLER => {
                        if self.stream.set_dictionary(SPDY_DICTIONARY).is_err() {
                            self.poisoned = true;
                            return Err(Diagnostic::InflateFailed);
                        }
                    }
                    Some(requested) => {
                        self.poisoned = true;
                        warn!(
                            requested = format_args!("{requested:#010x}"),
                            expected = format_args!("{:#010x}", *DICTIONARY_ADLER),
                            "peer compressed against a different dictionary"
                        );
                        return Err(Diagnostic::DictionaryMismatch {
                            requested,
                            expected: *DICTIONARY_ADLER,
                        });
                    }
                    None => {
                        self.poisoned = true;
                        warn!(error = %err, "header inflation failed; direction poisoned");
                        return Err(Diagnostic::InflateFailed);
                    }
                },
            }
        }

        Ok(out)
    }
}

impl Default for HeaderInflater {
    fn default() -> Self {
        Self::new()
    }
}
