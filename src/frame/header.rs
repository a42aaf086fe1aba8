//! Common 8-byte frame prefix parser.

use crate::cursor::Cursor;
use crate::error::Truncated;

use super::{ControlType, FrameDescriptor, FrameHeader, StreamId};

impl FrameHeader {
    /// Decodes the 8-byte common prefix, consuming exactly 8 bytes.
    ///
    /// Out-of-range control type codes still yield a header (with an
    /// [`FrameDescriptor::UnknownControl`] descriptor) so the driver can
    /// consume the declared `8 + length` bytes and re-sync.
    pub fn parse(cur: &mut Cursor<'_>) -> Result<FrameHeader, Truncated> {
        let control = cur.bit(0)?;

        let descriptor = if control {
            let version = cur.bits(1, 15)? as u16;
            cur.skip(2)?;
            let code = cur.u16_be()?;
            match ControlType::from_code(code) {
                Some(kind) => FrameDescriptor::Control { version, kind },
                None => FrameDescriptor::UnknownControl { version, code },
            }
        } else {
            let stream_id = StreamId::new(cur.u32_be()?);
            FrameDescriptor::Data { stream_id }
        };

        let flags = cur.u8()?;
        let length = cur.u24_be()?;

        Ok(FrameHeader {
            descriptor,
            flags,
            length,
        })
    }
}
