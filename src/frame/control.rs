//! Type-specific control payload dissection.
//!
//! Parses the payload that follows the common prefix into a
//! [`ControlPayload`]. Compressed header blocks are carried through as raw
//! bytes at this layer; decompression and name/value parsing happen in the
//! driver, which owns the per-conversation inflate state.

use bytes::Bytes;

use crate::cursor::Cursor;
use crate::error::Diagnostic;

use super::{ControlType, StreamId};

/// RST_STREAM status code. Codes 1..=11 are defined by the protocol; anything
/// else is carried as `Unknown` and flagged on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RstStatus {
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    Cancel,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
    InvalidCredentials,
    FrameTooLarge,
    Unknown(u32),
}

impl RstStatus {
    pub fn from_wire(code: u32) -> Self {
        match code {
            1 => RstStatus::ProtocolError,
            2 => RstStatus::InvalidStream,
            3 => RstStatus::RefusedStream,
            4 => RstStatus::UnsupportedVersion,
            5 => RstStatus::Cancel,
            6 => RstStatus::InternalError,
            7 => RstStatus::FlowControlError,
            8 => RstStatus::StreamInUse,
            9 => RstStatus::StreamAlreadyClosed,
            10 => RstStatus::InvalidCredentials,
            11 => RstStatus::FrameTooLarge,
            other => RstStatus::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            RstStatus::ProtocolError => 1,
            RstStatus::InvalidStream => 2,
            RstStatus::RefusedStream => 3,
            RstStatus::UnsupportedVersion => 4,
            RstStatus::Cancel => 5,
            RstStatus::InternalError => 6,
            RstStatus::FlowControlError => 7,
            RstStatus::StreamInUse => 8,
            RstStatus::StreamAlreadyClosed => 9,
            RstStatus::InvalidCredentials => 10,
            RstStatus::FrameTooLarge => 11,
            RstStatus::Unknown(code) => code,
        }
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            RstStatus::ProtocolError => Some("PROTOCOL_ERROR"),
            RstStatus::InvalidStream => Some("INVALID_STREAM"),
            RstStatus::RefusedStream => Some("REFUSED_STREAM"),
            RstStatus::UnsupportedVersion => Some("UNSUPPORTED_VERSION"),
            RstStatus::Cancel => Some("CANCEL"),
            RstStatus::InternalError => Some("INTERNAL_ERROR"),
            RstStatus::FlowControlError => Some("FLOW_CONTROL_ERROR"),
            RstStatus::StreamInUse => Some("STREAM_IN_USE"),
            RstStatus::StreamAlreadyClosed => Some("STREAM_ALREADY_CLOSED"),
            RstStatus::InvalidCredentials => Some("INVALID_CREDENTIALS"),
            RstStatus::FrameTooLarge => Some("FRAME_TOO_LARGE"),
            RstStatus::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for RstStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown ({})", self.to_wire()),
        }
    }
}

/// SETTINGS entry identifier (24-bit on the wire). Ids 1..=7 are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingId {
    UploadBandwidth,
    DownloadBandwidth,
    RoundTripTime,
    MaxConcurrentStreams,
    CurrentCwnd,
    DownloadRetransRate,
    InitialWindowSize,
    Unknown(u32),
}

impl SettingId {
    pub fn from_wire(id: u32) -> Self {
        match id {
            1 => SettingId::UploadBandwidth,
            2 => SettingId::DownloadBandwidth,
            3 => SettingId::RoundTripTime,
            4 => SettingId::MaxConcurrentStreams,
            5 => SettingId::CurrentCwnd,
            6 => SettingId::DownloadRetransRate,
            7 => SettingId::InitialWindowSize,
            other => SettingId::Unknown(other),
        }
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            SettingId::UploadBandwidth => Some("UPLOAD_BANDWIDTH"),
            SettingId::DownloadBandwidth => Some("DOWNLOAD_BANDWIDTH"),
            SettingId::RoundTripTime => Some("ROUND_TRIP_TIME"),
            SettingId::MaxConcurrentStreams => Some("MAX_CONCURRENT_STREAMS"),
            SettingId::CurrentCwnd => Some("CURRENT_CWND"),
            SettingId::DownloadRetransRate => Some("DOWNLOAD_RETRANS_RATE"),
            SettingId::InitialWindowSize => Some("INITIAL_WINDOW_SIZE"),
            SettingId::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for SettingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingId::Unknown(id) => write!(f, "Unknown({})", id),
            known => f.write_str(known.name().unwrap_or("?")),
        }
    }
}

/// One SETTINGS entry: `{u8 flags, u24 id, u32 value}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub flags: u8,
    pub id: SettingId,
    pub value: u32,
}

/// Structurally parsed control payload. Header blocks are still compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPayload {
    SynStream {
        stream_id: StreamId,
        associated_stream_id: StreamId,
        /// 0 (highest) to 7 (lowest).
        priority: u8,
        /// Credential slot.
        slot: u8,
        header_block: Bytes,
    },
    SynReply {
        stream_id: StreamId,
        header_block: Bytes,
    },
    Headers {
        stream_id: StreamId,
        header_block: Bytes,
    },
    RstStream {
        stream_id: StreamId,
        status: RstStatus,
    },
    Settings {
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
}

/// Dissects one control payload.
///
/// `Err` carries a structural diagnostic (the frame is still consumed by the
/// driver); `Ok` may carry an advisory diagnostic such as an out-of-range
/// RST_STREAM status.
pub fn parse_control_payload(
    kind: ControlType,
    payload: &[u8],
) -> Result<(ControlPayload, Option<Diagnostic>), Diagnostic> {
    let mut cur = Cursor::new(payload);
    match kind {
        ControlType::SynStream => {
            let stream_id = StreamId::new(cur.u32_be()?);
            let associated_stream_id = StreamId::new(cur.u32_be()?);
            let priority = (cur.bits(0, 3)? as u8) & 0x07;
            cur.skip(1)?;
            let slot = cur.u8()?;
            Ok((
                ControlPayload::SynStream {
                    stream_id,
                    associated_stream_id,
                    priority,
                    slot,
                    header_block: Bytes::copy_from_slice(cur.rest()),
                },
                None,
            ))
        }
        ControlType::SynReply => {
            let stream_id = StreamId::new(cur.u32_be()?);
            Ok((
                ControlPayload::SynReply {
                    stream_id,
                    header_block: Bytes::copy_from_slice(cur.rest()),
                },
                None,
            ))
        }
        ControlType::Headers => {
            let stream_id = StreamId::new(cur.u32_be()?);
            Ok((
                ControlPayload::Headers {
                    stream_id,
                    header_block: Bytes::copy_from_slice(cur.rest()),
                },
                None,
            ))
        }
        ControlType::RstStream => {
            let stream_id = StreamId::new(cur.u32_be()?);
            let code = cur.u32_be()?;
            let status = RstStatus::from_wire(code);
            let note = match status {
                RstStatus::Unknown(code) => Some(Diagnostic::MalformedRstStream(code)),
                _ => None,
            };
            Ok((ControlPayload::RstStream { stream_id, status }, note))
        }
        ControlType::Settings => parse_settings(payload),
        ControlType::Ping => {
            let id = cur.u32_be()?;
            Ok((ControlPayload::Ping { id }, None))
        }
        ControlType::Goaway => {
            let last_good_stream_id = StreamId::new(cur.u32_be()?);
            let status = cur.u32_be()?;
            Ok((
                ControlPayload::Goaway {
                    last_good_stream_id,
                    status,
                },
                None,
            ))
        }
        ControlType::WindowUpdate => {
            let stream_id = StreamId::new(cur.u32_be()?);
            let delta = cur.u32_be()? & 0x7FFF_FFFF;
            Ok((ControlPayload::WindowUpdate { stream_id, delta }, None))
        }
        ControlType::Noop => Ok((ControlPayload::Noop, None)),
        ControlType::Credential => Ok((
            ControlPayload::Credential {
                payload: Bytes::copy_from_slice(payload),
            },
            None,
        )),
    }
}

fn parse_settings(payload: &[u8]) -> Result<(ControlPayload, Option<Diagnostic>), Diagnostic> {
    let length = payload.len() as u32;
    if length < 4 {
        return Err(Diagnostic::MalformedSettings { length, entries: 0 });
    }

    let mut cur = Cursor::new(payload);
    let count = cur.u32_be()?;

    // A well-formed frame holds the count word plus 8 bytes per entry.
    if u64::from(length) < 4 + 8 * u64::from(count) {
        return Err(Diagnostic::MalformedSettings {
            length,
            entries: count,
        });
    }

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = cur.u8()?;
        let id = SettingId::from_wire(cur.u24_be()?);
        let value = cur.u32_be()?;
        entries.push(Setting { flags, id, value });
    }

    Ok((ControlPayload::Settings { entries }, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syn_stream_payload() {
        // stream 1, associated 0, priority 2, slot 0, empty block.
        let payload = [
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00,
        ];
        let (parsed, note) = parse_control_payload(ControlType::SynStream, &payload).unwrap();
        assert!(note.is_none());
        match parsed {
            ControlPayload::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                slot,
                header_block,
            } => {
                assert_eq!(stream_id.value(), 1);
                assert_eq!(associated_stream_id.value(), 0);
                assert_eq!(priority, 2);
                assert_eq!(slot, 0);
                assert!(header_block.is_empty());
            }
            other => panic!("Expected SYN_STREAM payload, got {:?}", other),
        }
    }

    #[test]
    fn test_syn_stream_masks_reserved_bits() {
        let payload = [
            0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0x00, 0x02, 0x00, 0x00,
        ];
        let (parsed, _) = parse_control_payload(ControlType::SynStream, &payload).unwrap();
        match parsed {
            ControlPayload::SynStream {
                stream_id,
                associated_stream_id,
                ..
            } => {
                assert_eq!(stream_id.value(), 0x7FFF_FFFF);
                assert_eq!(associated_stream_id.value(), 2);
            }
            other => panic!("Expected SYN_STREAM payload, got {:?}", other),
        }
    }

    #[test]
    fn test_rst_stream_known_status() {
        let payload = [0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x05];
        let (parsed, note) = parse_control_payload(ControlType::RstStream, &payload).unwrap();
        assert!(note.is_none());
        match parsed {
            ControlPayload::RstStream { stream_id, status } => {
                assert_eq!(stream_id.value(), 7);
                assert_eq!(status, RstStatus::Cancel);
                assert_eq!(status.to_string(), "CANCEL");
            }
            other => panic!("Expected RST_STREAM payload, got {:?}", other),
        }
    }

    #[test]
    fn test_rst_stream_unknown_status_is_reported() {
        let payload = [0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x63];
        let (parsed, note) = parse_control_payload(ControlType::RstStream, &payload).unwrap();
        assert_eq!(note, Some(Diagnostic::MalformedRstStream(99)));
        match parsed {
            ControlPayload::RstStream { status, .. } => {
                assert_eq!(status, RstStatus::Unknown(99));
            }
            other => panic!("Expected RST_STREAM payload, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_entries() {
        let payload = [
            0x00, 0x00, 0x00, 0x02, // 2 entries
            0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x64, // PERSIST_VALUE, MAX_CONCURRENT_STREAMS=100
            0x00, 0x00, 0x00, 0x07, 0x00, 0x01, 0x00, 0x00, // INITIAL_WINDOW_SIZE=65536
        ];
        let (parsed, _) = parse_control_payload(ControlType::Settings, &payload).unwrap();
        match parsed {
            ControlPayload::Settings { entries } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].id, SettingId::MaxConcurrentStreams);
                assert_eq!(entries[0].flags, crate::frame::SETTINGS_FLAG_PERSIST_VALUE);
                assert_eq!(entries[0].value, 100);
                assert_eq!(entries[1].id, SettingId::InitialWindowSize);
                assert_eq!(entries[1].value, 65536);
            }
            other => panic!("Expected SETTINGS payload, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_too_small_for_count() {
        // Claims one entry but carries a single payload byte after the count.
        let payload = [0x00, 0x00, 0x00, 0x01, 0x00];
        let err = parse_control_payload(ControlType::Settings, &payload).unwrap_err();
        assert_eq!(
            err,
            Diagnostic::MalformedSettings {
                length: 5,
                entries: 1
            }
        );
    }

    #[test]
    fn test_settings_shorter_than_count_word() {
        let payload = [0x00, 0x00];
        let err = parse_control_payload(ControlType::Settings, &payload).unwrap_err();
        assert_eq!(
            err,
            Diagnostic::MalformedSettings {
                length: 2,
                entries: 0
            }
        );
    }

    #[test]
    fn test_window_update() {
        let payload = [0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x10, 0x00];
        let (parsed, _) = parse_control_payload(ControlType::WindowUpdate, &payload).unwrap();
        match parsed {
            ControlPayload::WindowUpdate { stream_id, delta } => {
                assert_eq!(stream_id.value(), 3);
                assert_eq!(delta, 4096);
            }
            other => panic!("Expected WINDOW_UPDATE payload, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_ping() {
        let err = parse_control_payload(ControlType::Ping, &[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Diagnostic::Truncated { .. }));
    }
}
