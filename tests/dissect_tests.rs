mod common;

use common::{control_frame, data_frame, ping_frame};
use spdytap::{
    Conversation, DesegmentNeed, DissectResult, Dissector, FramePayload, Segment,
};

fn segment(bytes: &[u8], frame_index: u32) -> Segment<'_> {
    Segment {
        bytes,
        frame_index,
        visited: false,
    }
}

/// A small mixed stream of frames: PING, RST_STREAM, DATA, WINDOW_UPDATE.
fn sample_stream() -> Vec<u8> {
    let mut bytes = ping_frame();
    bytes.extend_from_slice(&control_frame(
        3,
        0,
        &[0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x05],
    ));
    bytes.extend_from_slice(&data_frame(5, 0x01, b"abc"));
    bytes.extend_from_slice(&control_frame(
        9,
        0,
        &[0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x10, 0x00],
    ));
    bytes
}

fn payload_shapes(result: &DissectResult) -> Vec<(FramePayload, String)> {
    result
        .records
        .iter()
        .map(|r| (r.payload.clone(), r.info.clone()))
        .collect()
}

#[test]
fn test_split_frame_requests_more_segments() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let ping = ping_frame();

    // Fewer than 8 bytes: the driver cannot even read the length yet.
    let result = dissector.dissect(&mut conv, &segment(&ping[..4], 1));
    assert_eq!(result.consumed, 0);
    assert!(result.records.is_empty());
    let marker = result.desegment.unwrap();
    assert_eq!(marker.offset, 0);
    assert_eq!(marker.need, DesegmentNeed::OneMoreSegment);

    // The feeder honours the marker and calls again with the whole frame.
    let result = dissector.dissect(&mut conv, &segment(&ping, 1));
    assert_eq!(result.consumed, 12);
    assert_eq!(result.records[0].payload, FramePayload::Ping { id: 42 });
}

#[test]
fn test_split_after_header_requests_exact_deficit() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let ping = ping_frame();

    let result = dissector.dissect(&mut conv, &segment(&ping[..10], 1));
    assert_eq!(result.consumed, 0);
    let marker = result.desegment.unwrap();
    assert_eq!(marker.offset, 0);
    assert_eq!(marker.need, DesegmentNeed::Bytes(2));
}

#[test]
fn test_partial_second_frame_reports_consumed_offset() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let mut bytes = ping_frame();
    let rst = control_frame(3, 0, &[0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x05]);
    bytes.extend_from_slice(&rst[..6]);

    let result = dissector.dissect(&mut conv, &segment(&bytes, 1));
    assert_eq!(result.consumed, 12);
    assert_eq!(result.records.len(), 1);
    let marker = result.desegment.unwrap();
    assert_eq!(marker.offset, 12);
    assert_eq!(marker.need, DesegmentNeed::OneMoreSegment);
}

#[test]
fn test_desegmentation_is_split_independent() {
    let bytes = sample_stream();
    let dissector = Dissector::with_defaults();

    // Reference: the whole stream in one buffer.
    let mut conv = Conversation::new();
    let reference = payload_shapes(&dissector.dissect(&mut conv, &segment(&bytes, 1)));
    assert_eq!(reference.len(), 4);

    // Any split point: feed the prefix, then resume from the consumed
    // offset with the rest, as the transport feeder would.
    for split in 1..bytes.len() {
        let mut conv = Conversation::new();
        let mut shapes = Vec::new();

        let first = dissector.dissect(&mut conv, &segment(&bytes[..split], 1));
        shapes.extend(payload_shapes(&first));
        let resume = first.consumed;
        assert!(
            first.desegment.is_some() || resume == split,
            "split {split}: neither a marker nor a clean frame boundary"
        );

        let second = dissector.dissect(&mut conv, &segment(&bytes[resume..], 2));
        shapes.extend(payload_shapes(&second));
        assert_eq!(second.consumed, bytes.len() - resume);

        assert_eq!(shapes, reference, "split at {split} changed the decode");
    }
}

#[test]
fn test_info_column_is_fenced_across_frames() {
    let mut bytes = ping_frame();
    bytes.extend_from_slice(&control_frame(
        3,
        0,
        &[0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x05],
    ));

    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let result = dissector.dissect(&mut conv, &segment(&bytes, 1));
    assert_eq!(result.info, "PING ID=42, RST_STREAM[7] CANCEL");
}

#[test]
fn test_heuristic_rejects_non_spdy_first_byte() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();

    let buf = [0x7F, 0x03, 0x00, 0x06, 0x00, 0x00, 0x00, 0x04];
    assert!(dissector.probe(&mut conv, &segment(&buf, 1)).is_none());
    assert!(conv.streams.is_empty());
}

#[test]
fn test_heuristic_rejects_when_no_frame_completes() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let ping = ping_frame();

    // Plausible first byte but not one whole frame available.
    assert!(dissector.probe(&mut conv, &segment(&ping[..4], 1)).is_none());
    assert!(dissector.probe(&mut conv, &segment(&ping[..10], 1)).is_none());
}

#[test]
fn test_heuristic_accepts_spdy() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();

    let result = dissector.probe(&mut conv, &segment(&ping_frame(), 1)).unwrap();
    assert_eq!(result.consumed, 12);
    assert_eq!(result.records[0].payload, FramePayload::Ping { id: 42 });

    // DATA frames start with 0x00 and pass the first-byte test too.
    let mut conv = Conversation::new();
    let data = data_frame(1, 0, b"xyz");
    assert!(dissector.probe(&mut conv, &segment(&data, 1)).is_some());
}

#[test]
fn test_empty_buffer_is_a_clean_noop() {
    let dissector = Dissector::with_defaults();
    let mut conv = Conversation::new();
    let result = dissector.dissect(&mut conv, &segment(&[], 1));
    assert_eq!(result.consumed, 0);
    assert!(result.records.is_empty());
    assert!(result.desegment.is_none());
}
