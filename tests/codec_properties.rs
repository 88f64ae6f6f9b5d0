//! Property tests for framing and payload codecs.

use neural_link::codec::{DriveCodec, DriveId, EventCodec, EventDescriptor, EventKind, TrustCodec};
use neural_link::protocol::{encode, FrameDecoder, FrameEvent, START_MARKER};
use proptest::prelude::*;

fn frames(events: &[FrameEvent]) -> Vec<(u8, Vec<u8>)> {
    events
        .iter()
        .filter_map(|e| match e {
            FrameEvent::FrameReady(f) => Some((f.command(), f.payload().to_vec())),
            _ => None,
        })
        .collect()
}

fn no_marker() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("start marker", |b| *b != START_MARKER)
}

proptest! {
    #[test]
    fn decode_recovers_encoded_frame(
        command in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let bytes = encode(command, &payload).unwrap();
        let mut decoder = FrameDecoder::new();

        let events = decoder.push(&bytes);
        prop_assert_eq!(frames(&events), vec![(command, payload)]);
        prop_assert!(decoder.is_idle());
    }

    #[test]
    fn chunking_does_not_change_result(
        command in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..128),
        split in any::<prop::sample::Index>(),
    ) {
        let bytes = encode(command, &payload).unwrap();
        let at = split.index(bytes.len() + 1);
        let mut decoder = FrameDecoder::new();

        let mut events = decoder.push(&bytes[..at]);
        events.extend(decoder.push(&bytes[at..]));
        prop_assert_eq!(frames(&events), vec![(command, payload)]);
    }

    #[test]
    fn noise_before_frame_is_invisible(
        noise in prop::collection::vec(no_marker(), 0..64),
        command in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut stream = noise;
        stream.extend_from_slice(&encode(command, &payload).unwrap());
        let mut decoder = FrameDecoder::new();

        let events = decoder.push(&stream);
        prop_assert_eq!(events.len(), 1);
        prop_assert_eq!(frames(&events), vec![(command, payload)]);
    }

    #[test]
    fn single_bit_flip_after_header_is_detected(
        command in no_marker(),
        payload in prop::collection::vec(no_marker(), 0..64),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = encode(command, &payload).unwrap().to_vec();
        // Command, payload, or checksum byte.
        let at = 3 + position.index(bytes.len() - 3);
        bytes[at] ^= 1 << bit;
        prop_assume!(bytes[at] != START_MARKER);
        let mut decoder = FrameDecoder::new();

        let events = decoder.push(&bytes);
        prop_assert_eq!(events, vec![FrameEvent::Corrupt]);
        prop_assert_eq!(decoder.stats().corrupt, 1);
    }

    #[test]
    fn drive_values_bounded(id in any::<u8>(), value in any::<u8>()) {
        let result = DriveCodec::encode_set(DriveId(id), value);
        if value <= 100 {
            prop_assert_eq!(result.unwrap(), [id, value]);
        } else {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn drive_list_pairs(payload in prop::collection::vec(any::<u8>(), 0..64)) {
        let readings = DriveCodec::decode_list(&payload);
        prop_assert_eq!(readings.len(), payload.len() / 2);
    }

    #[test]
    fn valence_scaling_is_monotonic(a in -1.0f32..=1.0, b in -1.0f32..=1.0) {
        let scaled = |v: f32| {
            let record = EventCodec::encode(&EventDescriptor::new(EventKind::Fed, "x", v).at(0))
                .unwrap();
            u16::from_be_bytes([record[32], record[33]])
        };
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(scaled(lo) <= scaled(hi));
    }

    #[test]
    fn trust_in_unit_range(payload in prop::collection::vec(any::<u8>(), 0..8)) {
        let trust = TrustCodec::decode(&payload);
        prop_assert!((0.0..=1.0).contains(&trust));
    }
}
