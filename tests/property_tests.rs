use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use layerbomb::{build_bomb, state_of, state_of_plan, BombConfig, Codec, ContentPlan, EncodingSpec};
use num_bigint::BigUint;
use proptest::prelude::*;

fn peel(codec: Codec, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    match codec {
        Codec::Gzip => GzDecoder::new(bytes).read_to_end(&mut out),
        Codec::Deflate => ZlibDecoder::new(bytes).read_to_end(&mut out),
        Codec::DeflateRaw => DeflateDecoder::new(bytes).read_to_end(&mut out),
    }
    .unwrap();
    out
}

fn segment() -> impl Strategy<Value = (bool, Vec<u8>, u8, u32)> {
    (
        any::<bool>(),
        prop::collection::vec(any::<u8>(), 0..64),
        any::<u8>(),
        1u32..5000,
    )
}

fn codec() -> impl Strategy<Value = Codec> {
    prop::sample::select(Codec::ALL.to_vec())
}

proptest! {
    #[test]
    fn layers_decode_to_plan(
        segments in prop::collection::vec(segment(), 0..6),
        codecs in prop::collection::vec(codec(), 1..3),
    ) {
        let mut plan = ContentPlan::new();
        for (is_literal, bytes, value, count) in segments {
            if is_literal {
                plan.push_literal(&bytes);
            } else {
                plan.push_fill(value, BigUint::from(count));
            }
        }
        let expected = plan.materialize(usize::MAX).unwrap();
        let spec = EncodingSpec::new(codecs.clone());
        let bomb = build_bomb(plan, &spec, &BombConfig::default()).unwrap();

        let mut current = bomb.bytes().to_vec();
        for codec in codecs.iter().rev() {
            current = peel(*codec, &current);
        }
        prop_assert_eq!(current, expected);
    }

    #[test]
    fn plan_state_is_state_of_bytes(
        segments in prop::collection::vec(segment(), 0..8),
    ) {
        let mut plan = ContentPlan::new();
        for (is_literal, bytes, value, count) in segments {
            if is_literal {
                plan.push_literal(&bytes);
            } else {
                plan.push_fill(value, BigUint::from(count));
            }
        }
        let bytes = plan.materialize(usize::MAX).unwrap();
        prop_assert_eq!(state_of_plan(&plan).unwrap(), state_of(&bytes));
    }
}
