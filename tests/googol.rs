use std::io::Read;

use flate2::read::GzDecoder;
use layerbomb::{build_bomb, BombConfig, Codec, EncodingSpec, PlanBuilder};
use num_bigint::BigUint;

fn googol() -> BigUint {
    BigUint::from(10u32).pow(100)
}

#[test]
fn googol_bytes_fit_in_forty_layers() {
    let mut builder = PlanBuilder::new(googol());
    builder.literal("<html>");
    builder.fill(b' ').unwrap();
    builder.literal("</html>");
    let spec = EncodingSpec::repeated(Codec::Gzip, 40);
    let bomb = build_bomb(builder.build(), &spec, &BombConfig::default()).unwrap();

    assert_eq!(bomb.decoded_len(), &(googol() + 13u32));
    assert!(bomb.bytes().len() < 64 * 1024, "{} bytes", bomb.bytes().len());
    assert!(bomb.ratio() > 1e90);

    let layers = bomb.layers();
    assert_eq!(layers.len(), 40);
    for pair in layers.windows(2) {
        assert_eq!(pair[0].encoded_len, pair[1].decoded_len);
    }
    assert_eq!(layers[39].encoded_len, BigUint::from(bomb.bytes().len()));
}

#[test]
fn outer_layers_carry_correct_trailers() {
    let mut builder = PlanBuilder::new(googol());
    builder.fill(b'z').unwrap();
    let spec = EncodingSpec::repeated(Codec::Gzip, 40);
    let bomb = build_bomb(builder.build(), &spec, &BombConfig::default()).unwrap();

    // Peel layers from the outside while they stay small; GzDecoder checks
    // every CRC-32 and ISIZE on the way.
    let mut current = bomb.bytes().to_vec();
    let mut peeled = 0;
    for report in bomb.layers().iter().rev() {
        if report.decoded_len > BigUint::from(1u32 << 20) {
            break;
        }
        let mut out = Vec::new();
        GzDecoder::new(&current[..]).read_to_end(&mut out).unwrap();
        assert_eq!(BigUint::from(out.len()), report.decoded_len);
        assert_eq!(crc32fast::hash(&out), report.crc32);
        current = out;
        peeled += 1;
    }
    assert!(peeled >= 5, "only {peeled} layers were small enough to peel");
}
