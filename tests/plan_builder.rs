use std::fs;

use layerbomb::plan::plan_from_directives;
use layerbomb::{BombError, Directive, PlanBuilder, Segment};
use num_bigint::BigUint;

#[test]
fn directives_apply_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tail.html");
    fs::write(&path, b"</body>").unwrap();

    let file_directive = format!("file:{}", path.display());
    let raw: [&str; 4] = ["text:<body>", "fill:0x20", &file_directive, "fill:x*3"];
    let directives = raw
        .iter()
        .map(|s| s.parse::<Directive>().unwrap())
        .collect::<Vec<_>>();
    let plan = plan_from_directives(BigUint::from(50u32), directives).unwrap();
    assert_eq!(
        plan.segments(),
        &[
            Segment::Literal(b"<body>".to_vec()),
            Segment::Fill { value: b' ', count: BigUint::from(50u32) },
            Segment::Literal(b"</body>".to_vec()),
            Segment::Fill { value: b'x', count: BigUint::from(3u32) },
        ]
    );
}

#[test]
fn missing_file_is_an_invalid_directive() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = PlanBuilder::new(BigUint::from(1u32));
    let err = builder
        .apply(Directive::File(dir.path().join("absent")))
        .unwrap_err();
    assert!(matches!(err, BombError::InvalidDirective(_)));
}

#[test]
fn single_byte_tile_is_a_fill() {
    let huge = BigUint::from(10u32).pow(40);
    let mut builder = PlanBuilder::new(huge.clone());
    builder.tile(b"-").unwrap();
    assert_eq!(
        builder.build().segments(),
        &[Segment::Fill { value: b'-', count: huge }]
    );
}

#[test]
fn wide_tile_respects_literal_limit() {
    let mut builder = PlanBuilder::new(BigUint::from(1000u32)).with_literal_limit(999);
    assert!(matches!(
        builder.tile(b"ab"),
        Err(BombError::SegmentTooLarge { len: 1000, limit: 999 })
    ));
}

#[test]
fn explicit_zero_fill_is_rejected() {
    let mut builder = PlanBuilder::new(BigUint::from(10u32));
    assert!(builder.fill_count(b'a', BigUint::from(0u32)).is_err());
    assert!(PlanBuilder::new(BigUint::from(0u32)).fill(b'a').is_err());
}

#[test]
fn reader_literal_is_copied() {
    let mut builder = PlanBuilder::new(BigUint::from(1u32));
    builder.literal_from(&b"from a reader"[..]).unwrap();
    assert_eq!(builder.build().virtual_len(), BigUint::from(13u32));
}
