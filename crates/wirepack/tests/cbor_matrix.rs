use hex_literal::hex;
use proptest::prelude::*;
use time::macros::datetime;
use wirepack::{CborHandle, CodecError, Decoder, RawExt, Value};

fn encode(h: &CborHandle, v: &Value) -> Vec<u8> {
    h.encode_value(v).unwrap()
}

#[test]
fn rfc8949_appendix_vectors() {
    let h = CborHandle::new();
    assert_eq!(encode(&h, &Value::Uint(0)), hex!("00"));
    assert_eq!(encode(&h, &Value::Uint(10)), hex!("0a"));
    assert_eq!(encode(&h, &Value::Uint(500)), hex!("1901f4"));
    assert_eq!(encode(&h, &Value::Int(-500)), hex!("3901f3"));
    assert_eq!(encode(&h, &Value::Str("IETF".into())), hex!("6449455446"));
    assert_eq!(
        encode(&h, &Value::Float(1.1)),
        hex!("fb3ff199999999999a")
    );
    assert_eq!(
        encode(
            &h,
            &Value::Array(vec![
                Value::Uint(1),
                Value::Array(vec![Value::Uint(2), Value::Uint(3)]),
            ])
        ),
        hex!("8201820203")
    );
    assert_eq!(
        encode(
            &h,
            &Value::Map(vec![
                (Value::Str("a".into()), Value::Uint(1)),
                (
                    Value::Str("b".into()),
                    Value::Array(vec![Value::Uint(2), Value::Uint(3)]),
                ),
            ])
        ),
        hex!("a26161016162820203")
    );
}

#[test]
fn canonical_maps_sort_by_encoded_key() {
    let mut h = CborHandle::new();
    h.basic.canonical = true;
    let v = Value::Map(vec![
        (Value::Str("b".into()), Value::Uint(2)),
        (Value::Uint(10), Value::Uint(3)),
        (Value::Str("a".into()), Value::Uint(1)),
    ]);
    // 0x0a sorts before the 0x61.. text keys
    assert_eq!(encode(&h, &v), hex!("a30a03616101616202"));
}

#[test]
fn optimum_size_downsizes_exact_floats() {
    let mut h = CborHandle::new();
    h.optimum_size = true;
    assert_eq!(encode(&h, &Value::Float(1.5)), hex!("f93e00"));
    assert_eq!(encode(&h, &Value::Float(0.0)), hex!("f90000"));
    assert_eq!(encode(&h, &Value::Float(65504.0)), hex!("f97bff"));
    // not representable below f64
    assert_eq!(encode(&h, &Value::Float(1.1)), hex!("fb3ff199999999999a"));
    for v in [Value::Float(1.5), Value::Float(65504.0), Value::Float(1.1)] {
        assert_eq!(h.decode_value(&encode(&h, &v)).unwrap(), v);
    }
}

#[test]
fn indefinite_length_round_trips() {
    let mut h = CborHandle::new();
    h.indefinite_length = true;
    let v = Value::Array(vec![
        Value::Uint(1),
        Value::Str("streaming".into()),
        Value::Map(vec![(Value::Str("k".into()), Value::Bytes(vec![9; 40]))]),
    ]);
    let bytes = encode(&h, &v);
    assert_eq!(bytes[0], 0x9f);
    assert_eq!(*bytes.last().unwrap(), 0xff);
    assert_eq!(h.decode_value(&bytes).unwrap(), v);
    // a plain handle reads the same stream
    assert_eq!(CborHandle::new().decode_value(&bytes).unwrap(), v);
}

#[test]
fn epoch_and_rfc3339_times() {
    let h = CborHandle::new();
    let t = Value::Time(datetime!(2013-03-21 20:04:00 UTC));
    assert_eq!(encode(&h, &t), hex!("c11a514b67b0"));
    assert_eq!(h.decode_value(&hex!("c11a514b67b0")).unwrap(), t);

    let mut h3339 = CborHandle::new();
    h3339.time_rfc3339 = true;
    let bytes = encode(&h3339, &t);
    assert_eq!(bytes[0], 0xc0);
    assert_eq!(h.decode_value(&bytes).unwrap(), t);
}

#[test]
fn self_describing_extension_nests_full_values() {
    let mut h = CborHandle::new();
    h.extensions_mut().register_self_describing(40).unwrap();
    let inner = Value::Map(vec![(Value::Str("n".into()), Value::Int(-7))]);
    let v = Value::Ext(RawExt::with_value(40, inner.clone()));
    let bytes = encode(&h, &v);
    // tag 40 wrapping a byte-string payload
    assert_eq!(bytes[..2], hex!("d828"));
    assert_eq!(h.decode_value(&bytes).unwrap(), inner);
}

#[test]
fn streaming_reader_decodes_incrementally() {
    let h = CborHandle::new();
    let v = Value::Array(vec![Value::Str("x".repeat(10_000)), Value::Uint(7)]);
    let bytes = encode(&h, &v);
    let mut dec = h.decoder_from(std::io::Cursor::new(bytes));
    assert_eq!(wirepack::read_value(&mut dec).unwrap(), v);
}

#[test]
fn hostile_announced_length_fails_without_allocating() {
    let h = CborHandle::new();
    // array claiming u64::MAX elements, then nothing
    let err = h.decode_value(&hex!("9bffffffffffffffff")).unwrap_err();
    assert!(matches!(err, CodecError::Truncated { .. }));
}

#[test]
fn depth_limit_applies() {
    let mut h = CborHandle::new();
    h.basic.max_depth = 3;
    let mut bytes = vec![0x81u8; 5];
    bytes.push(0x00);
    assert!(matches!(
        h.decode_value(&bytes).unwrap_err(),
        CodecError::DepthExceeded
    ));
}

#[test]
fn next_value_bytes_detaches_exact_spans() {
    let h = CborHandle::new();
    let bytes = hex!("82a1616101f5");
    let mut dec = h.decoder(&bytes);
    assert_eq!(dec.read_array_start().unwrap(), wirepack::Len::Known(2));
    let raw = dec.next_value_bytes().unwrap();
    assert_eq!(raw, hex!("a1616101"));
    assert!(dec.decode_bool().unwrap());
    assert_eq!(
        dec.value_from_slice(&raw).unwrap(),
        Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
    );
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<u64>().prop_map(Value::Uint),
        (i64::MIN..0).prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::Float),
        ".{0,32}".prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((".{0,8}".prop_map(Value::Str), inner), 0..4)
                .prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn round_trips_any_tree(v in arb_value()) {
        let h = CborHandle::new();
        prop_assert_eq!(h.decode_value(&h.encode_value(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn indefinite_encoding_stays_equivalent(v in arb_value()) {
        let mut h = CborHandle::new();
        h.indefinite_length = true;
        prop_assert_eq!(h.decode_value(&h.encode_value(&v).unwrap()).unwrap(), v);
    }
}
