use hex_literal::hex;
use proptest::prelude::*;
use time::macros::datetime;
use wirepack::{CodecError, RawExt, SimpleHandle, Value};

fn encode(h: &SimpleHandle, v: &Value) -> Vec<u8> {
    h.encode_value(v).unwrap()
}

#[test]
fn descriptor_forms() {
    let h = SimpleHandle::new();
    assert_eq!(encode(&h, &Value::Nil), hex!("01"));
    assert_eq!(encode(&h, &Value::Bool(false)), hex!("02"));
    assert_eq!(encode(&h, &Value::Bool(true)), hex!("03"));
    assert_eq!(encode(&h, &Value::Uint(7)), hex!("0807"));
    assert_eq!(encode(&h, &Value::Uint(0x1234)), hex!("091234"));
    assert_eq!(encode(&h, &Value::Int(-7)), hex!("0c07"));
    assert_eq!(encode(&h, &Value::Str("ab".into())), hex!("d9026162"));
    assert_eq!(
        encode(
            &h,
            &Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
        ),
        hex!("f101d901610801")
    );
}

#[test]
fn zero_values_as_nil() {
    let mut h = SimpleHandle::new();
    h.enc_zero_values_as_nil = true;
    assert_eq!(encode(&h, &Value::Uint(0)), hex!("01"));
    assert_eq!(encode(&h, &Value::Bool(false)), hex!("01"));
    assert_eq!(encode(&h, &Value::Float(0.0)), hex!("01"));
    assert_eq!(encode(&h, &Value::Uint(1)), hex!("0801"));
}

#[test]
fn nil_collections_decode_per_handle() {
    let h = SimpleHandle::new();
    let mut dec = h.decoder(&hex!("01"));
    assert_eq!(
        wirepack::Decoder::read_array_start(&mut dec).unwrap(),
        wirepack::Len::Nil
    );

    let mut h = SimpleHandle::new();
    h.nil_collection_to_zero_length = true;
    let mut dec = h.decoder(&hex!("01"));
    assert_eq!(
        wirepack::Decoder::read_array_start(&mut dec).unwrap(),
        wirepack::Len::Known(0)
    );
}

#[test]
fn times_with_and_without_nanos() {
    let h = SimpleHandle::new();
    for t in [
        datetime!(2013-03-21 20:04:00 UTC),
        datetime!(1969-12-31 23:59:59.999999999 UTC),
    ] {
        let v = Value::Time(t);
        assert_eq!(h.decode_value(&encode(&h, &v)).unwrap(), v);
    }
}

#[test]
fn extension_tags_are_single_byte() {
    let h = SimpleHandle::new();
    let v = Value::Ext(RawExt::new(5, vec![1, 2, 3]));
    let bytes = encode(&h, &v);
    assert_eq!(bytes, hex!("f90305010203"));
    assert_eq!(h.decode_value(&bytes).unwrap(), v);

    let wide = Value::Ext(RawExt::new(300, vec![1]));
    assert!(matches!(
        h.encode_value(&wide).unwrap_err(),
        CodecError::Overflow { .. }
    ));
}

#[test]
fn canonical_maps_sort_by_encoded_key() {
    let mut h = SimpleHandle::new();
    h.basic.canonical = true;
    let v = Value::Map(vec![
        (Value::Str("b".into()), Value::Uint(2)),
        (Value::Str("a".into()), Value::Uint(1)),
    ]);
    assert_eq!(encode(&h, &v), hex!("f102d901610801d901620802"));
}

#[test]
fn hostile_announced_length_fails_cleanly() {
    let h = SimpleHandle::new();
    // array header claiming u64::MAX elements
    let err = h.decode_value(&hex!("ecffffffffffffffff")).unwrap_err();
    assert!(matches!(err, CodecError::Truncated { .. }));
}

#[test]
fn streaming_reader_decodes() {
    let h = SimpleHandle::new();
    let v = Value::Array(vec![Value::Bytes(vec![0x5a; 7000]), Value::Int(-1)]);
    let bytes = encode(&h, &v);
    let mut dec = h.decoder_from(std::io::Cursor::new(bytes));
    assert_eq!(wirepack::read_value(&mut dec).unwrap(), v);
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
        let h = SimpleHandle::new();
        prop_assert_eq!(h.decode_value(&h.encode_value(&v).unwrap()).unwrap(), v);
    }
}
