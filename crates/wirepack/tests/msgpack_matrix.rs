use hex_literal::hex;
use proptest::prelude::*;
use time::macros::datetime;
use wirepack::{CodecError, MsgpackHandle, RawExt, Value};

fn spec2017() -> MsgpackHandle {
    let mut h = MsgpackHandle::new();
    h.write_ext = true;
    h
}

fn encode(h: &MsgpackHandle, v: &Value) -> Vec<u8> {
    h.encode_value(v).unwrap()
}

#[test]
fn integer_ladder() {
    let h = spec2017();
    assert_eq!(encode(&h, &Value::Uint(7)), hex!("07"));
    assert_eq!(encode(&h, &Value::Uint(200)), hex!("ccc8"));
    assert_eq!(encode(&h, &Value::Uint(70000)), hex!("ce00011170"));
    assert_eq!(encode(&h, &Value::Int(-5)), hex!("fb"));
    assert_eq!(encode(&h, &Value::Int(-32)), hex!("e0"));
    assert_eq!(encode(&h, &Value::Int(-33)), hex!("d0df"));
    assert_eq!(
        encode(&h, &Value::Uint(u64::MAX)),
        hex!("cfffffffffffffffff")
    );
}

#[test]
fn strings_and_containers() {
    let h = spec2017();
    assert_eq!(
        encode(&h, &Value::Str("hello".into())),
        hex!("a568656c6c6f")
    );
    assert_eq!(
        encode(
            &h,
            &Value::Array(vec![Value::Uint(1), Value::Uint(2), Value::Uint(3)])
        ),
        hex!("93010203")
    );
    assert_eq!(
        encode(
            &h,
            &Value::Map(vec![(Value::Str("a".into()), Value::Uint(1))])
        ),
        hex!("81a16101")
    );
    assert_eq!(encode(&h, &Value::Bytes(vec![1, 2])), hex!("c4020102"));
}

#[test]
fn legacy_raw_family() {
    let mut h = MsgpackHandle::new();
    h.raw_to_string = true;
    // without write_ext both strings and bytes land in the raw family
    assert_eq!(encode(&h, &Value::Str("ab".into())), hex!("a26162"));
    assert_eq!(encode(&h, &Value::Bytes(vec![0x61, 0x62])), hex!("a26162"));
    assert_eq!(
        h.decode_value(&hex!("a26162")).unwrap(),
        Value::Str("ab".into())
    );
}

#[test]
fn timestamp_forms() {
    let h = spec2017();
    let t = Value::Time(datetime!(2000-01-01 0:00 UTC));
    assert_eq!(encode(&h, &t), hex!("d6ff386d4380"));
    assert_eq!(h.decode_value(&hex!("d6ff386d4380")).unwrap(), t);

    let frac = Value::Time(datetime!(2000-01-01 0:00:00.000000001 UTC));
    let bytes = encode(&h, &frac);
    assert_eq!(bytes[..2], hex!("d7ff"));
    assert_eq!(h.decode_value(&bytes).unwrap(), frac);

    let ancient = Value::Time(datetime!(1800-01-01 0:00 UTC));
    let bytes = encode(&h, &ancient);
    assert_eq!(bytes[..3], hex!("c70cff"));
    assert_eq!(h.decode_value(&bytes).unwrap(), ancient);
}

#[test]
fn extensions_need_2017_mode() {
    let h = MsgpackHandle::new();
    let v = Value::Ext(RawExt::new(5, vec![1, 2, 3]));
    assert!(matches!(
        h.encode_value(&v).unwrap_err(),
        CodecError::Unsupported(_)
    ));
    let h = spec2017();
    let bytes = encode(&h, &v);
    assert_eq!(bytes, hex!("c70305010203"));
    assert_eq!(h.decode_value(&bytes).unwrap(), v);
}

#[test]
fn bytes_from_array_coercion() {
    let mut h = spec2017();
    h.bytes_from_array = true;
    let mut dec = h.decoder(&hex!("9301ccc803"));
    assert_eq!(
        wirepack::Decoder::decode_bytes(&mut dec).unwrap(),
        vec![1, 200, 3]
    );
}

#[test]
fn unused_descriptor_is_malformed() {
    let h = spec2017();
    assert!(matches!(
        h.decode_value(&hex!("c1")).unwrap_err(),
        CodecError::Malformed { bd: 0xc1, .. }
    ));
}

#[test]
fn streaming_reader_matches_slice_reader() {
    let h = spec2017();
    let v = Value::Map(vec![
        (Value::Str("payload".into()), Value::Bytes(vec![0xab; 5000])),
        (Value::Str("n".into()), Value::Int(-1)),
    ]);
    let bytes = encode(&h, &v);
    let mut dec = h.decoder_from(std::io::Cursor::new(&bytes[..]));
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
    // positive_int_unsigned keeps non-negative integers Uint across the
    // round trip; the signed fixnum forms would otherwise come back Int
    #[test]
    fn round_trips_any_tree(v in arb_value()) {
        let mut h = spec2017();
        h.positive_int_unsigned = true;
        prop_assert_eq!(h.decode_value(&h.encode_value(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn widest_forms_stay_equivalent(v in arb_value()) {
        let mut h = spec2017();
        h.no_fixed_num = true;
        h.positive_int_unsigned = true;
        prop_assert_eq!(h.decode_value(&h.encode_value(&v).unwrap()).unwrap(), v);
    }
}
