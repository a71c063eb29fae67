//! Round-trip and disjointness properties of the variable encoders.

use logpack_compression::encoder::{
    decode_dict_id, decode_float_to_string, decode_hex_to_string, encode_dict_id, encode_float,
    encode_hex, encode_integer, is_dict_id, DICT_ID_RANGE_BEGIN,
};

#[test]
fn integer_round_trip_over_samples() {
    let samples = [
        "0",
        "7",
        "42",
        "-1",
        "-987654321",
        "1000000007",
        "4611686018427387903",
        "-9223372036854775808",
    ];
    for value in samples {
        let encoded = encode_integer(value).unwrap();
        assert!(encoded < DICT_ID_RANGE_BEGIN);
        assert_eq!(encoded.to_string(), value, "round trip of {}", value);
    }
}

#[test]
fn integer_rejections() {
    for value in ["", "+1", "-0", "007", "1.0", "abc", "9223372036854775808", "--3"] {
        assert_eq!(encode_integer(value), None, "{} must be rejected", value);
    }
}

#[test]
fn float_round_trip_over_samples() {
    let samples = [
        "0.0",
        "3.14",
        "-3.14",
        "0.5",
        "-0.5",
        "10.00",
        "000.1",
        "9999999.99999999",
        "123456789012345.6",
        "-1.234567890123456",
    ];
    for value in samples {
        let encoded = encode_float(value).unwrap();
        assert_eq!(
            decode_float_to_string(encoded),
            value,
            "round trip of {}",
            value
        );
    }
}

#[test]
fn float_bit_layout_of_negative_pi() {
    let encoded = encode_float("-3.14").unwrap() as u64;
    assert_eq!(encoded >> 63, 1, "sign bit");
    assert_eq!((encoded >> 59) & 0xF, 2, "digit count minus one");
    assert_eq!((encoded >> 55) & 0xF, 1, "decimal position minus one");
    assert_eq!(encoded & 0x003F_FFFF_FFFF_FFFF, 314, "digits");
}

#[test]
fn float_rejections() {
    for value in [
        "",
        ".5",
        "-.5",
        "1.",
        "-1.",
        "10",
        "1e5",
        "1.2.3",
        "12345678901234567.8",
        ".",
        "-",
    ] {
        assert_eq!(encode_float(value), None, "{} must be rejected", value);
    }
}

#[test]
fn hex_round_trip_over_samples() {
    let samples = [
        "f",
        "ff",
        "FF",
        "0xff",
        "0xFF",
        "deadbeef",
        "DEADBEEF",
        "0xdeadbeef",
        "123abc",
        "abcdef123456789",
    ];
    for value in samples {
        let encoded = encode_hex(value).unwrap();
        assert!(encoded < DICT_ID_RANGE_BEGIN);
        assert_eq!(
            decode_hex_to_string(encoded),
            value,
            "round trip of {}",
            value
        );
    }
}

#[test]
fn hex_rejections() {
    for value in [
        "",
        "0",
        "0Xff",
        "0x",
        "aB",
        "0abc",
        "0x0abc",
        "xyz",
        "abcdef1234567890",
    ] {
        assert_eq!(encode_hex(value), None, "{} must be rejected", value);
    }
}

#[test]
fn dict_id_round_trip_and_disjointness() {
    for id in [0u64, 1, 1000, u32::MAX as u64, (1u64 << 40)] {
        let encoded = encode_dict_id(id);
        assert!(is_dict_id(encoded));
        assert!(encoded >= DICT_ID_RANGE_BEGIN);
        assert_eq!(decode_dict_id(encoded), id);
    }
    // Nothing the value encoders produce lands in the dictionary range
    for value in ["42", "-42"] {
        assert!(!is_dict_id(encode_integer(value).unwrap()));
    }
    for value in ["deadbeef", "0xFF"] {
        assert!(!is_dict_id(encode_hex(value).unwrap()));
    }
}
