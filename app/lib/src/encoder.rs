//! Bit-packed encoding of message variables.
//!
//! Every variable extracted from a log message is stored as a single
//! `i64` slot. The slot holds one of four disjoint value domains:
//!
//! - **Integer**: a canonical signed decimal, stored as itself. Only
//!   values below [`DICT_ID_RANGE_BEGIN`] are representable.
//! - **Float**: a bit-packed decimal, MSB to LSB:
//!   `[1: sign][4: digit count - 1][4: decimal position from right - 1]`
//!   `[1: unused][54: digits as an integer]`. Between 1 and 16 decimal
//!   digits are representable; the decimal position is measured from the
//!   right so the sign does not shift it.
//! - **Hex**: up to 15 hex digits in the low 60 bits; bit 60 records a
//!   `0x` prefix, bit 61 records uppercase digits.
//! - **Dictionary id**: any slot at or above [`DICT_ID_RANGE_BEGIN`];
//!   the offset from the range start indexes a variable dictionary.
//!
//! The encoders refuse any input whose encoding would land in the
//! dictionary-id range, so the domains never overlap.

/// First slot value reserved for dictionary ids.
///
/// Integers and hex values must encode below this bound; dictionary ids
/// are stored as `id + DICT_ID_RANGE_BEGIN`.
pub const DICT_ID_RANGE_BEGIN: i64 = 1 << 62;

/// Maximum number of decimal digits an encoded float can carry.
pub const MAX_FLOAT_DIGITS: usize = 16;

/// Maximum number of hex digits an encoded hex value can carry.
pub const MAX_HEX_DIGITS: usize = 15;

const HEX_PREFIX_BIT: u32 = 60;
const HEX_UPPERCASE_BIT: u32 = 61;
const FLOAT_DIGITS_MASK: u64 = 0x003F_FFFF_FFFF_FFFF;

/// Encode a canonical signed decimal integer.
///
/// Accepts strings with no leading `+`, no zero padding (`0` itself is
/// fine), and `-` only directly before a nonzero digit. Returns `None`
/// when the string is not canonical, does not fit in an `i64`, or would
/// land in the dictionary-id range.
pub fn encode_integer(value: &str) -> Option<i64> {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    if bytes[0] == b'-' {
        // First character after the sign must be a nonzero digit
        if bytes.len() < 2 || !(b'1'..=b'9').contains(&bytes[1]) {
            return None;
        }
    } else {
        if !bytes[0].is_ascii_digit() {
            return None;
        }
        if bytes.len() > 1 && bytes[0] == b'0' {
            return None;
        }
    }
    let parsed: i64 = value.parse().ok()?;
    if parsed >= DICT_ID_RANGE_BEGIN {
        return None;
    }
    Some(parsed)
}

/// Encode a decimal float with an explicit decimal point.
///
/// The value must contain exactly one `.` that is neither the first nor
/// the last character of the unsigned body, between 1 and 16 digits in
/// total, and an optional leading `-`. Everything else is rejected.
pub fn encode_float(value: &str) -> Option<i64> {
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut pos = 0;
    let is_negative = bytes[0] == b'-';
    if is_negative {
        pos += 1;
    }
    let body = &bytes[pos..];
    // The decimal point may not start or end the unsigned body
    if body.first() == Some(&b'.') || body.last() == Some(&b'.') {
        return None;
    }
    // digits + decimal point
    if body.len() > MAX_FLOAT_DIGITS + 1 {
        return None;
    }

    let mut num_digits = 0usize;
    let mut decimal_pos_from_right: Option<usize> = None;
    let mut digits: u64 = 0;
    for (i, &c) in body.iter().enumerate() {
        if c.is_ascii_digit() {
            digits = digits * 10 + u64::from(c - b'0');
            num_digits += 1;
        } else if c == b'.' && decimal_pos_from_right.is_none() {
            decimal_pos_from_right = Some(body.len() - 1 - i);
        } else {
            return None;
        }
    }
    let decimal_pos_from_right = decimal_pos_from_right?;
    if num_digits == 0 || num_digits > MAX_FLOAT_DIGITS {
        return None;
    }

    let mut encoded: u64 = u64::from(is_negative);
    encoded = (encoded << 4) | ((num_digits - 1) as u64 & 0x0F);
    encoded = (encoded << 4) | ((decimal_pos_from_right - 1) as u64 & 0x0F);
    encoded <<= 55;
    encoded |= digits & FLOAT_DIGITS_MASK;
    Some(encoded as i64)
}

/// Encode a single-case hex value with an optional lowercase `0x` prefix.
///
/// The digits may be all-lowercase or all-uppercase but not mixed, may
/// not start with `0` (so zero padding and a bare `0` are rejected), and
/// at most 15 digits are representable. `0X` is not recognized as a
/// prefix.
pub fn encode_hex(value: &str) -> Option<i64> {
    let bytes = value.as_bytes();
    let has_prefix = bytes.starts_with(b"0x");
    let body = if has_prefix { &bytes[2..] } else { bytes };
    if body.is_empty() || body.len() > MAX_HEX_DIGITS {
        return None;
    }
    // Zero padding is not canonical
    if body[0] == b'0' {
        return None;
    }

    let mut has_lowercase = false;
    let mut has_uppercase = false;
    let mut result: u64 = 0;
    for &c in body {
        let digit = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => {
                has_lowercase = true;
                c - b'a' + 10
            }
            b'A'..=b'F' => {
                has_uppercase = true;
                c - b'A' + 10
            }
            _ => return None,
        };
        result = (result << 4) | u64::from(digit);
    }
    // Case may not change mid-value
    if has_lowercase && has_uppercase {
        return None;
    }

    if has_prefix {
        result |= 1 << HEX_PREFIX_BIT;
    }
    if has_uppercase {
        result |= 1 << HEX_UPPERCASE_BIT;
    }
    let encoded = result as i64;
    if encoded >= DICT_ID_RANGE_BEGIN {
        return None;
    }
    Some(encoded)
}

/// Map a variable dictionary id into the dictionary-id slot domain.
pub fn encode_dict_id(id: u64) -> i64 {
    id as i64 + DICT_ID_RANGE_BEGIN
}

/// Whether a slot value is a dictionary-id reference.
pub fn is_dict_id(encoded: i64) -> bool {
    encoded >= DICT_ID_RANGE_BEGIN
}

/// Recover the dictionary id from a dictionary-id slot value.
pub fn decode_dict_id(encoded: i64) -> u64 {
    (encoded - DICT_ID_RANGE_BEGIN) as u64
}

/// Decode a float slot back to its exact source string.
///
/// Leading and trailing zeros are reproduced exactly as dictated by the
/// stored digit count and decimal position.
pub fn decode_float_to_string(encoded: i64) -> String {
    let mut bits = encoded as u64;
    let digits = bits & FLOAT_DIGITS_MASK;
    bits >>= 55;
    let decimal_pos_from_right = ((bits & 0x0F) + 1) as usize;
    bits >>= 4;
    let num_digits = ((bits & 0x0F) + 1) as usize;
    bits >>= 4;
    let is_negative = bits > 0;

    let mut out = String::with_capacity(num_digits + 2);
    if is_negative {
        out.push('-');
    }
    let digit_string = format!("{:0width$}", digits, width = num_digits);
    let point_index = digit_string.len().saturating_sub(decimal_pos_from_right);
    out.push_str(&digit_string[..point_index]);
    out.push('.');
    out.push_str(&digit_string[point_index..]);
    out
}

/// Decode a hex slot back to its exact source string, including the
/// `0x` prefix and digit case.
pub fn decode_hex_to_string(encoded: i64) -> String {
    let bits = encoded as u64;
    let has_prefix = bits & (1 << HEX_PREFIX_BIT) != 0;
    let uppercase = bits & (1 << HEX_UPPERCASE_BIT) != 0;
    let digits = bits & ((1 << HEX_PREFIX_BIT) - 1);

    let body = if uppercase {
        format!("{:X}", digits)
    } else {
        format!("{:x}", digits)
    };
    if has_prefix {
        format!("0x{}", body)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integer_accepts_canonical() {
        assert_eq!(encode_integer("123"), Some(123));
        assert_eq!(encode_integer("-1"), Some(-1));
        assert_eq!(encode_integer("0"), Some(0));
        assert_eq!(
            encode_integer("-9223372036854775808"),
            Some(i64::MIN)
        );
    }

    #[test]
    fn test_encode_integer_rejects_non_canonical() {
        assert_eq!(encode_integer(""), None);
        assert_eq!(encode_integer("0123"), None);
        assert_eq!(encode_integer("-0"), None);
        assert_eq!(encode_integer("+1"), None);
        assert_eq!(encode_integer("-"), None);
        assert_eq!(encode_integer("1a"), None);
        assert_eq!(encode_integer("00"), None);
    }

    #[test]
    fn test_encode_integer_rejects_dict_id_range() {
        // 2^62 parses as an i64 but collides with the dictionary range
        assert_eq!(encode_integer("4611686018427387904"), None);
        assert_eq!(encode_integer("4611686018427387903"), Some((1 << 62) - 1));
        // Too large for i64 at all
        assert_eq!(encode_integer("9223372036854775808"), None);
    }

    #[test]
    fn test_encode_float_layout() {
        let encoded = encode_float("-3.14").unwrap();
        let bits = encoded as u64;
        assert_eq!(bits & FLOAT_DIGITS_MASK, 314);
        assert_eq!((bits >> 55) & 0x0F, 1); // decimal position 2, stored minus 1
        assert_eq!((bits >> 59) & 0x0F, 2); // 3 digits, stored minus 1
        assert_eq!(bits >> 63, 1); // negative
    }

    #[test]
    fn test_encode_float_rejects_malformed() {
        assert_eq!(encode_float(""), None);
        assert_eq!(encode_float(".5"), None);
        assert_eq!(encode_float("-.5"), None);
        assert_eq!(encode_float("1."), None);
        assert_eq!(encode_float("10"), None);
        assert_eq!(encode_float("1.2.3"), None);
        assert_eq!(encode_float("1.2e3"), None);
        assert_eq!(encode_float("-"), None);
        // 17 digits do not fit
        assert_eq!(encode_float("12345678901234567.8"), None);
        // 16 digits do
        assert!(encode_float("123456789012345.6").is_some());
    }

    #[test]
    fn test_float_round_trip() {
        for value in [
            "-3.14",
            "3.14",
            "0.5",
            "100.001",
            "0.0",
            "-0.0001",
            "123456789012345.6",
            "-1.234567890123456",
        ] {
            let encoded = encode_float(value).unwrap();
            assert_eq!(decode_float_to_string(encoded), value, "{}", value);
        }
    }

    #[test]
    fn test_encode_hex_flags() {
        let encoded = encode_hex("0xFF").unwrap();
        let bits = encoded as u64;
        assert_eq!(bits & ((1 << 60) - 1), 0xFF);
        assert_ne!(bits & (1 << HEX_PREFIX_BIT), 0);
        assert_ne!(bits & (1 << HEX_UPPERCASE_BIT), 0);

        let encoded = encode_hex("ff").unwrap();
        let bits = encoded as u64;
        assert_eq!(bits & (1 << HEX_PREFIX_BIT), 0);
        assert_eq!(bits & (1 << HEX_UPPERCASE_BIT), 0);
    }

    #[test]
    fn test_encode_hex_rejects_malformed() {
        assert_eq!(encode_hex(""), None);
        assert_eq!(encode_hex("0Xff"), None);
        assert_eq!(encode_hex("aB"), None);
        assert_eq!(encode_hex("0"), None);
        assert_eq!(encode_hex("0abc"), None);
        assert_eq!(encode_hex("0x0abc"), None);
        assert_eq!(encode_hex("xyz"), None);
        // 16 digits exceed the representable width
        assert_eq!(encode_hex("abcdef1234567890"), None);
        assert!(encode_hex("abcdef123456789").is_some());
    }

    #[test]
    fn test_hex_round_trip() {
        for value in ["0xFF", "0xff", "ff", "FF", "deadbeef", "DEADBEEF", "0x123abc", "f"] {
            let encoded = encode_hex(value).unwrap();
            assert_eq!(decode_hex_to_string(encoded), value, "{}", value);
        }
    }

    #[test]
    fn test_dict_id_round_trip() {
        for id in [0u64, 1, 42, u32::MAX as u64] {
            let encoded = encode_dict_id(id);
            assert!(is_dict_id(encoded));
            assert_eq!(decode_dict_id(encoded), id);
        }
    }

    #[test]
    fn test_domains_are_disjoint() {
        for value in ["123", "-123", "0"] {
            assert!(encode_integer(value).unwrap() < DICT_ID_RANGE_BEGIN);
        }
        for value in ["0xFF", "abcdef123456789"] {
            assert!(encode_hex(value).unwrap() < DICT_ID_RANGE_BEGIN);
        }
        assert!(!is_dict_id(encode_integer("123").unwrap()));
        assert!(is_dict_id(encode_dict_id(0)));
    }

    #[test]
    fn test_integer_round_trip_via_display() {
        for value in ["123", "-1", "0", "987654321"] {
            let encoded = encode_integer(value).unwrap();
            assert_eq!(encoded.to_string(), value);
        }
    }
}
