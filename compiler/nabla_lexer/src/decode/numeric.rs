//! Numeric literal decoding.
//!
//! Underscore separators are stripped here, not in the scanner. Integers
//! promote through widths so the narrowest exact representation wins;
//! literals too large for 128 bits keep their stripped lexeme as a big
//! integer.

/// Decoded integer literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntValue {
    /// Fits the machine integer.
    Int(i64),
    Int128(i128),
    /// Arbitrary precision: the underscore-stripped digits (with radix
    /// prefix removed).
    BigInt(String),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
}

/// Decoded float literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FloatValue {
    F64(f64),
    F32(f32),
}

/// Decode a decimal integer literal: `i64` → `i128` → big.
pub fn decode_int(text: &str) -> IntValue {
    let digits = strip_underscores(text);
    if let Ok(v) = digits.parse::<i64>() {
        return IntValue::Int(v);
    }
    if let Ok(v) = digits.parse::<i128>() {
        return IntValue::Int128(v);
    }
    IntValue::BigInt(digits.into_owned())
}

/// Decode a hex literal (`0x…`). Width follows digit count: up to 2
/// digits is 8-bit, then 16/32/64/128, else big.
pub fn decode_hex(text: &str) -> IntValue {
    let digits = strip_underscores(text.trim_start_matches("0x").trim_start_matches("0X"));
    decode_sized(&digits, 16, digits.len(), &[2, 4, 8, 16, 32])
}

/// Decode a binary literal (`0b…`). Up to 8 digits is 8-bit, then
/// 16/32/64/128, else big.
pub fn decode_bin(text: &str) -> IntValue {
    let digits = strip_underscores(text.trim_start_matches("0b").trim_start_matches("0B"));
    decode_sized(&digits, 2, digits.len(), &[8, 16, 32, 64, 128])
}

/// Decode an octal literal (`0o…`): parse as 64-bit, then demote to the
/// narrowest unsigned type that holds the value.
pub fn decode_oct(text: &str) -> IntValue {
    let digits = strip_underscores(text.trim_start_matches("0o").trim_start_matches("0O"));
    match u64::from_str_radix(&digits, 8) {
        Ok(v) => {
            if let Ok(b) = u8::try_from(v) {
                IntValue::UInt8(b)
            } else if let Ok(h) = u16::try_from(v) {
                IntValue::UInt16(h)
            } else if let Ok(w) = u32::try_from(v) {
                IntValue::UInt32(w)
            } else {
                IntValue::UInt64(v)
            }
        }
        Err(_) => match u128::from_str_radix(&digits, 8) {
            Ok(v) => IntValue::UInt128(v),
            Err(_) => IntValue::BigInt(digits.into_owned()),
        },
    }
}

fn decode_sized(digits: &str, radix: u32, ndigits: usize, buckets: &[usize; 5]) -> IntValue {
    if ndigits <= buckets[0] {
        u8::from_str_radix(digits, radix).map_or_else(
            |_| IntValue::BigInt(digits.to_string()),
            IntValue::UInt8,
        )
    } else if ndigits <= buckets[1] {
        u16::from_str_radix(digits, radix).map_or_else(
            |_| IntValue::BigInt(digits.to_string()),
            IntValue::UInt16,
        )
    } else if ndigits <= buckets[2] {
        u32::from_str_radix(digits, radix).map_or_else(
            |_| IntValue::BigInt(digits.to_string()),
            IntValue::UInt32,
        )
    } else if ndigits <= buckets[3] {
        u64::from_str_radix(digits, radix).map_or_else(
            |_| IntValue::BigInt(digits.to_string()),
            IntValue::UInt64,
        )
    } else if ndigits <= buckets[4] {
        u128::from_str_radix(digits, radix).map_or_else(
            |_| IntValue::BigInt(digits.to_string()),
            IntValue::UInt128,
        )
    } else {
        IntValue::BigInt(digits.to_string())
    }
}

/// Decode a float literal. An `f` exponent marker selects 32-bit: the
/// marker is rewritten to `e` before parsing.
pub fn decode_float(text: &str) -> FloatValue {
    let cleaned = strip_underscores(text);
    if cleaned.starts_with("0x") || cleaned.starts_with("0X") {
        return FloatValue::F64(decode_hex_float(&cleaned));
    }
    if let Some(idx) = cleaned.find(['f', 'F']) {
        let mut rewritten = String::with_capacity(cleaned.len());
        rewritten.push_str(&cleaned[..idx]);
        rewritten.push('e');
        rewritten.push_str(&cleaned[idx + 1..]);
        return FloatValue::F32(rewritten.parse::<f32>().unwrap_or(f32::NAN));
    }
    FloatValue::F64(cleaned.parse::<f64>().unwrap_or(f64::NAN))
}

/// Hex float: `0x1.8p3`. The standard library does not parse these.
fn decode_hex_float(text: &str) -> f64 {
    let body = &text[2..];
    let (mantissa_text, exp) = match body.find(['p', 'P']) {
        Some(idx) => {
            let exp = body[idx + 1..].parse::<i32>().unwrap_or(0);
            (&body[..idx], exp)
        }
        None => (body, 0),
    };
    let mut value = 0.0f64;
    let mut frac_scale = 1.0f64;
    let mut in_frac = false;
    for c in mantissa_text.chars() {
        if c == '.' {
            in_frac = true;
            continue;
        }
        let digit = match c.to_digit(16) {
            Some(d) => f64::from(d),
            None => continue,
        };
        if in_frac {
            frac_scale /= 16.0;
            value += digit * frac_scale;
        } else {
            value = value * 16.0 + digit;
        }
    }
    value * 2f64.powi(exp)
}

fn strip_underscores(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('_') {
        std::borrow::Cow::Owned(text.chars().filter(|&c| c != '_').collect())
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}
