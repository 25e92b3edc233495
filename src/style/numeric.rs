//! Number rendering shared by the percent and brace styles.
//!
//! Output follows printf conventions: exponents carry a sign and at least
//! two digits, `g` strips trailing zeros unless the alternate form is
//! requested.

use serde_json::Value;

use crate::record::value::AttrValue;

/// Integer view of a value, if it has one. Bools count as 0/1.
pub(crate) fn as_integer(value: &AttrValue) -> Option<i128> {
    match value {
        AttrValue::Json(Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        AttrValue::Json(Value::Bool(b)) => Some(i128::from(*b)),
        _ => None,
    }
}

/// Integer view that also accepts floats, truncating toward zero.
pub(crate) fn as_truncated_integer(value: &AttrValue) -> Option<i128> {
    as_integer(value).or_else(|| match value {
        AttrValue::Json(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i128),
        _ => None,
    })
}

pub(crate) fn as_float(value: &AttrValue) -> Option<f64> {
    match value {
        AttrValue::Json(Value::Number(n)) => n.as_f64(),
        AttrValue::Json(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Digits of `n` (absolute value) in the given base.
pub(crate) fn integer_digits(n: i128, base: u32, upper: bool) -> String {
    let mut magnitude = n.unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let digit = (magnitude % u128::from(base)) as u32;
        let c = std::char::from_digit(digit, base).unwrap_or('?');
        digits.push(if upper { c.to_ascii_uppercase() } else { c });
        magnitude /= u128::from(base);
    }
    digits.iter().rev().collect()
}

pub(crate) fn fixed(value: f64, precision: usize, alternate: bool) -> String {
    let mut out = format!("{:.*}", precision, value);
    if alternate && precision == 0 {
        out.push('.');
    }
    out
}

/// Split Rust's `{:e}` output into mantissa and exponent.
fn split_exponent(formatted: &str) -> (String, i32) {
    match formatted.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (formatted.to_string(), 0),
    }
}

fn join_exponent(mantissa: &str, exp: i32, upper: bool) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

pub(crate) fn exponent(value: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let (mut mantissa, exp) = split_exponent(&format!("{:.*e}", precision, value));
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    join_exponent(&mantissa, exp, upper)
}

fn strip_trailing_zeros(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub(crate) fn general(value: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let precision = precision.max(1);
    let exp = if value == 0.0 {
        0
    } else {
        split_exponent(&format!("{:.*e}", precision - 1, value)).1
    };

    if exp >= -4 && (exp as i64) < precision as i64 {
        let digits = (precision as i64 - 1 - exp as i64).max(0) as usize;
        let text = fixed(value, digits, alternate);
        if alternate {
            text
        } else {
            strip_trailing_zeros(&text)
        }
    } else {
        let (mantissa, exp) = split_exponent(&format!("{:.*e}", precision - 1, value));
        let mantissa = if alternate {
            if mantissa.contains('.') {
                mantissa
            } else {
                format!("{}.", mantissa)
            }
        } else {
            strip_trailing_zeros(&mantissa)
        };
        join_exponent(&mantissa, exp, upper)
    }
}

/// Text for non-finite floats, or `None` for regular numbers.
pub(crate) fn non_finite(value: f64, upper: bool) -> Option<String> {
    let text = if value.is_nan() {
        "nan"
    } else if value.is_infinite() {
        "inf"
    } else {
        return None;
    };
    Some(if upper { text.to_uppercase() } else { text.to_string() })
}

/// Insert a separator every `size` digits of the leading digit run.
pub(crate) fn group_digits(number: &str, separator: char, size: usize) -> String {
    let (int_part, rest) = match number.find(|c: char| !c.is_ascii_hexdigit()) {
        Some(index) => number.split_at(index),
        None => (number, ""),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % size == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped.push_str(rest);
    grouped
}

/// Sign prefix for a number under the usual `+`/space flags.
pub(crate) fn sign_prefix(negative: bool, plus: bool, space: bool) -> &'static str {
    if negative {
        "-"
    } else if plus {
        "+"
    } else if space {
        " "
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_digits() {
        assert_eq!(integer_digits(255, 16, false), "ff");
        assert_eq!(integer_digits(255, 16, true), "FF");
        assert_eq!(integer_digits(-8, 8, false), "10");
        assert_eq!(integer_digits(0, 10, false), "0");
    }

    #[test]
    fn test_exponent() {
        assert_eq!(exponent(1234.5678, 6, false, false), "1.234568e+03");
        assert_eq!(exponent(0.00012, 2, true, false), "1.20E-04");
        assert_eq!(exponent(5.0, 0, false, true), "5.e+00");
    }

    #[test]
    fn test_general() {
        assert_eq!(general(1234.5678, 6, false, false), "1234.57");
        assert_eq!(general(0.0001, 6, false, false), "0.0001");
        assert_eq!(general(0.00001, 6, false, false), "1e-05");
        assert_eq!(general(1e20, 6, false, false), "1e+20");
        assert_eq!(general(100.0, 6, false, false), "100");
        assert_eq!(general(100.0, 6, false, true), "100.000");
        assert_eq!(general(0.0, 6, false, false), "0");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits("1234567", ',', 3), "1,234,567");
        assert_eq!(group_digits("1234.50", '_', 3), "1_234.50");
        assert_eq!(group_digits("12", ',', 3), "12");
        assert_eq!(group_digits("deadbeef", '_', 4), "dead_beef");
    }

    #[test]
    fn test_value_views() {
        assert_eq!(as_integer(&AttrValue::from(json!(7))), Some(7));
        assert_eq!(as_integer(&AttrValue::from(json!(true))), Some(1));
        assert_eq!(as_integer(&AttrValue::from(json!(7.9))), None);
        assert_eq!(as_truncated_integer(&AttrValue::from(json!(7.9))), Some(7));
        assert_eq!(as_float(&AttrValue::from(json!("7"))), None);
    }
}
