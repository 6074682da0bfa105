// Field-level coercion of untrusted JSON values.

use serde_json::Value;

use super::defaults::{VALUE_MAX, VALUE_MIN, ZERO};

/// Read a number from a JSON value.
///
/// Accepts finite JSON numbers and numeric strings. Strings are read like a
/// lenient `parseFloat`: thousands separators are dropped and a leading numeric
/// prefix is used (`"500万元"` → 500). `NaN`, infinities, booleans, nulls and
/// containers are not numbers.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric_prefix(s),
        _ => None,
    }
}

fn parse_numeric_prefix(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '，' && !c.is_whitespace())
        .collect();

    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in cleaned.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    end += exponent_len(&cleaned[end..]);
    cleaned[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Length of an `e[+-]digits` suffix at the start of `rest`, or 0.
fn exponent_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    if !matches!(bytes.first(), Some(b'e' | b'E')) {
        return 0;
    }
    let sign = usize::from(matches!(bytes.get(1), Some(b'+' | b'-')));
    let digits = bytes[1 + sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        1 + sign + digits
    }
}

/// Non-empty trimmed string, or `None` for anything else.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

pub fn text_or(value: Option<&Value>, default: &str) -> String {
    coerce_text(value).unwrap_or_else(|| default.to_string())
}

/// Percentage in [0, 100]; non-numeric input becomes 0.
pub fn clamp_value(value: Option<&Value>) -> f64 {
    coerce_number(value)
        .unwrap_or(ZERO)
        .clamp(VALUE_MIN, VALUE_MAX)
}

/// Round half away from zero to 2 decimal places.
///
/// Works on the shortest decimal representation of `value`, so `100.005`
/// rounds to `100.01` even though its binary value is slightly below.
pub fn round_to_cents(value: f64) -> f64 {
    if !value.is_finite() {
        return ZERO;
    }
    // Beyond 2^53 / 100 there are no fractional cents left to round.
    if value.abs() >= 9.0e13 {
        return value.round();
    }

    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if frac_part.len() <= 2 {
        return value;
    }

    let int_cents: i64 = int_part.parse::<i64>().unwrap_or(0) * 100;
    let frac_digits = frac_part.as_bytes();
    let two_digits = i64::from(frac_digits[0] - b'0') * 10 + i64::from(frac_digits[1] - b'0');
    let round_up = frac_digits[2] >= b'5';

    let cents = int_cents + two_digits + i64::from(round_up);
    (cents as f64 / 100.0).copysign(value)
}

/// Coerce then round to cents; non-numeric input becomes `None`.
pub fn coerce_amount(value: Option<&Value>) -> Option<f64> {
    coerce_number(value).map(round_to_cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_pass_through() {
        assert_eq!(coerce_number(Some(&json!(42))), Some(42.0));
        assert_eq!(coerce_number(Some(&json!(-3.5))), Some(-3.5));
    }

    #[test]
    fn numeric_strings_parse() {
        assert_eq!(coerce_number(Some(&json!("75"))), Some(75.0));
        assert_eq!(coerce_number(Some(&json!(" 1,234.5 "))), Some(1234.5));
        assert_eq!(coerce_number(Some(&json!("500万元"))), Some(500.0));
        assert_eq!(coerce_number(Some(&json!("-12.5%"))), Some(-12.5));
    }

    #[test]
    fn exponent_suffix_read() {
        assert_eq!(coerce_number(Some(&json!("1e3"))), Some(1000.0));
        assert_eq!(coerce_number(Some(&json!("2.5E-1"))), Some(0.25));
        assert_eq!(coerce_number(Some(&json!("3e+2万元"))), Some(300.0));
        assert_eq!(coerce_number(Some(&json!("4e"))), Some(4.0));
        assert_eq!(coerce_number(Some(&json!("5e-"))), Some(5.0));
        assert_eq!(coerce_number(Some(&json!("1e400"))), None);
    }

    #[test]
    fn non_numeric_is_none() {
        assert_eq!(coerce_number(None), None);
        assert_eq!(coerce_number(Some(&json!("abc"))), None);
        assert_eq!(coerce_number(Some(&json!("NaN"))), None);
        assert_eq!(coerce_number(Some(&json!("Infinity"))), None);
        assert_eq!(coerce_number(Some(&json!(true))), None);
        assert_eq!(coerce_number(Some(&json!(null))), None);
        assert_eq!(coerce_number(Some(&json!([1]))), None);
        assert_eq!(coerce_number(Some(&json!("-"))), None);
    }

    #[test]
    fn text_requires_non_empty_string() {
        assert_eq!(coerce_text(Some(&json!("  X "))), Some("X".to_string()));
        assert_eq!(coerce_text(Some(&json!("   "))), None);
        assert_eq!(coerce_text(Some(&json!(12))), None);
        assert_eq!(text_or(None, "默认"), "默认");
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_value(Some(&json!(150))), 100.0);
        assert_eq!(clamp_value(Some(&json!(-5))), 0.0);
        assert_eq!(clamp_value(Some(&json!("80"))), 80.0);
        assert_eq!(clamp_value(Some(&json!("n/a"))), 0.0);
        assert_eq!(clamp_value(None), 0.0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to_cents(100.005), 100.01);
        assert_eq!(round_to_cents(-100.005), -100.01);
        assert_eq!(round_to_cents(1.234), 1.23);
        assert_eq!(round_to_cents(2.5), 2.5);
        assert_eq!(round_to_cents(0.999), 1.0);
        assert_eq!(round_to_cents(f64::NAN), 0.0);
    }

    #[test]
    fn amount_from_string() {
        assert_eq!(coerce_amount(Some(&json!("100.005"))), Some(100.01));
        assert_eq!(coerce_amount(Some(&json!("x"))), None);
    }
}
