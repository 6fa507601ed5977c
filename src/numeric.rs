//! Decimal number scanning shared by the measurement and range parsers.
//!
//! Meters answer with text like `+1.00000E-06`, `500uF` or `10`. [`tokenize`]
//! scans the leading number once and reports its shape; the helpers below
//! build the full-string parse, precision exponent and SI-prefix handling on
//! top of it.

use crate::error::{DmmError, DmmResult};

/// Shape of a decimal number at the start of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberToken<'a> {
    /// A leading `-` was present.
    pub negative: bool,
    /// Digits before the decimal point.
    pub int_digits: usize,
    /// Digits after the decimal point.
    pub frac_digits: usize,
    /// Value of an `e`/`E` exponent suffix.
    pub exponent: Option<i32>,
    /// Number text, including sign and exponent.
    pub text: &'a str,
    /// Unconsumed remainder.
    pub rest: &'a str,
}

/// Scan a decimal number at the start of `input`, after leading whitespace.
///
/// An `e`/`E` is taken as an exponent only when followed by an optionally
/// signed integer; otherwise it is left in `rest`. Returns `None` when no
/// mantissa digit is present.
pub fn tokenize(input: &str) -> Option<NumberToken<'_>> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let int_digits = count_digits(&bytes[pos..]);
    pos += int_digits;

    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        frac_digits = count_digits(&bytes[pos + 1..]);
        pos += 1 + frac_digits;
    }

    if int_digits + frac_digits == 0 {
        return None;
    }

    let mut exponent = None;
    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut end = pos + 1;
        if matches!(bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        let exp_digits = count_digits(&bytes[end..]);
        if exp_digits > 0 {
            end += exp_digits;
            exponent = s[pos + 1..end].parse::<i32>().ok();
            if exponent.is_some() {
                pos = end;
            }
        }
    }

    Some(NumberToken {
        negative,
        int_digits,
        frac_digits,
        exponent,
        text: &s[..pos],
        rest: &s[pos..],
    })
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Parse a whole string as a decimal number. Surrounding whitespace is allowed.
pub fn parse_decimal(text: &str) -> DmmResult<f64> {
    let trimmed = text.trim();
    let token = tokenize(trimmed)
        .filter(|t| t.rest.is_empty())
        .ok_or_else(|| DmmError::DataFormat(format!("not a number: {trimmed:?}")))?;
    token
        .text
        .parse::<f64>()
        .map_err(|e| DmmError::DataFormat(format!("not a number: {trimmed:?} ({e})")))
}

/// Extract the power-of-ten exponent from precision text such as `+1.00000E-06`.
///
/// Text without an exponent marker, including empty text, yields 0. Anything
/// else trailing the number is a format error.
pub fn precision_exponent(text: &str) -> DmmResult<i32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    match tokenize(trimmed) {
        Some(token) if token.rest.is_empty() => Ok(token.exponent.unwrap_or(0)),
        _ => Err(DmmError::DataFormat(format!(
            "bad precision field: {trimmed:?}"
        ))),
    }
}

/// Power of ten for an SI prefix character.
pub fn si_prefix_exponent(prefix: char) -> Option<i32> {
    match prefix {
        'p' => Some(-12),
        'n' => Some(-9),
        'u' => Some(-6),
        'm' => Some(-3),
        'k' | 'K' => Some(3),
        'M' => Some(6),
        'G' => Some(9),
        _ => None,
    }
}

/// Scale `value` by `10^exponent`.
///
/// Negative exponents divide so that e.g. `50 m` lands on the same double as
/// the literal `0.05`.
pub fn scale_by_power_of_ten(value: f64, exponent: i32) -> f64 {
    let factor = 10f64.powi(exponent.abs());
    if exponent < 0 {
        value / factor
    } else {
        value * factor
    }
}

/// Shortest round-trip decimal text for `value`, never in exponent form.
pub fn format_decimal(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_reports_shape() {
        let t = tokenize("-12.345E+03 V").unwrap();
        assert!(t.negative);
        assert_eq!(t.int_digits, 2);
        assert_eq!(t.frac_digits, 3);
        assert_eq!(t.exponent, Some(3));
        assert_eq!(t.text, "-12.345E+03");
        assert_eq!(t.rest, " V");
    }

    #[test]
    fn tokenize_leaves_dangling_exponent_marker() {
        let t = tokenize("5E").unwrap();
        assert_eq!(t.exponent, None);
        assert_eq!(t.rest, "E");
        assert!(tokenize("KITS90").is_none());
        assert!(tokenize("+.").is_none());
    }

    #[test]
    fn precision_exponent_examples() {
        assert_eq!(precision_exponent("+1.00000E-01").unwrap(), -1);
        assert_eq!(precision_exponent("+1.00000E-06").unwrap(), -6);
        assert_eq!(precision_exponent("1000").unwrap(), 0);
        assert_eq!(precision_exponent("").unwrap(), 0);
        assert!(precision_exponent("1.0E-0x").is_err());
    }

    #[test]
    fn parse_decimal_rejects_trailing_text() {
        assert_eq!(parse_decimal(" +9.99999E+37\r\n").unwrap(), 9.99999e37);
        assert_eq!(parse_decimal(".5").unwrap(), 0.5);
        assert!(parse_decimal("1.0 V").is_err());
        assert!(parse_decimal("inf").is_err());
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn si_scaling_matches_literals() {
        let exp = si_prefix_exponent('m').unwrap();
        assert_eq!(scale_by_power_of_ten(50.0, exp), 0.05);
        assert_eq!(format_decimal(scale_by_power_of_ten(500.0, -6)), "0.0005");
        assert_eq!(format_decimal(scale_by_power_of_ten(5.0, 6)), "5000000");
        assert_eq!(si_prefix_exponent('x'), None);
    }
}
