// Utility helpers for cell typing, blank tests and number formatting.
//
// The "dirty" text handling lives here so the loader, lookup and
// consolidator can share one definition of blank and one definition of
// an area key.
use crate::types::{Row, Scalar};
use num_format::{Locale, ToFormattedString};

/// Magnitude bound for typed numbers: 2^53, the first integer `f64` cannot
/// tell apart from its successor.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Type a raw cell the way the upload step does: plain decimal numbers
/// become `Number`, empty cells become `Null`, everything else is kept verbatim.
///
/// Numbers at or beyond 2^53 in magnitude stay `Text`, so long reference
/// codes keep every digit.
pub fn parse_scalar(raw: &str) -> Scalar {
    if raw.is_empty() {
        return Scalar::Null;
    }
    if looks_numeric(raw.trim()) {
        if let Ok(n) = raw.trim().parse::<f64>() {
            if n.abs() < MAX_EXACT_INTEGER {
                return Scalar::Number(n);
            }
        }
    }
    Scalar::Text(raw.to_string())
}

/// `-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?`, without pulling in a regex.
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    let mantissa_ok = match frac_part {
        None => !int_part.is_empty() && digits(int_part),
        Some(frac) => {
            (!int_part.is_empty() || !frac.is_empty()) && digits(int_part) && digits(frac)
        }
    };
    let exponent_ok = match exponent {
        None => true,
        Some(e) => {
            let e = e.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(e);
            !e.is_empty() && digits(e)
        }
    };
    mantissa_ok && exponent_ok
}

/// A row is blank when every value is null or empty after trimming.
pub fn is_blank_row(row: &Row) -> bool {
    row.values().all(Scalar::is_blank)
}

/// Key used by the cluster table: trimmed and uppercased.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Share of `part` in `whole` as a percentage; 0 for an empty whole.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Fixed decimals with thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_typed() {
        assert_eq!(parse_scalar("42"), Scalar::Number(42.0));
        assert_eq!(parse_scalar(" -3.5 "), Scalar::Number(-3.5));
        assert_eq!(parse_scalar(".5"), Scalar::Number(0.5));
        assert_eq!(parse_scalar("1e3"), Scalar::Number(1000.0));
    }

    #[test]
    fn non_numbers_stay_verbatim() {
        assert_eq!(parse_scalar("inf"), Scalar::Text("inf".into()));
        assert_eq!(parse_scalar("12-05-2024"), Scalar::Text("12-05-2024".into()));
        assert_eq!(parse_scalar(" North "), Scalar::Text(" North ".into()));
        assert_eq!(parse_scalar("."), Scalar::Text(".".into()));
        assert_eq!(parse_scalar("1e"), Scalar::Text("1e".into()));
        assert_eq!(parse_scalar(""), Scalar::Null);
    }

    #[test]
    fn long_codes_keep_every_digit() {
        assert_eq!(
            parse_scalar("12345678901234567891"),
            Scalar::Text("12345678901234567891".into())
        );
        assert_eq!(
            parse_scalar("-9007199254740992"),
            Scalar::Text("-9007199254740992".into())
        );
        assert_eq!(parse_scalar("1e300"), Scalar::Text("1e300".into()));
        assert_eq!(
            parse_scalar("9007199254740991"),
            Scalar::Number(9_007_199_254_740_991.0)
        );
    }

    #[test]
    fn number_display_drops_trailing_zero() {
        assert_eq!(Scalar::Number(42.0).to_string(), "42");
        assert_eq!(Scalar::Number(2.25).to_string(), "2.25");
    }

    #[test]
    fn blank_row_detection() {
        let mut row = Row::new();
        row.insert("A".into(), Scalar::Text("  ".into()));
        row.insert("B".into(), Scalar::Null);
        assert!(is_blank_row(&row));
        row.insert("C".into(), Scalar::Number(0.0));
        assert!(!is_blank_row(&row));
    }

    #[test]
    fn formats_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_int(12000u64), "12,000");
    }
}
