//! IEC base-2 size parsing for operator-facing flags.
//!
//! Sizes are written the way plot operators type them: `256KB`, `20MB`,
//! `1GB`, `4TB`. Suffixes are base-2 (`1KB = 1024` bytes); a bare integer
//! is taken as bytes.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("empty size string")]
    Empty,
    #[error("invalid size '{0}'")]
    Invalid(String),
    #[error("size '{0}' overflows")]
    Overflow(String),
}

/// Parse a base-2 byte size such as `"1GB"` or `"512MB"`.
pub fn parse_base2_size(input: &str) -> Result<u64, SizeParseError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(SizeParseError::Empty);
    }

    let upper = s.to_ascii_uppercase();
    let (digits, shift) = if let Some(d) = upper.strip_suffix("KB") {
        (d, 10u32)
    } else if let Some(d) = upper.strip_suffix("MB") {
        (d, 20)
    } else if let Some(d) = upper.strip_suffix("GB") {
        (d, 30)
    } else if let Some(d) = upper.strip_suffix("TB") {
        (d, 40)
    } else {
        (upper.as_str(), 0)
    };

    let digits = digits.trim();
    let value: u64 = digits
        .parse()
        .map_err(|_| SizeParseError::Invalid(input.to_string()))?;
    value
        .checked_shl(shift)
        .filter(|v| v >> shift == value)
        .ok_or_else(|| SizeParseError::Overflow(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iec_suffixes() {
        assert_eq!(parse_base2_size("256KB").unwrap(), 256 * 1024);
        assert_eq!(parse_base2_size("20MB").unwrap(), 20 << 20);
        assert_eq!(parse_base2_size("1GB").unwrap(), 1 << 30);
        assert_eq!(parse_base2_size("2TB").unwrap(), 2u64 << 40);
    }

    #[test]
    fn parses_bare_bytes_and_lowercase() {
        assert_eq!(parse_base2_size("262144").unwrap(), 262144);
        assert_eq!(parse_base2_size("1gb").unwrap(), 1 << 30);
        assert_eq!(parse_base2_size(" 4 GB ").unwrap(), 4u64 << 30);
    }

    #[test]
    fn rejects_junk() {
        assert!(parse_base2_size("").is_err());
        assert!(parse_base2_size("GB").is_err());
        assert!(parse_base2_size("12.5GB").is_err());
        assert!(parse_base2_size("-1GB").is_err());
        assert!(matches!(
            parse_base2_size("99999999999999999999GB"),
            Err(SizeParseError::Invalid(_))
        ));
    }

    #[test]
    fn shift_overflow_is_reported() {
        assert_eq!(
            parse_base2_size("18446744073709551615KB"),
            Err(SizeParseError::Overflow(
                "18446744073709551615KB".to_string()
            ))
        );
    }
}
