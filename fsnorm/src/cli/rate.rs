use std::fmt;

/// Parse a sampling rate such as `16000`, `16k`, `44.1kHz` or `8000Hz` into Hz.
///
/// # Grammar
///
/// ```text
/// rate   = number separators? [ unit ] ;
/// number = digits [ "." digits ] ;
/// unit   = "hz" | "k" | "khz" ;          (case-insensitive)
/// ```
///
/// Fractions are only accepted when the result is a whole number of Hz, so
/// `44.1k` is 44100 while `44.1234k` is rejected. Zero is rejected.
pub fn parse_sample_rate(value: &str) -> Result<u32, RateParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RateParseError::Empty);
    }

    let bytes = trimmed.as_bytes();
    let (mantissa, scale, mut index) = parse_number(bytes)?;

    while index < bytes.len() && (bytes[index] == b'_' || bytes[index].is_ascii_whitespace()) {
        index += 1;
    }

    let unit = parse_unit(trimmed, index)?;
    let hz = mantissa
        .checked_mul(unit.multiplier())
        .ok_or(RateParseError::TooLarge)?;

    let divisor = 10u128.pow(scale);
    if hz % divisor != 0 {
        return Err(RateParseError::FractionalHz { unit });
    }

    let hz = hz / divisor;
    if hz == 0 {
        return Err(RateParseError::Zero);
    }
    u32::try_from(hz).map_err(|_| RateParseError::TooLarge)
}

fn parse_number(bytes: &[u8]) -> Result<(u128, u32, usize), RateParseError> {
    if !bytes[0].is_ascii_digit() {
        return Err(RateParseError::ExpectedNumber {
            found: bytes[0] as char,
        });
    }

    let mut mantissa: u128 = 0;
    let mut scale: u32 = 0;
    let mut decimal_index = None;
    let mut index = 0usize;

    while index < bytes.len() {
        match bytes[index] {
            byte @ b'0'..=b'9' => {
                mantissa = mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(u128::from(byte - b'0')))
                    .ok_or(RateParseError::TooLarge)?;
                if decimal_index.is_some() {
                    scale += 1;
                    if scale > MAX_FRACTION_DIGITS {
                        return Err(RateParseError::TooLarge);
                    }
                }
            }
            b'.' if decimal_index.is_none() => decimal_index = Some(index),
            b'.' => {
                return Err(RateParseError::UnexpectedChar { index, found: '.' });
            }
            _ => break,
        }
        index += 1;
    }

    if let Some(dot) = decimal_index {
        if scale == 0 {
            return Err(RateParseError::MissingFractionDigits { index: dot });
        }
    }

    Ok((mantissa, scale, index))
}

fn parse_unit(original: &str, index: usize) -> Result<Unit, RateParseError> {
    let suffix = &original[index..];
    match suffix.to_ascii_lowercase().as_str() {
        "" | "hz" => Ok(Unit::Hertz),
        "k" | "khz" => Ok(Unit::Kilohertz),
        _ => Err(RateParseError::UnknownUnit {
            index,
            found: suffix.to_string(),
        }),
    }
}

const MAX_FRACTION_DIGITS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateParseError {
    Empty,
    ExpectedNumber { found: char },
    MissingFractionDigits { index: usize },
    UnknownUnit { index: usize, found: String },
    UnexpectedChar { index: usize, found: char },
    FractionalHz { unit: Unit },
    Zero,
    TooLarge,
}

impl std::error::Error for RateParseError {}

impl fmt::Display for RateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateParseError::Empty => write!(f, "sampling rate cannot be empty"),
            RateParseError::ExpectedNumber { found } => {
                write!(f, "expected a number but found '{found}'")
            }
            RateParseError::MissingFractionDigits { index } => write!(
                f,
                "expected digits after decimal point at position {}",
                index + 1
            ),
            RateParseError::UnknownUnit { index, found } => {
                write!(f, "unknown unit '{}' at position {}", found, index + 1)
            }
            RateParseError::UnexpectedChar { index, found } => write!(
                f,
                "unexpected character '{}' at position {}",
                found,
                index + 1
            ),
            RateParseError::FractionalHz { unit } => write!(
                f,
                "sampling rate in '{}' must resolve to a whole number of Hz",
                unit.symbol()
            ),
            RateParseError::Zero => write!(f, "sampling rate must be greater than zero"),
            RateParseError::TooLarge => {
                write!(f, "sampling rate exceeds the maximum of {} Hz", u32::MAX)
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Unit {
    Hertz,
    Kilohertz,
}

impl Unit {
    fn multiplier(self) -> u128 {
        match self {
            Unit::Hertz => 1,
            Unit::Kilohertz => 1_000,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Unit::Hertz => "Hz",
            Unit::Kilohertz => "kHz",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rate(input: &str, expected: u32) {
        let actual = parse_sample_rate(input).unwrap();
        assert_eq!(actual, expected, "input: {input}");
    }

    #[test]
    fn parses_plain_and_suffixed_rates() {
        assert_rate("16000", 16_000);
        assert_rate("8000Hz", 8_000);
        assert_rate("24k", 24_000);
        assert_rate("48kHz", 48_000);
        assert_rate(" 32 khz ", 32_000);
    }

    #[test]
    fn parses_fractional_kilohertz() {
        assert_rate("44.1k", 44_100);
        assert_rate("22.05kHz", 22_050);
        assert_rate("11.025k", 11_025);
        assert_rate("16000.0", 16_000);
    }

    #[test]
    fn rejects_fractional_hertz() {
        assert!(matches!(
            parse_sample_rate("44.1234k"),
            Err(RateParseError::FractionalHz {
                unit: Unit::Kilohertz
            })
        ));
        assert!(matches!(
            parse_sample_rate("8000.5"),
            Err(RateParseError::FractionalHz { unit: Unit::Hertz })
        ));
    }

    #[test]
    fn rejects_invalid_formats() {
        assert!(matches!(parse_sample_rate(""), Err(RateParseError::Empty)));
        assert!(matches!(
            parse_sample_rate("k16"),
            Err(RateParseError::ExpectedNumber { found: 'k' })
        ));
        assert!(matches!(
            parse_sample_rate("16MHz"),
            Err(RateParseError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_sample_rate("16."),
            Err(RateParseError::MissingFractionDigits { index: 2 })
        ));
        assert!(matches!(
            parse_sample_rate("1.6.0k"),
            Err(RateParseError::UnexpectedChar { index: 3, .. })
        ));
        assert!(matches!(
            parse_sample_rate("-16000"),
            Err(RateParseError::ExpectedNumber { found: '-' })
        ));
    }

    #[test]
    fn rejects_zero_and_overflow() {
        assert!(matches!(parse_sample_rate("0k"), Err(RateParseError::Zero)));
        assert!(matches!(
            parse_sample_rate("4294967296"),
            Err(RateParseError::TooLarge)
        ));
    }
}
