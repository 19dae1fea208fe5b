//! Conversions between element text and native scalars, following the XML Schema
//! lexical rules for each built-in type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use soapbind_wsdl::schema::ScalarType;

use crate::value::PrimitiveValue;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoercionError {
    #[error("'{text}' is not a valid {expected}")]
    InvalidLexical { expected: ScalarType, text: String },

    #[error("'{text}' is out of range for {expected}")]
    OutOfRange { expected: ScalarType, text: String },

    #[error("a {found} value cannot be written as {expected}")]
    Unrepresentable {
        expected: ScalarType,
        found: &'static str,
    },
}

fn invalid(expected: ScalarType, text: &str) -> CoercionError {
    CoercionError::InvalidLexical {
        expected,
        text: text.to_owned(),
    }
}

fn out_of_range(expected: ScalarType, text: &str) -> CoercionError {
    CoercionError::OutOfRange {
        expected,
        text: text.to_owned(),
    }
}

/// Parses element text as `scalar`.
pub fn decode(scalar: ScalarType, text: &str) -> Result<PrimitiveValue, CoercionError> {
    let trimmed = text.trim();
    match scalar {
        ScalarType::String => Ok(PrimitiveValue::String(text.to_owned())),
        ScalarType::Boolean => match trimmed {
            "true" => Ok(PrimitiveValue::Bool(true)),
            "false" => Ok(PrimitiveValue::Bool(false)),
            _ => Err(invalid(scalar, text)),
        },
        ScalarType::Float | ScalarType::Double => {
            decode_float(scalar, trimmed).map(PrimitiveValue::Float)
        }
        ScalarType::Decimal => {
            if !is_decimal_lexical(trimmed) {
                return Err(invalid(scalar, text));
            }
            trimmed
                .parse::<f64>()
                .map(PrimitiveValue::Float)
                .map_err(|_| invalid(scalar, text))
        }
        ScalarType::DateTime => decode_date_time(trimmed)
            .map(PrimitiveValue::DateTime)
            .ok_or_else(|| invalid(scalar, text)),
        ScalarType::Date => decode_date(trimmed)
            .map(PrimitiveValue::Date)
            .ok_or_else(|| invalid(scalar, text)),
        integer => decode_integer(integer, trimmed).map(PrimitiveValue::Int),
    }
}

fn decode_integer(scalar: ScalarType, text: &str) -> Result<i64, CoercionError> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(scalar, text));
    }

    let Some((min, max)) = scalar.integer_bounds() else {
        return Err(invalid(scalar, text));
    };
    // anything that does not fit an i128 is out of every supported range
    let value = text
        .parse::<i128>()
        .map_err(|_| out_of_range(scalar, text))?;
    if value < min || value > max {
        return Err(out_of_range(scalar, text));
    }
    i64::try_from(value).map_err(|_| out_of_range(scalar, text))
}

fn decode_float(scalar: ScalarType, text: &str) -> Result<f64, CoercionError> {
    let value = match text {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        _ => {
            if !is_float_lexical(text) {
                return Err(invalid(scalar, text));
            }
            let value = text.parse::<f64>().map_err(|_| invalid(scalar, text))?;
            check_float_range(scalar, value).map_err(|()| out_of_range(scalar, text))?;
            value
        }
    };
    Ok(value)
}

/// Finite values must stay finite in the target precision.
fn check_float_range(scalar: ScalarType, value: f64) -> Result<(), ()> {
    if !value.is_finite() {
        return Err(());
    }
    if scalar == ScalarType::Float && value.abs() > f64::from(f32::MAX) {
        return Err(());
    }
    Ok(())
}

/// `[+-]?(digits(.digits?)?|.digits)`
fn is_decimal_lexical(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (unsigned, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    (!int_part.is_empty() || !frac_part.is_empty()) && all_digits(int_part) && all_digits(frac_part)
}

/// A decimal optionally followed by an exponent.
fn is_float_lexical(text: &str) -> bool {
    match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            let exp_digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            is_decimal_lexical(mantissa)
                && !exp_digits.is_empty()
                && exp_digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => is_decimal_lexical(text),
    }
}

/// RFC 3339 with or without an offset; a missing offset is read as UTC.
fn decode_date_time(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    DateTime::parse_from_rfc3339(text).ok().or_else(|| {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// `YYYY-MM-DD` with an optional `Z` or `±hh:mm` suffix, which is dropped.
fn decode_date(text: &str) -> Option<NaiveDate> {
    let date = text.strip_suffix('Z').unwrap_or(text);
    let offset = date
        .len()
        .checked_sub(6)
        .and_then(|at| date.get(at..).map(|tz| (at, tz)));
    let date = match offset {
        Some((at, tz)) if tz.starts_with(['+', '-']) && tz.as_bytes()[3] == b':' => &date[..at],
        _ => date,
    };
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Renders `value` as the lexical form of `scalar`.
///
/// Strings are parsed into the target type first, so textual input from loosely
/// typed callers is validated the same way a decoded element would be.
pub fn encode(scalar: ScalarType, value: &PrimitiveValue) -> Result<String, CoercionError> {
    let unrepresentable = || CoercionError::Unrepresentable {
        expected: scalar,
        found: value.kind(),
    };

    match (scalar, value) {
        (ScalarType::String, value) => Ok(value.to_string()),
        (_, PrimitiveValue::String(text)) => decode(scalar, text).map(|parsed| parsed.to_string()),
        (ScalarType::Boolean, PrimitiveValue::Bool(_))
        | (ScalarType::DateTime, PrimitiveValue::DateTime(_))
        | (ScalarType::Date, PrimitiveValue::Date(_)) => Ok(value.to_string()),
        (ScalarType::Float | ScalarType::Double, PrimitiveValue::Float(v)) => {
            if v.is_finite() {
                check_float_range(scalar, *v).map_err(|()| out_of_range(scalar, &v.to_string()))?;
            }
            Ok(value.to_string())
        }
        (ScalarType::Float | ScalarType::Double | ScalarType::Decimal, PrimitiveValue::Int(i)) => {
            Ok(i.to_string())
        }
        (ScalarType::Decimal, PrimitiveValue::Float(v)) if v.is_finite() => Ok(v.to_string()),
        (integer, PrimitiveValue::Int(i)) if integer.integer_bounds().is_some() => {
            decode_integer(integer, &i.to_string()).map(|i| i.to_string())
        }
        _ => Err(unrepresentable()),
    }
}
