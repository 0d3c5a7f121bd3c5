//! Field validators shared by the request DTOs. Each one records its message in
//! a [`FieldErrors`] and returns the cleaned value when the input was usable.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::FieldErrors;

pub const MAX_TEXT_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const PRICE_DECIMAL_PLACES: u32 = 2;
pub const PRICE_MAX_DIGITS: u32 = 6;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_A_STRING: &str = "Not a valid string.";

/// `deserialize_with` helper: a present key becomes `Some`, even when its value
/// is `null`, so a missing key (`None`) and an explicit null stay distinct.
pub fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Short type name of a JSON value for error messages.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// The string held by a required field, untouched.
pub fn string<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a Value>) -> Option<&'a str> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            None
        }
        Some(Value::String(s)) => Some(s),
        Some(_) => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

/// A trimmed, non-blank string of at most [`MAX_TEXT_LEN`] characters.
pub fn text(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<String> {
    let value = string(errors, field, value)?.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > MAX_TEXT_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
        return None;
    }
    Some(value.to_string())
}

pub fn email(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<String> {
    let value = text(errors, field, value)?;
    if !is_valid_email(&value) {
        errors.add(field, "Enter a valid email address.");
        return None;
    }
    Some(value)
}

/// Passwords are taken verbatim, surrounding whitespace included.
pub fn password(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<String> {
    let value = string(errors, field, value)?;
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
        return None;
    }
    Some(value.to_string())
}

/// Missing, null or blank input clears the link.
pub fn optional_link(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<String> {
    let value = match value {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            errors.add(field, NOT_A_STRING);
            return None;
        }
    };
    if value.is_empty() {
        return None;
    }
    if value.chars().count() > MAX_TEXT_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
        return None;
    }
    Some(value.to_string())
}

/// The items of a list field.
pub fn list<'a>(errors: &mut FieldErrors, field: &str, value: &'a Value) -> Option<&'a [Value]> {
    match value {
        Value::Array(items) => Some(items),
        Value::Null => {
            errors.add(field, NOT_NULL);
            None
        }
        other => {
            errors.add(
                field,
                format!(
                    "Expected a list of items but got type \"{}\".",
                    json_type(other)
                ),
            );
            None
        }
    }
}

/// A non-negative integer given as a JSON number or a numeric string.
pub fn minutes(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<i32> {
    let parsed = match value {
        None => {
            errors.add(field, REQUIRED);
            return None;
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            return None;
        }
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    let Some(parsed) = parsed else {
        errors.add(field, "A valid integer is required.");
        return None;
    };
    if parsed < 0 {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    match i32::try_from(parsed) {
        Ok(v) => Some(v),
        Err(_) => {
            errors.add(
                field,
                format!("Ensure this value is less than or equal to {}.", i32::MAX),
            );
            None
        }
    }
}

/// A decimal with at most two fractional and four integer digits, rescaled to
/// exactly two places.
pub fn price(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<Decimal> {
    let parsed = match value {
        None => {
            errors.add(field, REQUIRED);
            return None;
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            return None;
        }
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(s.trim()),
        Some(_) => None,
    };
    let Some(parsed) = parsed else {
        errors.add(field, "A valid number is required.");
        return None;
    };

    let normalized = parsed.normalize();
    let whole_digits = digit_count(normalized.trunc().abs());
    let mut ok = true;
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        errors.add(
            field,
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
        ok = false;
    }
    let max_whole = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if whole_digits > max_whole {
        errors.add(
            field,
            format!("Ensure that there are no more than {max_whole} digits before the decimal point."),
        );
        ok = false;
    }
    if !ok {
        return None;
    }

    let mut price = normalized;
    price.rescale(PRICE_DECIMAL_PLACES);
    Some(price)
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn digit_count(whole: Decimal) -> u32 {
    if whole.is_zero() {
        return 0;
    }
    whole.to_string().chars().filter(char::is_ascii_digit).count() as u32
}
