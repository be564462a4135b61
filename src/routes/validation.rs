use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{ValidateEmail, ValidateLength};

use crate::constants::{money_max, MAX_STRING_LENGTH, MONEY_SCALE};
use crate::error::{AppError, Result};

/// A decoded JSON request body, read field by field by the validators
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub Map<String, Value>);

impl Payload {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

/// Field-level validation messages, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First message of the first failing field
    pub fn first_message(&self) -> Option<&str> {
        self.0
            .values()
            .next()
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Turn accumulated messages into an error, if there are any
    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Returns the value when present and non-blank, recording an error otherwise
pub fn required<'a>(
    errors: &mut ValidationErrors,
    payload: &'a Payload,
    field: &str,
) -> Option<&'a Value> {
    match payload.get(field) {
        Some(value) if !is_blank(value) => Some(value),
        _ => {
            errors.add(field, format!("The {} field is required.", label(field)));
            None
        }
    }
}

/// Returns the value when present and not null, without recording anything
pub fn nullable<'a>(payload: &'a Payload, field: &str) -> Option<&'a Value> {
    payload.get(field).filter(|value| !value.is_null())
}

/// String no longer than `max` characters, with surrounding whitespace removed
pub fn string(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Value,
    max: usize,
) -> Option<String> {
    let Some(s) = value.as_str() else {
        errors.add(field, format!("The {} field must be a string.", label(field)));
        return None;
    };

    let trimmed = s.trim().to_string();
    if !trimmed.validate_length(None, Some(max as u64), None) {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} characters.",
                label(field),
                max
            ),
        );
        return None;
    }

    Some(trimmed)
}

/// String taken exactly as sent; passwords are never trimmed
pub fn secret(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<String> {
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            errors.add(field, format!("The {} field must be a string.", label(field)));
            None
        }
    }
}

/// Numeric value, given either as a JSON number or a numeric string
pub fn numeric(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<Decimal> {
    let parsed = as_decimal(value);
    if parsed.is_none() {
        errors.add(field, format!("The {} field must be a number.", label(field)));
    }
    parsed
}

pub fn min(errors: &mut ValidationErrors, field: &str, value: Decimal, min: Decimal) -> bool {
    if value < min {
        errors.add(
            field,
            format!("The {} field must be at least {}.", label(field), min),
        );
        return false;
    }
    true
}

/// Amount that fits a NUMERIC(12, 2) column without rounding or overflow
pub fn money(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<Decimal> {
    let amount = numeric(errors, field, value)?;

    if amount.normalize().scale() > MONEY_SCALE {
        errors.add(
            field,
            format!(
                "The {} field must have 0-{} decimal places.",
                label(field),
                MONEY_SCALE
            ),
        );
        return None;
    }

    let max = money_max();
    if amount > max {
        errors.add(
            field,
            format!("The {} field must not be greater than {}.", label(field), max),
        );
        return None;
    }
    if amount < -max {
        errors.add(
            field,
            format!("The {} field must be at least {}.", label(field), -max),
        );
        return None;
    }

    Some(amount)
}

/// Calendar date in `YYYY-MM-DD` form
pub fn date(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<NaiveDate> {
    let parsed = as_date(value);
    if parsed.is_none() {
        errors.add(
            field,
            format!("The {} field must be a valid date.", label(field)),
        );
    }
    parsed
}

/// Integer identifier, given either as a JSON number or a digit string
pub fn integer(errors: &mut ValidationErrors, field: &str, value: &Value) -> Option<i64> {
    let parsed = as_id(value);
    if parsed.is_none() {
        errors.add(
            field,
            format!("The {} field must be an integer.", label(field)),
        );
    }
    parsed
}

pub fn email(errors: &mut ValidationErrors, field: &str, value: &str) -> bool {
    let valid = value.validate_email();
    if !valid {
        errors.add(
            field,
            format!("The {} field must be a valid email address.", label(field)),
        );
    }
    valid
}

pub fn unique_taken(errors: &mut ValidationErrors, field: &str) {
    errors.add(field, format!("The {} has already been taken.", label(field)));
}

pub fn invalid_selection(errors: &mut ValidationErrors, field: &str) {
    errors.add(field, format!("The selected {} is invalid.", label(field)));
}

// =============================================================================
// Coercion (no rule checks)
// =============================================================================

pub fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

pub fn as_date(value: &Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

pub fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Shorthand for a required string capped at the VARCHAR width
pub fn required_string(
    errors: &mut ValidationErrors,
    payload: &Payload,
    field: &str,
) -> Option<String> {
    required(errors, payload, field).and_then(|value| string(errors, field, value, MAX_STRING_LENGTH))
}
