//! Seat label normalization.
//!
//! A seat label is compared as an exact string after trimming. Numbers are
//! accepted wherever a label is and are rendered with their usual decimal
//! form, so `7` and `"7"` name the same seat.

use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

/// Longest accepted label, in characters. Matches the column width.
pub const MAX_SEAT_LABEL_LEN: usize = 10;

/// A trimmed, non-empty seat label of at most [`MAX_SEAT_LABEL_LEN`] chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SeatLabel(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatLabelError {
    #[error("seat label is missing")]
    Missing,

    #[error("seat label is empty")]
    Empty,

    #[error("seat label {label:?} is {len} characters long (max {MAX_SEAT_LABEL_LEN})")]
    TooLong { label: String, len: usize },

    #[error("seat label must be a string or a number, got {0}")]
    WrongType(&'static str),
}

impl SeatLabel {
    /// Normalize a textual label.
    pub fn parse(raw: &str) -> Result<Self, SeatLabelError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SeatLabelError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_SEAT_LABEL_LEN {
            return Err(SeatLabelError::TooLong {
                label: trimmed.to_owned(),
                len,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Normalize a label taken from untyped JSON, coercing numbers.
    pub fn from_json(value: &Value) -> Result<Self, SeatLabelError> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => Self::parse(&number_label(n)),
            Value::Null => Err(SeatLabelError::Missing),
            other => Err(SeatLabelError::WrongType(json_type_name(other))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integral floats render without a fraction, so `7.0` is seat `7`.
fn number_label(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                return (f as i64).to_string();
            }
        }
    }
    n.to_string()
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
