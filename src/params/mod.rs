//! Typed checks over untyped request parameters.
//!
//! Every check returns a `Result`; a rejected value is an ordinary error value the
//! caller turns into a 400 response, never a panic.

pub mod raw;

pub use raw::{DebugMode, RawParams};

use std::fmt;
use thiserror::Error;

/// Longest value echoed back verbatim in an error message.
const PREVIEW_LIMIT: usize = 10;
const PREVIEW_EDGE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Integer,
    Boolean,
    Text,
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedType::Integer => write!(f, "integer"),
            ExpectedType::Boolean => write!(f, "boolean"),
            ExpectedType::Text => write!(f, "string"),
        }
    }
}

/// A raw value that failed a check, before it is tied to a parameter name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    WrongType { raw_value: String, expected: ExpectedType },
    OutOfRange { raw_value: String, min: usize, max: usize },
}

impl Rejected {
    /// Attach the parameter name the value came from
    pub fn named(self, param: &str) -> ParamError {
        match self {
            Rejected::WrongType { raw_value, expected } => ParamError::WrongType {
                param: param.to_string(),
                raw_value,
                expected,
            },
            Rejected::OutOfRange { raw_value, min, max } => ParamError::OutOfRange {
                param: param.to_string(),
                preview: preview(&raw_value),
                min,
                max,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("Value «{raw_value}» from parameter «&{param}={raw_value}» is not type of «{expected}»")]
    WrongType {
        param: String,
        raw_value: String,
        expected: ExpectedType,
    },

    #[error("Value «{preview}» from parameter «&{param}={preview}» is out of range {min}-{max}")]
    OutOfRange {
        param: String,
        preview: String,
        min: usize,
        max: usize,
    },

    #[error("You don't provide required parameter «&{param}=»")]
    Missing { param: String },

    #[error("Value «{raw_value}» from parameter «&{param}={raw_value}» is not one of: {allowed}")]
    NotAllowed {
        param: String,
        raw_value: String,
        allowed: String,
    },
}

pub fn check_integer(raw: &str) -> Result<i64, Rejected> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().map_err(|_| Rejected::WrongType {
        raw_value: raw.to_string(),
        expected: ExpectedType::Integer,
    })
}

/// Accepts the usual truthy/falsy tokens, case-insensitive
pub fn check_bool(raw: &str) -> Result<bool, Rejected> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(Rejected::WrongType {
            raw_value: raw.to_string(),
            expected: ExpectedType::Boolean,
        }),
    }
}

/// Trims the value, then checks its length in characters against `min..=max`
pub fn check_text(raw: &str, min: usize, max: usize) -> Result<String, Rejected> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(Rejected::OutOfRange {
            raw_value: trimmed.to_string(),
            min,
            max,
        });
    }
    Ok(trimmed.to_string())
}

/// `first5...last5` for values longer than ten characters
pub fn preview(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= PREVIEW_LIMIT {
        return value.to_string();
    }
    let head: String = chars[..PREVIEW_EDGE].iter().collect();
    let tail: String = chars[chars.len() - PREVIEW_EDGE..].iter().collect();
    format!("{}...{}", head, tail)
}
