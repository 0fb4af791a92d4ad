//! Error types for the core crate.

use thiserror::Error;

/// Maximum length for value display in error messages.
const MAX_VALUE_DISPLAY_LEN: usize = 100;

/// Errors that can occur in the core crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A value type mismatch occurred.
    #[error("type mismatch: expected {expected}, got {actual}{}", value.as_ref().map(|v| format!(" (value: {})", v)).unwrap_or_default())]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
        /// The value that caused the mismatch (truncated for display).
        value: Option<String>,
    },

    /// A value does not fit the declared column type.
    #[error("value out of range for {sql_type}: {value}")]
    OutOfRange {
        /// The column type.
        sql_type: String,
        /// The offending value.
        value: String,
    },

    /// A validation error occurred.
    #[error("validation error: {0}")]
    Validation(String),
}

impl CoreError {
    /// Creates a type mismatch error without a value.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into(), value: None }
    }

    /// Creates a type mismatch error with a value for debugging.
    ///
    /// The value is truncated to 100 characters for display.
    #[must_use]
    pub fn type_mismatch_with_value(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            value: Some(truncate(value.to_string())),
        }
    }

    /// Creates an out-of-range error.
    #[must_use]
    pub fn out_of_range(sql_type: impl std::fmt::Display, value: impl std::fmt::Display) -> Self {
        Self::OutOfRange { sql_type: sql_type.to_string(), value: truncate(value.to_string()) }
    }
}

fn truncate(value: String) -> String {
    if value.len() > MAX_VALUE_DISPLAY_LEN {
        let mut end = MAX_VALUE_DISPLAY_LEN;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &value[..end])
    } else {
        value
    }
}
