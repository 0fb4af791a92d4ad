//! Declared SQL column types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::CoreError;

/// The declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// `BOOLEAN`
    Boolean,
    /// `TINYINT` (8-bit)
    TinyInt,
    /// `SMALLINT` (16-bit)
    SmallInt,
    /// `INTEGER` (32-bit)
    Integer,
    /// `BIGINT` (64-bit)
    BigInt,
    /// `FLOAT`
    Float,
    /// `DOUBLE`
    Double,
    /// `CHAR(n)`
    Char(u16),
    /// `VARCHAR(n)`
    VarChar(u16),
}

impl SqlType {
    /// Returns true for the integer and floating-point families.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt | Self::Float | Self::Double
        )
    }

    /// Returns true for the integer family.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt)
    }

    /// Estimated on-page width of a value of this type, in bytes.
    #[must_use]
    pub const fn storage_size(self) -> usize {
        match self {
            Self::Boolean | Self::TinyInt => 1,
            Self::SmallInt => 2,
            Self::Integer | Self::Float => 4,
            Self::BigInt | Self::Double => 8,
            Self::Char(n) => n as usize,
            // Assume variable-length columns are half full, plus a length prefix.
            Self::VarChar(n) => n as usize / 2 + 2,
        }
    }

    /// Validates `value` against this type, converting it where SQL allows.
    ///
    /// NULL is accepted by every type. Integers widen to floating point;
    /// integers must fit the declared width and strings the declared length.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] when the value has the wrong type
    /// and [`CoreError::OutOfRange`] when it does not fit.
    pub fn coerce(self, value: Value) -> Result<Value, CoreError> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Boolean, v @ Value::Bool(_)) => Ok(v),
            (ty, Value::Int(i)) if ty.is_integer() => {
                let (min, max) = match ty {
                    Self::TinyInt => (i64::from(i8::MIN), i64::from(i8::MAX)),
                    Self::SmallInt => (i64::from(i16::MIN), i64::from(i16::MAX)),
                    Self::Integer => (i64::from(i32::MIN), i64::from(i32::MAX)),
                    _ => (i64::MIN, i64::MAX),
                };
                if (min..=max).contains(&i) {
                    Ok(Value::Int(i))
                } else {
                    Err(CoreError::out_of_range(ty, i))
                }
            }
            (Self::Float | Self::Double, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Float | Self::Double, v @ Value::Float(_)) => Ok(v),
            (ty @ (Self::Char(n) | Self::VarChar(n)), Value::String(s)) => {
                if s.chars().count() <= usize::from(n) {
                    Ok(Value::String(s))
                } else {
                    Err(CoreError::out_of_range(ty, s))
                }
            }
            (ty, v) => Err(CoreError::type_mismatch_with_value(ty.to_string(), v.type_name(), v)),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::TinyInt => write!(f, "TINYINT"),
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Char(n) => write!(f, "CHAR({n})"),
            Self::VarChar(n) => write!(f, "VARCHAR({n})"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numeric_families() {
        assert!(SqlType::Integer.is_numeric());
        assert!(SqlType::Double.is_numeric());
        assert!(!SqlType::VarChar(10).is_numeric());
        assert!(!SqlType::Boolean.is_numeric());
        assert!(!SqlType::Float.is_integer());
    }

    #[test]
    fn coerce_widens_integers_to_float() {
        assert_eq!(SqlType::Double.coerce(Value::Int(3)), Ok(Value::Float(3.0)));
    }

    #[test]
    fn coerce_rejects_overflow() {
        let err = SqlType::TinyInt.coerce(Value::Int(300)).unwrap_err();
        assert!(matches!(err, CoreError::OutOfRange { .. }));
        assert_eq!(SqlType::TinyInt.coerce(Value::Int(-128)), Ok(Value::Int(-128)));
    }

    #[test]
    fn coerce_checks_string_length() {
        assert!(SqlType::VarChar(3).coerce(Value::from("abcd")).is_err());
        assert_eq!(SqlType::Char(4).coerce(Value::from("ab")), Ok(Value::from("ab")));
    }

    #[test]
    fn coerce_rejects_wrong_type() {
        let err = SqlType::Integer.coerce(Value::from("x")).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert_eq!(SqlType::Integer.coerce(Value::Null), Ok(Value::Null));
    }
}
