//! `BurrowDB` Core
//!
//! This crate provides the value model shared by every layer of `BurrowDB`:
//! the typed column values stored in table pages, the SQL column types that
//! describe them, and the error type for value conversions.
//!
//! # Example
//!
//! ```
//! use burrowdb_core::{SqlType, Value};
//!
//! let age: Value = 30i64.into();
//! assert_eq!(age.as_int(), Some(30));
//!
//! // Column types validate and coerce incoming values
//! let stored = SqlType::Double.coerce(age).unwrap();
//! assert_eq!(stored, Value::Float(30.0));
//! ```
//!
//! # Modules
//!
//! - [`types`] - [`Value`] and [`SqlType`]
//! - [`error`] - Error types ([`CoreError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{SqlType, Value};
