//! Core data types for `BurrowDB`.
//!
//! - [`Value`] - A single typed column value
//! - [`SqlType`] - The declared type of a column

mod sql_type;
mod value;

pub use sql_type::SqlType;
pub use value::Value;
