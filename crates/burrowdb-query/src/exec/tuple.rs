//! The unit of data flowing between plan nodes.

use std::fmt;

use burrowdb_core::Value;

use crate::storage::PagePin;

/// Physical address of a stored row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleLocation {
    /// Owning table.
    pub table: String,
    /// Page number within the table.
    pub page: usize,
    /// Slot number within the page.
    pub slot: usize,
}

impl fmt::Display for TupleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.table, self.page, self.slot)
    }
}

/// One row of values.
///
/// Tuples read from a table carry their [`TupleLocation`] and a pin on the
/// page they came from. The pin is released by [`Tuple::unpin`] or when the
/// tuple is dropped; computed tuples carry neither.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    values: Vec<Value>,
    location: Option<TupleLocation>,
    pin: Option<PagePin>,
}

impl Tuple {
    /// Creates a computed tuple.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, location: None, pin: None }
    }

    /// Creates a tuple backed by a stored row.
    #[must_use]
    pub fn from_storage(values: Vec<Value>, location: TupleLocation, pin: PagePin) -> Self {
        Self { values, location: Some(location), pin: Some(pin) }
    }

    /// Creates a tuple of `width` NULLs.
    #[must_use]
    pub fn nulls(width: usize) -> Self {
        Self::new(vec![Value::Null; width])
    }

    /// Returns the values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the tuple, returning its values and releasing any pin.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the tuple has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the storage location, if this tuple was read from a table.
    #[must_use]
    pub fn location(&self) -> Option<&TupleLocation> {
        self.location.as_ref()
    }

    /// Returns true if this tuple still holds a page pin.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    /// Releases the page pin. The values and location stay readable.
    pub fn unpin(&mut self) {
        self.pin = None;
    }

    /// Returns a computed tuple holding `self`'s values followed by `other`'s.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Self::new(values)
    }

    /// Returns an unpinned copy of the values.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::new(self.values.clone())
    }
}

// Equality is by value; location and pin are bookkeeping.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_and_nulls() {
        let left = Tuple::new(vec![Value::Int(1)]);
        let joined = left.concat(&Tuple::nulls(2));
        assert_eq!(joined.values(), &[Value::Int(1), Value::Null, Value::Null]);
        assert!(!joined.is_pinned());
        assert_eq!(joined.to_string(), "(1, NULL, NULL)");
    }

    #[test]
    fn equality_ignores_location() {
        let a = Tuple::new(vec![Value::Int(1)]);
        let mut b = a.clone();
        b.location = Some(TupleLocation { table: "t".into(), page: 0, slot: 3 });
        assert_eq!(a, b);
    }
}
