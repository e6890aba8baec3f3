use crate::value::Value;
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::Serialize;
use std::collections::BTreeMap;

///
/// Row
///
/// One result record: column name to value, ordered by column name so
/// iteration and rendered SQL stay deterministic.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, IntoIterator, PartialEq, Serialize)]
pub struct Row(pub BTreeMap<String, Value>);

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, for literals in tests and fixtures.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        match self.0.get(column) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.0.get(column) {
            Some(Value::Int(i)) => Some(*i),
            Some(Value::Uint(u)) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_u64(&self, column: &str) -> Option<u64> {
        match self.0.get(column) {
            Some(Value::Uint(u)) => Some(*u),
            Some(Value::Int(i)) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        match self.0.get(column) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_match_variants() {
        let row = Row::new()
            .with("id", 7u64)
            .with("name", "dax")
            .with("active", true);

        assert_eq!(row.get_u64("id"), Some(7));
        assert_eq!(row.get_i64("id"), Some(7), "uint coerces into i64 range");
        assert_eq!(row.get_str("name"), Some("dax"));
        assert_eq!(row.get_bool("active"), Some(true));
    }

    #[test]
    fn getters_return_none_for_missing_or_mismatched_columns() {
        let row = Row::new().with("id", 7u64);

        assert_eq!(row.get_str("id"), None, "uint is not text");
        assert_eq!(row.get_u64("missing"), None);
    }

    #[test]
    fn negative_int_does_not_coerce_to_u64() {
        let row = Row::new().with("delta", -4i64);

        assert_eq!(row.get_u64("delta"), None);
        assert_eq!(row.get_i64("delta"), Some(-4));
    }
}
