use crate::value::Value;
use derive_more::{Deref, DerefMut, IntoIterator};
use std::collections::BTreeMap;

///
/// Params
///
/// Named parameters for one executor call. `prepare` consumes every key it
/// inlines into the SQL text; whatever remains is handed to the executor for
/// driver-native binding.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, IntoIterator, PartialEq)]
pub struct Params(pub BTreeMap<String, Value>);

impl Params {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inline named parameters into a SQL template.
///
/// Every non-numeric key with a whole-word `:key` occurrence is replaced by
/// its escaped literal and removed from `params`. Numeric-looking keys are
/// reserved for positional binding and never touched. `Json` values are
/// serialized to canonical JSON text before escaping.
pub fn prepare<F>(sql: &str, params: &mut Params, escape: F) -> String
where
    F: Fn(&Value) -> String,
{
    let keys: Vec<String> = params.keys().cloned().collect();
    let mut out = sql.to_string();

    for key in keys {
        if is_positional(&key) {
            continue;
        }

        let needle = format!(":{key}");
        let Some(value) = params.get(&key) else {
            continue;
        };

        let literal = match value {
            Value::Json(json) => escape(&Value::Text(json.to_string())),
            other => escape(other),
        };

        let (replaced, hit) = replace_whole_word(&out, &needle, &literal);
        if hit {
            out = replaced;
            params.remove(&key);
        }
    }

    out
}

/// All-digit keys address positional placeholders owned by the driver.
fn is_positional(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Replace whole-word occurrences of `needle`, where the following character
/// must not extend the identifier. `:id` never rewrites into `:ids`.
fn replace_whole_word(sql: &str, needle: &str, replacement: &str) -> (String, bool) {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut hit = false;

    while let Some(pos) = rest.find(needle) {
        let after = &rest[pos + needle.len()..];
        let bounded = after
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_');

        out.push_str(&rest[..pos]);
        if bounded {
            out.push_str(replacement);
            hit = true;
        } else {
            out.push_str(needle);
        }
        rest = after;
    }

    out.push_str(rest);
    (out, hit)
}
