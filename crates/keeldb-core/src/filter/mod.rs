pub mod inject;
pub mod sort;

pub use inject::{ClauseSet, apply, inject};

use crate::{
    error::{Error, ErrorClass, ErrorOrigin},
    value::Value,
};
use std::{fmt, sync::Arc};
use thiserror::Error as ThisError;

/// Clause slots whose name starts with this marker are handler configuration
/// only and never receive injected text.
pub const RESERVED_SLOT_MARKER: char = '_';

/// Value pre-processor applied before escaping.
pub type PreFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Custom escaper overriding the default scalar/list escaping.
pub type EscapeFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

///
/// FilterError
///

#[derive(Debug, ThisError)]
pub enum FilterError {
    #[error("order filter expects a text value")]
    OrderNotText,

    #[error("order filter has no fields")]
    OrderEmpty,

    #[error("order filter field is not a column reference: '{0}'")]
    OrderBadField(String),

    #[error("limit filter bound is not an unsigned integer: '{0}'")]
    LimitBadBound(String),

    #[error("limit filter takes one or two bounds, found {0}")]
    LimitBadArity(usize),
}

impl FilterError {
    pub(crate) const fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Self::new(err.class(), ErrorOrigin::Filter, err.to_string())
    }
}

///
/// Filter
///
/// One named, declarative rewrite rule. Template filters carry a clause-slot
/// map whose injection text substitutes `?` with the escaped request value;
/// the `order` and `limit` built-ins parse their value into a full clause.
///

#[derive(Clone)]
pub struct Filter {
    name: String,
    kind: FilterKind,
    describe: Option<String>,
}

#[derive(Clone)]
pub enum FilterKind {
    Template {
        /// Slot name to injection template, in declaration order.
        slots: Vec<(String, String)>,
        pre: Option<PreFn>,
        escape: Option<EscapeFn>,
    },
    Order,
    Limit,
}

impl Filter {
    /// Build a template filter from a slot map.
    pub fn template<I, S, T>(name: impl Into<String>, slots: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            kind: FilterKind::Template {
                slots: slots
                    .into_iter()
                    .map(|(slot, text)| (slot.into(), text.into()))
                    .collect(),
                pre: None,
                escape: None,
            },
            describe: None,
        }
    }

    /// The universal `order` built-in.
    #[must_use]
    pub fn order() -> Self {
        Self {
            name: "order".to_string(),
            kind: FilterKind::Order,
            describe: Some("Sort by the fields".to_string()),
        }
    }

    /// The universal `limit` built-in.
    #[must_use]
    pub fn limit() -> Self {
        Self {
            name: "limit".to_string(),
            kind: FilterKind::Limit,
            describe: Some("Limit the request <from>,<count>".to_string()),
        }
    }

    /// Attach a value pre-processor, applied before escaping.
    #[must_use]
    pub fn with_pre(mut self, pre: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        if let FilterKind::Template { pre: slot, .. } = &mut self.kind {
            *slot = Some(Arc::new(pre));
        }
        self
    }

    /// Attach a custom escaper, overriding the default scalar/list escaping.
    #[must_use]
    pub fn with_escape(mut self, escape: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        if let FilterKind::Template { escape: slot, .. } = &mut self.kind {
            *slot = Some(Arc::new(escape));
        }
        self
    }

    /// Attach descriptive metadata. No behavioral contract.
    #[must_use]
    pub fn with_describe(mut self, describe: impl Into<String>) -> Self {
        self.describe = Some(describe.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &FilterKind {
        &self.kind
    }

    #[must_use]
    pub fn describe(&self) -> Option<&str> {
        self.describe.as_deref()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Filter");
        debug.field("name", &self.name);

        match &self.kind {
            FilterKind::Template { slots, pre, escape } => {
                debug
                    .field("slots", slots)
                    .field("pre", &pre.is_some())
                    .field("escape", &escape.is_some());
            }
            FilterKind::Order => {
                debug.field("kind", &"order");
            }
            FilterKind::Limit => {
                debug.field("kind", &"limit");
            }
        }

        debug.finish()
    }
}

///
/// FilterSet
///
/// The per-table filter registry. Inserting under an existing name replaces
/// the previous filter, which is how override precedence works: built-ins
/// first, then auto defaults, then settings, then instance hooks.
///

#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    filters: std::collections::BTreeMap<String, Filter>,
}

impl FilterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filter: Filter) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.values()
    }
}

impl Extend<Filter> for FilterSet {
    fn extend<I: IntoIterator<Item = Filter>>(&mut self, iter: I) {
        for filter in iter {
            self.insert(filter);
        }
    }
}

///
/// Filters
///
/// The active filters of one request, in application order. Pushing an
/// already-present name replaces its value in place, keeping the position of
/// the first occurrence.
///

#[derive(Clone, Debug, Default)]
pub struct Filters {
    entries: Vec<(String, Value)>,
}

impl Filters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (name, value) in iter {
            filters.push(name, value);
        }
        filters
    }
}
