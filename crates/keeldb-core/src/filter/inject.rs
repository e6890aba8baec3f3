use crate::{
    filter::{FilterError, FilterKind, FilterSet, Filters, RESERVED_SLOT_MARKER, sort},
    template::Template,
    value::Value,
};
use std::collections::BTreeMap;

///
/// ClauseSet
///
/// Accumulated clause text per slot. Filters append fragments through `add`,
/// which de-duplicates per slot by injection-template identity; operations
/// fill structural slots (`select`, `whereClause`, `values`, ...) through
/// `set`. Rendering reads the accumulated text back out of here, so marker
/// strings never travel through the SQL text itself.
///

#[derive(Clone, Debug, Default)]
pub struct ClauseSet {
    slots: BTreeMap<String, SlotFill>,
}

#[derive(Clone, Debug, Default)]
struct SlotFill {
    /// Injection templates already applied to this slot, in application order.
    seen: Vec<String>,
    text: String,
}

impl ClauseSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill a slot directly, replacing anything already accumulated.
    pub fn set(&mut self, slot: impl Into<String>, text: impl Into<String>) {
        self.slots.insert(
            slot.into(),
            SlotFill {
                seen: Vec::new(),
                text: text.into(),
            },
        );
    }

    /// Append a filter fragment to a slot.
    ///
    /// The same injection template contributes at most once per slot; repeat
    /// applications are dropped and `false` is returned. Distinct templates
    /// accumulate space-joined, in application order.
    pub fn add(&mut self, slot: &str, template: &str, text: &str) -> bool {
        let fill = self.slots.entry(slot.to_string()).or_default();

        if fill.seen.iter().any(|seen| seen == template) {
            return false;
        }

        fill.seen.push(template.to_string());
        if !fill.text.is_empty() {
            fill.text.push(' ');
        }
        fill.text.push_str(text);

        true
    }

    /// Accumulated text for a slot, when any.
    #[must_use]
    pub fn text(&self, slot: &str) -> Option<&str> {
        self.slots
            .get(slot)
            .map(|fill| fill.text.as_str())
            .filter(|text| !text.is_empty())
    }

    #[must_use]
    pub fn has(&self, slot: &str) -> bool {
        self.text(slot).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|fill| fill.text.is_empty())
    }
}

/// Merge the active filters of one request into a clause set.
///
/// Entries are processed in `active` iteration order; names missing from the
/// registry are skipped silently. Template filters run pre-processing,
/// escaping, and `?` substitution per declared slot; the `order`/`limit`
/// built-ins parse their value into a single clause, de-duplicated by the
/// produced text.
pub fn apply<F>(
    clauses: &mut ClauseSet,
    active: &Filters,
    registry: &FilterSet,
    escape: F,
) -> Result<(), FilterError>
where
    F: Fn(&Value) -> String,
{
    for (name, raw) in active.iter() {
        let Some(filter) = registry.get(name) else {
            continue;
        };

        match filter.kind() {
            FilterKind::Order => {
                let clause = sort::order_clause(raw)?;
                clauses.add("order", &clause, &clause);
            }
            FilterKind::Limit => {
                let clause = sort::limit_clause(raw)?;
                clauses.add("limit", &clause, &clause);
            }
            FilterKind::Template { slots, pre, escape: custom } => {
                let value = match pre {
                    Some(pre) => pre(raw.clone()),
                    None => raw.clone(),
                };

                let escaped = match custom {
                    Some(custom) => custom(&value),
                    None => escape_for_injection(&value, &escape),
                };

                for (slot, template) in slots {
                    if slot.starts_with(RESERVED_SLOT_MARKER) {
                        continue;
                    }

                    let rendered = template.replace('?', &escaped);
                    clauses.add(slot, template, &rendered);
                }
            }
        }
    }

    Ok(())
}

/// Rewrite one template under a set of active filters.
pub fn inject<F>(
    template: &Template,
    active: &Filters,
    registry: &FilterSet,
    escape: F,
) -> Result<String, FilterError>
where
    F: Fn(&Value) -> String,
{
    let mut clauses = ClauseSet::new();
    apply(&mut clauses, active, registry, escape)?;

    Ok(template.render(&clauses))
}

/// Default injection escaping.
///
/// Lists escape element-wise and join with commas, quoting intact, which is
/// what IN-clause templates expect. Scalars escape and then shed surrounding
/// single quotes so the injection template's own quoting or list syntax can
/// wrap the literal.
fn escape_for_injection<F>(value: &Value, escape: &F) -> String
where
    F: Fn(&Value) -> String,
{
    match value {
        Value::List(items) => items
            .iter()
            .map(escape)
            .collect::<Vec<_>>()
            .join(","),
        scalar => strip_quotes(escape(scalar)),
    }
}

fn strip_quotes(text: String) -> String {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        text[1..text.len() - 1].to_string()
    } else {
        text
    }
}
