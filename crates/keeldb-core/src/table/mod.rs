mod ops;

pub use ops::{InsertOptions, RowId};

use crate::{
    config::{Config, TableHooks, TableSettings},
    error::{Error, ErrorClass, ErrorOrigin},
    executor::Executor,
    filter::{FilterSet, Filters},
    obs::Metrics,
    persistent::{PersistentCache, PersistentDecl, PersistentError},
    row::Row,
    schema::TableSchema,
    template::{QueryKind, TemplateSet},
    value::Value,
};
use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
};
use thiserror::Error as ThisError;

///
/// TableError
///

#[derive(Debug, ThisError)]
pub enum TableError {
    #[error("table `{0}` has no identity columns; identity-addressed operations are unavailable")]
    NoIdentity(String),

    #[error("a scalar id cannot address the composite identity of `{0}`")]
    ScalarAgainstComposite(String),

    #[error("identity object has no columns")]
    EmptyIdentity,

    #[error("unknown column `{column}` in identity object for `{table}`")]
    UnknownIdentityColumn { table: String, column: String },

    #[error("identity value for `{0}` is missing from the payload")]
    MissingIdentityValue(String),

    #[error("no insertable columns remain in the payload")]
    EmptyInsert,

    #[error("no updatable columns remain in the payload")]
    EmptyUpdate,

    #[error("refusing to delete without an effective filter")]
    UnfilteredDelete,

    #[error("count query returned no usable `count` cell")]
    CountShape,
}

impl TableError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::CountShape => ErrorClass::Backend,
            _ => ErrorClass::Validation,
        }
    }
}

impl From<TableError> for Error {
    fn from(err: TableError) -> Self {
        Self::new(err.class(), ErrorOrigin::Table, err.to_string())
    }
}

///
/// Table
///
/// One introspected table with its filter registry, statement templates, and
/// persistent field cache. Operations live in `ops`; construction and the
/// persistent machinery live here.
///

pub struct Table {
    name: String,
    schema: TableSchema,
    filters: FilterSet,
    templates: TemplateSet,
    dynamic: Vec<String>,
    persistent: PersistentCache,
    executor: Arc<dyn Executor>,
    metrics: Arc<Metrics>,
    log_sql: bool,
    conceal_errors: bool,
}

impl Table {
    /// Introspect and assemble one table.
    ///
    /// Precedence is introspection defaults, then settings, then hooks; the
    /// initial persistent build is the caller's, so startup failures can
    /// escalate while post-mutation refreshes stay log-only.
    pub(crate) fn build(
        executor: Arc<dyn Executor>,
        name: &str,
        settings: TableSettings,
        hooks: Option<&Arc<dyn TableHooks>>,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Result<Self, Error> {
        let mut schema = TableSchema::introspect(executor.as_ref(), name)?;
        if schema.identity_clause().is_none() && !settings.default_ids.is_empty() {
            schema.apply_default_ids(&settings.default_ids)?;
        }

        let mut filters = schema.auto_filters();
        for (filter_name, spec) in settings.filters {
            filters.insert(spec.into_filter(&filter_name));
        }

        let mut templates = TemplateSet::defaults(name);
        for (key, source) in &settings.queries {
            match QueryKind::from_key(key) {
                Some(kind) => templates.set(kind, source),
                None => tracing::warn!(table = name, key, "ignoring unknown query override"),
            }
        }

        let mut persistent = settings.persistent;

        if let Some(hooks) = hooks {
            filters.extend(hooks.filters());
            for (kind, source) in hooks.queries() {
                templates.set(kind, &source);
            }
            for decl in hooks.persistent() {
                merge_persistent(&mut persistent, decl);
            }
        }

        Ok(Self {
            name: name.to_string(),
            schema,
            filters,
            templates,
            dynamic: settings.dynamic,
            persistent: PersistentCache::new(persistent),
            executor,
            metrics,
            log_sql: config.log_sql,
            conceal_errors: config.conceal_errors,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// The resolved filter registry, overrides applied.
    #[must_use]
    pub const fn filters(&self) -> &FilterSet {
        &self.filters
    }

    // -----------------------------------------------------------------
    // Persistent field cache
    // -----------------------------------------------------------------

    /// Defer persistent rebuilds for a bulk operation.
    pub fn suspend_persistent(&self) {
        self.persistent.suspend();
    }

    /// Release one suspension level; the last release rebuilds unless
    /// `skip_rebuild` is set. Resuming an idle cache is a no-op success.
    pub fn resume_persistent(&self, skip_rebuild: bool) -> Result<(), Error> {
        if self.persistent.resume(skip_rebuild) {
            self.rebuild_persistent()
        } else {
            Ok(())
        }
    }

    /// Recompute every persistent entry.
    ///
    /// A rebuild with nothing declared, or while the cache is suspended
    /// (including by another rebuild), is a no-op success. The rebuild holds
    /// its own suspension so mutation callbacks fired by its internal list
    /// cannot recurse into it.
    pub fn rebuild_persistent(&self) -> Result<(), Error> {
        if !self.persistent.has_entries() {
            return Ok(());
        }

        if !self.persistent.begin_rebuild() {
            return Ok(());
        }

        let result = self.fill_persistent();
        self.persistent.end_rebuild();

        result
    }

    /// Cached result of a named producer.
    #[must_use]
    pub fn persistent_value(&self, name: &str) -> Option<Value> {
        self.persistent.value(name)
    }

    /// Snapshot of a named association map, keyed by the configured field.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<BTreeMap<String, Row>> {
        self.persistent.association(name)
    }

    /// Single-row lookup in a named association.
    #[must_use]
    pub fn lookup(&self, name: &str, id: impl Into<Value>) -> Option<Row> {
        self.persistent.lookup(name, id)
    }

    #[cfg(test)]
    pub(crate) fn persistent_suspend_depth(&self) -> u32 {
        self.persistent.suspend_depth()
    }

    /// Post-mutation refresh: log-only, never surfaced to the caller.
    pub(crate) fn refresh_after_mutation(&self) {
        if let Err(err) = self.rebuild_persistent() {
            tracing::warn!(
                table = %self.name,
                error = %err.display_with_class(),
                "persistent cache refresh failed"
            );
        }
    }

    /// Run both rebuild passes and swap the results in together.
    fn fill_persistent(&self) -> Result<(), Error> {
        self.metrics.record_cache_rebuild();

        let mut values = BTreeMap::new();
        let mut associations = BTreeMap::new();

        // Pass 1: producers, declaration order, first failure aborts.
        for entry in self.persistent.entries() {
            if let PersistentDecl::Producer { name, producer } = entry {
                let value = producer().map_err(|err| PersistentError::ProducerFailed {
                    name: name.clone(),
                    message: err.to_string(),
                })?;
                values.insert(name.clone(), value);
            }
        }

        // Pass 2: associations over the full unfiltered row set.
        for entry in self.persistent.entries() {
            if let PersistentDecl::Association { name, field } = entry {
                let rows = self.list(&Filters::new()).map_err(|err| {
                    PersistentError::AssociationListFailed {
                        name: name.clone(),
                        message: err.to_string(),
                    }
                })?;

                let mut map = BTreeMap::new();
                for row in rows {
                    // Rows without a keyable field value are skipped.
                    let Some(key) = row.get(field).and_then(Value::as_key) else {
                        continue;
                    };
                    map.insert(key, row);
                }
                associations.insert(name.clone(), map);
            }
        }

        self.persistent.store(values, associations);

        Ok(())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("filters", &self.filters)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

/// Replace a same-named declaration or append a new one.
fn merge_persistent(entries: &mut Vec<PersistentDecl>, decl: PersistentDecl) {
    match entries.iter_mut().find(|entry| entry.name() == decl.name()) {
        Some(entry) => *entry = decl,
        None => entries.push(decl),
    }
}
