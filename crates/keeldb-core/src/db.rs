use crate::{
    config::{Config, ModelRegistry},
    error::Error,
    executor::Executor,
    obs::{Metrics, MetricsSnapshot},
    params::Params,
    table::Table,
    value::Value,
};
use std::{collections::BTreeMap, fmt, sync::Arc};

///
/// TableSet
///
/// The connection-scoped collection of table handles. `connect` discovers
/// every table, introspects each one, and completes each table's initial
/// persistent build before returning, so a returned set never serves a
/// half-initialized read. Discovery and introspection are strictly
/// sequential.
///

pub struct TableSet {
    executor: Arc<dyn Executor>,
    config: Config,
    models: ModelRegistry,
    tables: BTreeMap<String, Arc<Table>>,
    metrics: Arc<Metrics>,
}

impl TableSet {
    /// Discover and build every table of the configured database.
    pub fn connect(
        executor: Arc<dyn Executor>,
        config: Config,
        models: ModelRegistry,
    ) -> Result<Self, Error> {
        let mut set = Self {
            executor,
            config,
            models,
            tables: BTreeMap::new(),
            metrics: Arc::new(Metrics::new()),
        };
        set.initialize()?;

        Ok(set)
    }

    /// Rerun the full discovery, introspection, and persistent-build
    /// sequence. This is the reconnect path's entry point; transport
    /// supervision itself belongs to the executor.
    pub fn reinitialize(&mut self) -> Result<(), Error> {
        self.tables.clear();
        self.initialize()
    }

    fn initialize(&mut self) -> Result<(), Error> {
        let output = self.executor.query("SHOW TABLES", Params::new())?;

        // One single-column record per table.
        let mut names = Vec::with_capacity(output.rows.len());
        for record in &output.rows {
            let Some(name) = record.values().next().and_then(Value::as_key) else {
                tracing::warn!("skipping malformed table record");
                continue;
            };
            names.push(name);
        }

        tracing::info!(db = %self.config.db, tables = names.len(), "initializing table set");

        for name in names {
            let hooks = self.models.hooks(&name);
            let table = Table::build(
                self.executor.clone(),
                &name,
                self.models.settings(&name),
                hooks.as_ref(),
                &self.config,
                self.metrics.clone(),
            )?;

            // The initial build is the one place persistent failures escalate.
            table.rebuild_persistent()?;

            self.tables.insert(name, Arc::new(table));
        }

        Ok(())
    }

    /// Handle for one table.
    pub fn table(&self, name: &str) -> Result<Arc<Table>, Error> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::table_not_found(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Every table handle, name-ordered.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &Arc<Table>)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Counter snapshot across every table of the set.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl fmt::Debug for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSet")
            .field("db", &self.config.db)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
