use crate::{filter::Filter, persistent::PersistentDecl, template::QueryKind};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, sync::Arc};

///
/// Config
///
/// Connection-set configuration as supplied by the host framework. The
/// transport fields are carried for the executor implementation; the
/// behavioral flags are consumed here.
///

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub db: String,
    pub user: String,
    pub password: String,

    /// Echo every prepared statement through the diagnostic channel.
    pub log_sql: bool,

    /// Redact backend error detail from callers; the detail still reaches
    /// the diagnostic channel.
    pub conceal_errors: bool,
}

///
/// FilterSpec
///
/// Declarative filter from settings: the clause-slot map itself. Slot names
/// beginning with `_` stay handler configuration. Pre-processors and custom
/// escapers need code and are supplied through [`TableHooks`] instead.
///

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(pub BTreeMap<String, String>);

impl FilterSpec {
    #[must_use]
    pub fn into_filter(self, name: &str) -> Filter {
        Filter::template(name, self.0)
    }
}

///
/// TableSettings
///
/// Per-table overrides merged over introspection defaults.
///

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Fallback identity columns used when introspection finds no primary
    /// key. Each must exist on the table.
    pub default_ids: Vec<String>,

    /// Server-computed columns stripped from insert/update payloads. Reads
    /// return them untouched.
    pub dynamic: Vec<String>,

    /// Filter overrides by name.
    pub filters: BTreeMap<String, FilterSpec>,

    /// Template overrides by query kind name (`row`, `list`, `insert`,
    /// `update`, `del`, `delWhere`, `count`). Unknown keys are ignored.
    pub queries: BTreeMap<String, String>,

    /// Persistent entries carry closures, so they bypass deserialization.
    #[serde(skip)]
    pub persistent: Vec<PersistentDecl>,
}

///
/// TableHooks
///
/// Code-level override points for one table. This is the static replacement
/// for dynamically loaded model modules: hooks are registered up front and
/// applied after settings, so hook-declared names win.
///

pub trait TableHooks: Send + Sync {
    /// Filters to install over the defaults and settings.
    fn filters(&self) -> Vec<Filter> {
        Vec::new()
    }

    /// Template overrides to install over the defaults and settings.
    fn queries(&self) -> Vec<(QueryKind, String)> {
        Vec::new()
    }

    /// Persistent entries to install, replacing same-named settings entries.
    fn persistent(&self) -> Vec<PersistentDecl> {
        Vec::new()
    }
}

///
/// ModelRegistry
///
/// Table name to settings and optional hooks. Tables absent from the
/// registry run on introspection defaults alone.
///

#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelEntry>,
}

#[derive(Clone, Default)]
struct ModelEntry {
    settings: TableSettings,
    hooks: Option<Arc<dyn TableHooks>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, table: impl Into<String>, settings: TableSettings) -> Self {
        self.set_settings(table, settings);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, table: impl Into<String>, hooks: Arc<dyn TableHooks>) -> Self {
        self.set_hooks(table, hooks);
        self
    }

    pub fn set_settings(&mut self, table: impl Into<String>, settings: TableSettings) {
        self.models.entry(table.into()).or_default().settings = settings;
    }

    pub fn set_hooks(&mut self, table: impl Into<String>, hooks: Arc<dyn TableHooks>) {
        self.models.entry(table.into()).or_default().hooks = Some(hooks);
    }

    /// Settings for a table, defaulted when the table is unregistered.
    #[must_use]
    pub fn settings(&self, table: &str) -> TableSettings {
        self.models
            .get(table)
            .map(|entry| entry.settings.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn hooks(&self, table: &str) -> Option<Arc<dyn TableHooks>> {
        self.models.get(table).and_then(|entry| entry.hooks.clone())
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (table, entry) in &self.models {
            map.entry(
                table,
                &format_args!(
                    "settings + {}",
                    if entry.hooks.is_some() { "hooks" } else { "no hooks" }
                ),
            );
        }
        map.finish()
    }
}
