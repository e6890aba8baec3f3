use crate::{
    error::{Error, ErrorClass, ErrorOrigin},
    row::Row,
    value::Value,
};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, RwLock},
};
use thiserror::Error as ThisError;

/// Producer for one persistent scalar entry. Invoked with no table-scoped
/// argument; anything it needs it captures itself.
pub type ProducerFn = Arc<dyn Fn() -> Result<Value, Error> + Send + Sync>;

///
/// PersistentError
///

#[derive(Debug, ThisError)]
pub enum PersistentError {
    #[error("persistent producer `{name}` failed: {message}")]
    ProducerFailed { name: String, message: String },

    #[error("persistent association `{name}` failed to list rows: {message}")]
    AssociationListFailed { name: String, message: String },
}

impl PersistentError {
    pub(crate) const fn class(&self) -> ErrorClass {
        ErrorClass::Cache
    }
}

impl From<PersistentError> for Error {
    fn from(err: PersistentError) -> Self {
        Self::new(err.class(), ErrorOrigin::Cache, err.to_string())
    }
}

///
/// PersistentDecl
///
/// One declared persistent entry: a named scalar producer whose result is
/// cached verbatim, or an association indexing the full row set by a field.
///

#[derive(Clone)]
pub enum PersistentDecl {
    Producer { name: String, producer: ProducerFn },
    Association { name: String, field: String },
}

impl PersistentDecl {
    pub fn producer(
        name: impl Into<String>,
        producer: impl Fn() -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self::Producer {
            name: name.into(),
            producer: Arc::new(producer),
        }
    }

    pub fn association(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Association {
            name: name.into(),
            field: field.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Producer { name, .. } | Self::Association { name, .. } => name,
        }
    }
}

impl fmt::Debug for PersistentDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer { name, .. } => f
                .debug_struct("Producer")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::Association { name, field } => f
                .debug_struct("Association")
                .field("name", name)
                .field("field", field)
                .finish(),
        }
    }
}

///
/// PersistentCache
///
/// Derived values cached on a table and recomputed after mutations. The
/// suspend counter is the reentrancy guard: while it is above zero, rebuild
/// requests are deferred; the last `resume` at depth zero reports that a
/// rebuild is due. The table drives the actual fill, because only it can
/// list rows; the cache owns the state machine and the stored results.
///

pub struct PersistentCache {
    entries: Vec<PersistentDecl>,
    suspend: Mutex<u32>,
    values: RwLock<BTreeMap<String, Value>>,
    associations: RwLock<BTreeMap<String, BTreeMap<String, Row>>>,
}

impl PersistentCache {
    #[must_use]
    pub fn new(entries: Vec<PersistentDecl>) -> Self {
        Self {
            entries,
            suspend: Mutex::new(0),
            values: RwLock::new(BTreeMap::new()),
            associations: RwLock::new(BTreeMap::new()),
        }
    }

    /// Declared entries, in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[PersistentDecl] {
        &self.entries
    }

    #[must_use]
    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Defer rebuilds until the matching `resume`.
    pub fn suspend(&self) {
        let mut depth = self.lock_suspend();
        *depth = depth.saturating_add(1);
    }

    /// Release one suspension level.
    ///
    /// Returns `true` when the counter reaches zero and `skip_rebuild` is
    /// unset, which is the caller's cue to rebuild. A `resume` at depth zero
    /// is a no-op.
    #[must_use]
    pub fn resume(&self, skip_rebuild: bool) -> bool {
        let mut depth = self.lock_suspend();

        if *depth == 0 {
            return false;
        }

        *depth -= 1;
        *depth == 0 && !skip_rebuild
    }

    /// Try to start a rebuild, suspending the cache for its duration.
    ///
    /// Returns `false` while suspended: a rebuild request during another
    /// rebuild (or during a bulk suspension) is a successful no-op. On
    /// `true`, the caller must balance with [`Self::end_rebuild`].
    #[must_use]
    pub fn begin_rebuild(&self) -> bool {
        let mut depth = self.lock_suspend();

        if *depth > 0 {
            return false;
        }

        *depth = 1;
        true
    }

    /// Release the rebuild suspension without triggering another rebuild.
    pub fn end_rebuild(&self) {
        let mut depth = self.lock_suspend();
        *depth = depth.saturating_sub(1);
    }

    /// Current suspension depth.
    #[must_use]
    pub fn suspend_depth(&self) -> u32 {
        *self.lock_suspend()
    }

    /// Install freshly built results. Both write locks are held across the
    /// swap so readers never observe a half-rebuilt cache.
    pub fn store(
        &self,
        values: BTreeMap<String, Value>,
        associations: BTreeMap<String, BTreeMap<String, Row>>,
    ) {
        let mut value_slot = self.write_values();
        let mut association_slot = self.write_associations();

        *value_slot = values;
        *association_slot = associations;
    }

    /// Cached result of a named producer.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.read_values().get(name).cloned()
    }

    /// Snapshot of a named association map.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<BTreeMap<String, Row>> {
        self.read_associations().get(name).cloned()
    }

    /// Single-row lookup in a named association.
    #[must_use]
    pub fn lookup(&self, name: &str, id: impl Into<Value>) -> Option<Row> {
        let key = id.into().as_key()?;

        self.read_associations().get(name)?.get(&key).cloned()
    }

    fn lock_suspend(&self) -> std::sync::MutexGuard<'_, u32> {
        self.suspend.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read_values(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.values.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_values(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.values.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read_associations(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, BTreeMap<String, Row>>> {
        self.associations
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_associations(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, BTreeMap<String, Row>>> {
        self.associations
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCache")
            .field("entries", &self.entries)
            .field("suspend", &self.suspend_depth())
            .finish_non_exhaustive()
    }
}
