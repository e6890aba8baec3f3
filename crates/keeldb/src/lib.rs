//! KeelDB — schema-driven MySQL data access.
//!
//! ## Crate layout
//! - `core`: runtime — schema introspection, filter injection, statement
//!   templates, table operations, and the persistent field cache.
//!
//! The `prelude` module mirrors the surface host code uses day to day;
//! executor implementations and per-table machinery stay one level down.

pub use keeldb_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use keeldb_core::{Error, ErrorClass, ErrorOrigin};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        config::{Config, ModelRegistry, TableHooks, TableSettings},
        db::TableSet,
        error::{Error, ErrorClass, ErrorOrigin},
        executor::{Executor, QueryOutput},
        filter::{Filter, Filters},
        params::Params,
        row::Row,
        table::{InsertOptions, RowId, Table},
        value::Value,
    };
}
