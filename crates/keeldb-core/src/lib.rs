//! Core runtime for KeelDB: schema introspection, templated SQL generation,
//! declarative filter injection, and the per-table persistent field cache,
//! all behind a pluggable [`executor::Executor`].
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod filter;
pub mod obs;
pub mod params;
pub mod persistent;
pub mod row;
pub mod schema;
pub mod table;
pub mod template;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, ErrorClass, ErrorOrigin};

///
/// Prelude
///
/// Prelude contains only domain vocabulary. Executors, templates, and the
/// persistent machinery stay one module level down.
///

pub mod prelude {
    pub use crate::{
        config::{Config, ModelRegistry, TableSettings},
        db::TableSet,
        error::Error,
        filter::{Filter, Filters},
        params::Params,
        row::Row,
        table::{InsertOptions, RowId, Table},
        value::Value,
    };
}
