use crate::{
    error::{Error, ErrorClass, ErrorOrigin},
    executor::Executor,
    filter::{Filter, FilterSet},
    params::Params,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// SchemaError
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("describe returned a column record without a `Field` value")]
    MalformedColumnRecord,

    #[error("table `{0}` has no columns")]
    NoColumns(String),

    #[error("default id column `{column}` does not exist on `{table}`")]
    UnknownDefaultId { table: String, column: String },
}

impl SchemaError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedColumnRecord | Self::NoColumns(_) => ErrorClass::Backend,
            Self::UnknownDefaultId { .. } => ErrorClass::Config,
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::new(err.class(), ErrorOrigin::Schema, err.to_string())
    }
}

///
/// Column
///
/// One introspected column. Immutable once the owning schema is built.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub nullable: bool,
    pub primary: bool,
}

///
/// TableSchema
///
/// Introspected shape of one table: its columns, the identity column
/// sequence, and the identity clause derived from it. The identity sequence
/// normally mirrors the introspected primary key; a `default_ids` fallback
/// can supply it when the table declares none, in which case the `Column`
/// records keep their introspected (non-primary) flags.
///

#[derive(Clone, Debug)]
pub struct TableSchema {
    table: String,
    columns: BTreeMap<String, Column>,
    primary: Vec<String>,
    identity_clause: Option<String>,
}

impl TableSchema {
    /// Introspect a table with ``SHOW COLUMNS``.
    ///
    /// A table without a primary key is not an error: a warning is logged and
    /// the identity clause stays unset, so identity-addressed operations fail
    /// at call time unless a `default_ids` fallback is applied.
    pub fn introspect(executor: &dyn Executor, table: &str) -> Result<Self, Error> {
        let output = executor.query(&format!("SHOW COLUMNS FROM `{table}`"), Params::new())?;

        if output.rows.is_empty() {
            return Err(SchemaError::NoColumns(table.to_string()).into());
        }

        let mut columns = BTreeMap::new();
        let mut primary = Vec::new();

        for record in &output.rows {
            let Some(name) = record.get_str("Field") else {
                return Err(SchemaError::MalformedColumnRecord.into());
            };

            let column = Column {
                name: name.to_string(),
                nullable: record.get_str("Null") == Some("YES"),
                primary: record.get_str("Key") == Some("PRI"),
            };

            if column.primary {
                primary.push(name.to_string());
            }
            columns.insert(name.to_string(), column);
        }

        if primary.is_empty() {
            tracing::warn!(
                table,
                "no primary key found; identity-addressed operations unavailable"
            );
        }

        let identity_clause = build_identity_clause(&primary);

        Ok(Self {
            table: table.to_string(),
            columns,
            primary,
            identity_clause,
        })
    }

    /// Install fallback identity columns for a table without a primary key.
    ///
    /// Each named column must exist. The fallback becomes the identity
    /// sequence and rebuilds the identity clause.
    pub fn apply_default_ids(&mut self, ids: &[String]) -> Result<(), SchemaError> {
        for column in ids {
            if !self.columns.contains_key(column) {
                return Err(SchemaError::UnknownDefaultId {
                    table: self.table.clone(),
                    column: column.clone(),
                });
            }
        }

        self.primary = ids.to_vec();
        self.identity_clause = build_identity_clause(&self.primary);

        Ok(())
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn columns(&self) -> &BTreeMap<String, Column> {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Identity column names, in introspection order.
    #[must_use]
    pub fn primary(&self) -> &[String] {
        &self.primary
    }

    #[must_use]
    pub fn identity_clause(&self) -> Option<&str> {
        self.identity_clause.as_deref()
    }

    /// The full backtick-quoted column list for `select` slots.
    #[must_use]
    pub fn column_list(&self) -> String {
        self.columns
            .keys()
            .map(|name| format!("`{name}`"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Derive the default filter registry: the `order`/`limit` built-ins plus
    /// the six standard filters per column.
    #[must_use]
    pub fn auto_filters(&self) -> FilterSet {
        let table = &self.table;
        let mut filters = FilterSet::new();

        filters.insert(Filter::order());
        filters.insert(Filter::limit());

        for column in self.columns.keys() {
            let reference = format!("`{table}`.`{column}`");

            filters.insert(Filter::template(
                column.clone(),
                [("where", format!("AND {reference} = \"?\""))],
            ));
            filters.insert(Filter::template(
                format!("{column}s"),
                [("where", format!("AND {reference} IN (?)"))],
            ));
            filters.insert(Filter::template(
                format!("not_{column}"),
                [("where", format!("AND {reference} != \"?\""))],
            ));
            filters.insert(Filter::template(
                format!("not_{column}s"),
                [("where", format!("AND {reference} NOT IN (?)"))],
            ));
            filters.insert(Filter::template(
                format!("null_{column}"),
                [("where", format!("AND {reference} IS NULL"))],
            ));
            filters.insert(Filter::template(
                format!("not_null_{column}"),
                [("where", format!("AND {reference} IS NOT NULL"))],
            ));
        }

        filters
    }
}

fn build_identity_clause(primary: &[String]) -> Option<String> {
    if primary.is_empty() {
        return None;
    }

    Some(
        primary
            .iter()
            .map(|column| format!("`{column}` = :{column}"))
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}
