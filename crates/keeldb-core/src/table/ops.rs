use super::{Table, TableError};
use crate::{
    error::Error,
    executor::QueryOutput,
    filter::{self, ClauseSet, Filters},
    obs::OpKind,
    params::{self, Params},
    row::Row,
    template::QueryKind,
    value::Value,
};
use std::collections::BTreeMap;

/// Caller-facing message when backend detail is redacted.
const CONCEALED: &str = "database request failed";

///
/// RowId
///
/// An operation address: a scalar bound to the single identity column, or a
/// column-to-value object matched by name.
///

#[derive(Clone, Debug)]
pub enum RowId {
    Scalar(Value),
    Composite(BTreeMap<String, Value>),
}

impl From<Value> for RowId {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<i32> for RowId {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<u32> for RowId {
    fn from(value: u32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<String> for RowId {
    fn from(value: String) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<BTreeMap<String, Value>> for RowId {
    fn from(keys: BTreeMap<String, Value>) -> Self {
        Self::Composite(keys)
    }
}

impl From<Row> for RowId {
    fn from(row: Row) -> Self {
        Self::Composite(row.0)
    }
}

///
/// InsertOptions
///

#[derive(Clone, Debug, Default)]
pub struct InsertOptions {
    /// `ON DUPLICATE KEY UPDATE` assignments, rendered verbatim after the
    /// keyword, e.g. `` `name` = VALUES(`name`) ``.
    pub duplicate: Option<String>,
}

impl InsertOptions {
    #[must_use]
    pub fn on_duplicate(assignments: impl Into<String>) -> Self {
        Self {
            duplicate: Some(assignments.into()),
        }
    }
}

impl Table {
    /// Fetch one row by id.
    ///
    /// A scalar id addresses the single identity column; an object id matches
    /// its columns by name. Filters apply on top of the identity clause.
    pub fn row(&self, id: impl Into<RowId>, filters: &Filters) -> Result<Option<Row>, Error> {
        let mut params = Params::new();

        let clause = match id.into() {
            RowId::Scalar(value) => {
                let (clause, column) = self.scalar_identity()?;
                let clause = clause.to_string();
                params.set(column.to_string(), value);
                clause
            }
            RowId::Composite(keys) => self.identity_parts(&keys, &mut params)?.join(" AND "),
        };

        let mut clauses = ClauseSet::new();
        clauses.set("select", self.schema.column_list());
        clauses.set("whereClause", clause);
        self.apply_filters(&mut clauses, filters)?;

        let sql = self.templates.get(QueryKind::Row).render(&clauses);
        let output = self.execute(OpKind::Row, &sql, params)?;
        self.metrics.add_rows_read(count_rows(&output));

        Ok(output.first())
    }

    /// List rows under the active filters.
    pub fn list(&self, filters: &Filters) -> Result<Vec<Row>, Error> {
        let mut clauses = ClauseSet::new();
        clauses.set("select", self.schema.column_list());
        self.apply_filters(&mut clauses, filters)?;

        let sql = self.templates.get(QueryKind::List).render(&clauses);
        let output = self.execute(OpKind::List, &sql, Params::new())?;
        self.metrics.add_rows_read(count_rows(&output));

        Ok(output.rows)
    }

    /// Insert one row. Unknown and dynamic columns are stripped first.
    ///
    /// Returns the engine-assigned id when the identity is auto-increment.
    pub fn insert(&self, data: Row, options: &InsertOptions) -> Result<Option<u64>, Error> {
        let data = self.restrict(data);
        if data.is_empty() {
            return Err(TableError::EmptyInsert.into());
        }

        let mut params = Params::new();
        let mut columns = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());

        for (column, value) in data.0 {
            columns.push(format!("`{column}`"));
            values.push(format!(":{column}"));
            params.set(column, value);
        }

        let mut clauses = ClauseSet::new();
        clauses.set("columns", columns.join(", "));
        clauses.set("values", values.join(", "));
        if let Some(assignments) = &options.duplicate {
            clauses.set("duplicate", format!("ON DUPLICATE KEY UPDATE {assignments}"));
        }

        let sql = self.templates.get(QueryKind::Insert).render(&clauses);
        let output = self.execute(OpKind::Insert, &sql, params)?;
        self.metrics.add_rows_written(output.affected_rows);
        self.refresh_after_mutation();

        Ok(output.last_insert_id)
    }

    /// Update one row, addressed by the identity values inside the payload.
    ///
    /// Identity columns are never assigned; every one of them must be present
    /// in the payload to form the where clause.
    pub fn update(&self, data: Row) -> Result<u64, Error> {
        let identity = self
            .schema
            .identity_clause()
            .ok_or_else(|| TableError::NoIdentity(self.name.clone()))?
            .to_string();

        let data = self.restrict(data);

        let mut params = Params::new();
        let mut assignments = Vec::new();

        for (column, value) in &data.0 {
            if self.schema.primary().contains(column) {
                continue;
            }
            assignments.push(format!("`{column}` = :{column}"));
            params.set(column.clone(), value.clone());
        }

        if assignments.is_empty() {
            return Err(TableError::EmptyUpdate.into());
        }

        for column in self.schema.primary() {
            let Some(value) = data.get(column) else {
                return Err(TableError::MissingIdentityValue(column.clone()).into());
            };
            params.set(column.clone(), value.clone());
        }

        let mut clauses = ClauseSet::new();
        clauses.set("values", assignments.join(", "));
        clauses.set("whereClause", identity);

        let sql = self.templates.get(QueryKind::Update).render(&clauses);
        let output = self.execute(OpKind::Update, &sql, params)?;
        self.metrics.add_rows_written(output.affected_rows);
        self.refresh_after_mutation();

        Ok(output.affected_rows)
    }

    /// Delete by id. A scalar id uses the identity clause; an object id
    /// builds a by-name conjunction over the open delete template.
    pub fn del(&self, id: impl Into<RowId>) -> Result<u64, Error> {
        let mut params = Params::new();

        let sql = match id.into() {
            RowId::Scalar(value) => {
                let (clause, column) = self.scalar_identity()?;
                let clause = clause.to_string();
                params.set(column.to_string(), value);

                let mut clauses = ClauseSet::new();
                clauses.set("whereClause", clause);
                self.templates.get(QueryKind::Del).render(&clauses)
            }
            RowId::Composite(keys) => {
                let parts = self.identity_parts(&keys, &mut params)?;

                let mut clauses = ClauseSet::new();
                clauses.set("where", format!("AND {}", parts.join(" AND ")));
                self.templates.get(QueryKind::DelWhere).render(&clauses)
            }
        };

        let output = self.execute(OpKind::Del, &sql, params)?;
        self.metrics.add_rows_written(output.affected_rows);
        self.refresh_after_mutation();

        Ok(output.affected_rows)
    }

    /// Delete every row matched by the filters.
    ///
    /// Filters that contribute no `where` text would delete the whole table;
    /// that is refused.
    pub fn del_where(&self, filters: &Filters) -> Result<u64, Error> {
        let mut clauses = ClauseSet::new();
        self.apply_filters(&mut clauses, filters)?;

        if !clauses.has("where") {
            return Err(TableError::UnfilteredDelete.into());
        }

        let sql = self.templates.get(QueryKind::DelWhere).render(&clauses);
        let output = self.execute(OpKind::DelWhere, &sql, Params::new())?;
        self.metrics.add_rows_written(output.affected_rows);
        self.refresh_after_mutation();

        Ok(output.affected_rows)
    }

    /// Count rows under the active filters.
    pub fn count(&self, filters: &Filters) -> Result<u64, Error> {
        let mut clauses = ClauseSet::new();
        self.apply_filters(&mut clauses, filters)?;

        let sql = self.templates.get(QueryKind::Count).render(&clauses);
        let output = self.execute(OpKind::Count, &sql, Params::new())?;

        let count = output
            .first()
            .and_then(|row| row.get_u64("count"))
            .ok_or(TableError::CountShape)?;

        Ok(count)
    }

    /// Whether any row matches the active filters.
    pub fn exists(&self, filters: &Filters) -> Result<bool, Error> {
        Ok(self.count(filters)? > 0)
    }

    /// Run a handwritten statement through the named-parameter preprocessor.
    pub fn query(&self, sql: &str, params: Params) -> Result<Vec<Row>, Error> {
        let output = self.execute(OpKind::Query, sql, params)?;
        self.metrics.add_rows_read(count_rows(&output));

        Ok(output.rows)
    }

    /// `query`, first row only.
    pub fn query_row(&self, sql: &str, params: Params) -> Result<Option<Row>, Error> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Preprocess, log, execute, and account one statement.
    fn execute(&self, op: OpKind, sql: &str, mut params: Params) -> Result<QueryOutput, Error> {
        self.metrics.record_call(op);

        let sql = params::prepare(sql, &mut params, |value| self.executor.escape(value));
        if self.log_sql {
            tracing::debug!(table = %self.name, sql = %sql, "executing");
        }

        match self.executor.query(&sql, params) {
            Ok(output) => Ok(output),
            Err(err) => {
                self.metrics.record_backend_error();

                if self.conceal_errors {
                    // Full detail stays on the diagnostic channel only.
                    tracing::error!(
                        table = %self.name,
                        error = %err.display_with_class(),
                        "backend failure"
                    );
                    Err(Error::backend(CONCEALED))
                } else {
                    Err(err)
                }
            }
        }
    }

    fn apply_filters(&self, clauses: &mut ClauseSet, filters: &Filters) -> Result<(), Error> {
        filter::apply(clauses, filters, &self.filters, |value| {
            self.executor.escape(value)
        })?;

        Ok(())
    }

    /// The identity clause and column of a single-column identity.
    fn scalar_identity(&self) -> Result<(&str, &str), TableError> {
        let clause = self
            .schema
            .identity_clause()
            .ok_or_else(|| TableError::NoIdentity(self.name.clone()))?;

        match self.schema.primary() {
            [column] => Ok((clause, column.as_str())),
            _ => Err(TableError::ScalarAgainstComposite(self.name.clone())),
        }
    }

    /// Validate a by-name identity object and fill its parameters.
    fn identity_parts(
        &self,
        keys: &BTreeMap<String, Value>,
        params: &mut Params,
    ) -> Result<Vec<String>, TableError> {
        if keys.is_empty() {
            return Err(TableError::EmptyIdentity);
        }

        let mut parts = Vec::with_capacity(keys.len());
        for (column, value) in keys {
            if !self.schema.has_column(column) {
                return Err(TableError::UnknownIdentityColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }

            parts.push(format!("`{column}` = :{column}"));
            params.set(column.clone(), value.clone());
        }

        Ok(parts)
    }

    /// Drop unknown and dynamic columns from a payload.
    fn restrict(&self, data: Row) -> Row {
        data.0
            .into_iter()
            .filter(|(column, _)| self.schema.has_column(column) && !self.dynamic.contains(column))
            .collect()
    }
}

fn count_rows(output: &QueryOutput) -> u64 {
    u64::try_from(output.rows.len()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, TableSettings},
        error::{ErrorClass, ErrorOrigin},
        obs::Metrics,
        persistent::PersistentDecl,
        test_support::{ScriptedExecutor, describe_output, users_describe},
    };
    use std::sync::Arc;

    /// Collapse runs of whitespace so dropped-slot gaps stay out of the way.
    fn flat(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn build_table(
        executor: &Arc<ScriptedExecutor>,
        table: &str,
        settings: TableSettings,
        config: Config,
    ) -> Table {
        Table::build(
            executor.clone(),
            table,
            settings,
            None,
            &config,
            Arc::new(Metrics::new()),
        )
        .expect("table builds")
    }

    fn users(executor: &Arc<ScriptedExecutor>) -> Table {
        executor.push(users_describe());
        build_table(executor, "users", TableSettings::default(), Config::default())
    }

    fn badges(executor: &Arc<ScriptedExecutor>) -> Table {
        executor.push(describe_output(&[
            ("tag", false, true),
            ("realm", false, true),
            ("label", false, false),
        ]));
        build_table(executor, "badges", TableSettings::default(), Config::default())
    }

    #[test]
    fn row_addresses_the_scalar_identity() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::from_rows(vec![
            Row::new().with("id", 7u64).with("name", "A").with("email", "a@x"),
        ]));

        let row = table.row(7u64, &Filters::new()).expect("row query");

        assert_eq!(row.expect("row present").get_str("name"), Some("A"));
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "SELECT `email`, `id`, `name` FROM `users` WHERE `id` = 7"
        );
        assert!(
            executor.last_params().expect("params recorded").is_empty(),
            "identity parameter is consumed by the preprocessor"
        );
    }

    #[test]
    fn row_matches_object_ids_by_column_name() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = badges(&executor);

        let id: BTreeMap<String, Value> = [
            ("realm".to_string(), Value::from("emea")),
            ("tag".to_string(), Value::from(3u64)),
        ]
        .into_iter()
        .collect();

        table.row(id, &Filters::new()).expect("row query");

        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "SELECT `label`, `realm`, `tag` FROM `badges` WHERE `realm` = 'emea' AND `tag` = 3"
        );
    }

    #[test]
    fn scalar_id_cannot_address_a_composite_identity() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = badges(&executor);

        let err = table.row(3u64, &Filters::new()).expect_err("must refuse");

        assert_eq!(err.class, ErrorClass::Validation);
        assert_eq!(err.origin, ErrorOrigin::Table);
        assert_eq!(executor.call_count(), 1, "nothing runs after the describe");
    }

    #[test]
    fn object_ids_reject_unknown_columns() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        let id: BTreeMap<String, Value> =
            [("ghost".to_string(), Value::from(1u64))].into_iter().collect();
        let err = table.row(id, &Filters::new()).expect_err("must refuse");

        assert!(err.is_validation());
        assert!(err.message.contains("`ghost`"), "error names the column: {}", err.message);
    }

    #[test]
    fn identity_operations_fail_without_a_primary_key() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(describe_output(&[("a", false, false)]));
        let table = build_table(&executor, "log", TableSettings::default(), Config::default());

        let err = table.row(1u64, &Filters::new()).expect_err("row must fail");
        assert!(
            err.message.contains("no identity columns"),
            "unexpected message: {}",
            err.message
        );

        let err = table
            .update(Row::new().with("a", 1u64))
            .expect_err("update must fail");
        assert!(err.is_validation());
    }

    #[test]
    fn list_injects_filters_order_and_limit() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::from_rows(vec![Row::new().with("id", 1u64)]));

        let filters = Filters::new()
            .with("names", Value::from_slice(&["A", "B"]))
            .with("order", "name")
            .with("limit", "10");
        let rows = table.list(&filters).expect("list");

        assert_eq!(rows.len(), 1);
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "SELECT `email`, `id`, `name` FROM `users` WHERE 1 \
             AND `users`.`name` IN ('A','B') ORDER BY `name` LIMIT 10"
        );
    }

    #[test]
    fn insert_strips_unknown_columns_and_returns_the_assigned_id() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::affected(1).with_last_insert_id(41));

        let id = table
            .insert(
                Row::new().with("name", "A").with("email", "a@x").with("ghost", 1u64),
                &InsertOptions::default(),
            )
            .expect("insert");

        assert_eq!(id, Some(41));
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "INSERT INTO `users` ( `email`, `name`) VALUES ( 'a@x', 'A')"
        );
    }

    #[test]
    fn insert_renders_the_duplicate_clause() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::affected(2));

        table
            .insert(
                Row::new().with("name", "A"),
                &InsertOptions::on_duplicate("`name` = VALUES(`name`)"),
            )
            .expect("insert");

        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "INSERT INTO `users` ( `name`) VALUES ( 'A') \
             ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        );
    }

    #[test]
    fn insert_with_no_usable_columns_is_refused() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        let err = table
            .insert(Row::new().with("ghost", 1u64), &InsertOptions::default())
            .expect_err("must refuse");

        assert!(err.is_validation());
        assert_eq!(executor.call_count(), 1, "nothing runs after the describe");
    }

    #[test]
    fn dynamic_columns_are_stripped_from_writes_only() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(users_describe());
        let table = build_table(
            &executor,
            "users",
            TableSettings {
                dynamic: vec!["email".to_string()],
                ..TableSettings::default()
            },
            Config::default(),
        );

        executor.push(QueryOutput::affected(1));
        table
            .insert(
                Row::new().with("name", "A").with("email", "a@x"),
                &InsertOptions::default(),
            )
            .expect("insert");

        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "INSERT INTO `users` ( `name`) VALUES ( 'A')"
        );
    }

    #[test]
    fn update_assigns_everything_but_the_identity() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::affected(1));

        let affected = table
            .update(Row::new().with("id", 7u64).with("name", "B").with("email", "b@x"))
            .expect("update");

        assert_eq!(affected, 1);
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "UPDATE `users` SET `email` = 'b@x', `name` = 'B' WHERE `id` = 7"
        );
    }

    #[test]
    fn update_requires_the_identity_value() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        let err = table
            .update(Row::new().with("name", "B"))
            .expect_err("must refuse");

        assert!(err.message.contains("`id`"), "error names the column: {}", err.message);
    }

    #[test]
    fn update_with_only_identity_columns_is_refused() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        let err = table
            .update(Row::new().with("id", 7u64))
            .expect_err("must refuse");

        assert!(err.message.contains("updatable"), "unexpected message: {}", err.message);
    }

    #[test]
    fn del_by_scalar_uses_the_identity_template() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::affected(1));

        let affected = table.del(7u64).expect("delete");

        assert_eq!(affected, 1);
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "DELETE FROM `users` WHERE `id` = 7"
        );
    }

    #[test]
    fn del_by_object_builds_a_by_name_conjunction() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = badges(&executor);

        executor.push(QueryOutput::affected(1));

        let id: BTreeMap<String, Value> = [
            ("realm".to_string(), Value::from("emea")),
            ("tag".to_string(), Value::from(3u64)),
        ]
        .into_iter()
        .collect();
        table.del(id).expect("delete");

        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "DELETE FROM `badges` WHERE 1 AND `realm` = 'emea' AND `tag` = 3"
        );
    }

    #[test]
    fn del_where_deletes_only_under_an_effective_filter() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::affected(2));
        let affected = table
            .del_where(&Filters::new().with("name", "A"))
            .expect("filtered delete");

        assert_eq!(affected, 2);
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "DELETE FROM `users` WHERE 1 AND `users`.`name` = \"A\""
        );
    }

    #[test]
    fn del_where_refuses_filters_with_no_where_text() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        let err = table
            .del_where(&Filters::new().with("order", "name"))
            .expect_err("must refuse");

        assert!(err.is_validation());
        assert_eq!(executor.call_count(), 1, "nothing runs after the describe");
    }

    #[test]
    fn count_reads_the_count_cell() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::from_rows(vec![Row::new().with("count", 3u64)]));
        assert_eq!(table.count(&Filters::new()).expect("count"), 3);
        assert_eq!(
            flat(&executor.last_sql().expect("sql recorded")),
            "SELECT COUNT(*) AS `count` FROM `users` WHERE 1"
        );

        executor.push(QueryOutput::from_rows(vec![Row::new().with("count", 0u64)]));
        assert!(!table.exists(&Filters::new()).expect("exists"));
    }

    #[test]
    fn count_without_a_count_cell_is_a_backend_error() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::from_rows(vec![Row::new().with("n", 3u64)]));
        let err = table.count(&Filters::new()).expect_err("must fail");

        assert_eq!(err.class, ErrorClass::Backend);
        assert_eq!(err.origin, ErrorOrigin::Table);
    }

    #[test]
    fn query_runs_handwritten_sql_through_the_preprocessor() {
        let executor = Arc::new(ScriptedExecutor::new());
        let table = users(&executor);

        executor.push(QueryOutput::from_rows(vec![Row::new().with("n", 1u64)]));

        let rows = table
            .query(
                "SELECT COUNT(*) AS `n` FROM `users` WHERE `id` = :id AND `active` = :active",
                Params::new().with("id", 7u64).with("active", true),
            )
            .expect("query");

        assert_eq!(rows.len(), 1);
        assert_eq!(
            executor.last_sql().expect("sql recorded"),
            "SELECT COUNT(*) AS `n` FROM `users` WHERE `id` = 7 AND `active` = true"
        );
        assert!(
            executor.last_params().expect("params recorded").is_empty(),
            "consumed keys leave the parameter set"
        );
    }

    #[test]
    fn conceal_errors_redacts_backend_detail() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(users_describe());
        let table = build_table(
            &executor,
            "users",
            TableSettings::default(),
            Config {
                conceal_errors: true,
                ..Config::default()
            },
        );

        executor.push_err(Error::backend("ER_ACCESS_DENIED: secret dsn"));
        let err = table.list(&Filters::new()).expect_err("backend failure");

        assert_eq!(err.class, ErrorClass::Backend);
        assert_eq!(err.message, CONCEALED);
    }

    #[test]
    fn operations_account_their_metrics() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(users_describe());
        let metrics = Arc::new(Metrics::new());
        let table = Table::build(
            executor.clone(),
            "users",
            TableSettings::default(),
            None,
            &Config::default(),
            metrics.clone(),
        )
        .expect("table builds");

        executor.push(QueryOutput::from_rows(vec![
            Row::new().with("id", 1u64),
            Row::new().with("id", 2u64),
        ]));
        table.list(&Filters::new()).expect("list");

        executor.push(QueryOutput::affected(1).with_last_insert_id(3));
        table
            .insert(Row::new().with("name", "A"), &InsertOptions::default())
            .expect("insert");

        executor.push_err(Error::backend("gone"));
        table.list(&Filters::new()).expect_err("backend failure");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.list_calls, 2);
        assert_eq!(snapshot.insert_calls, 1);
        assert_eq!(snapshot.rows_read, 2);
        assert_eq!(snapshot.rows_written, 1);
        assert_eq!(snapshot.backend_errors, 1);
    }

    #[test]
    fn mutations_refresh_the_persistent_cache() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(users_describe());
        let table = build_table(
            &executor,
            "users",
            TableSettings {
                persistent: vec![PersistentDecl::association("by_id", "id")],
                ..TableSettings::default()
            },
            Config::default(),
        );

        // Insert response, then the refresh's list response.
        executor.push(QueryOutput::affected(1).with_last_insert_id(1));
        executor.push(QueryOutput::from_rows(vec![
            Row::new().with("id", 1u64).with("name", "A"),
        ]));

        table
            .insert(Row::new().with("name", "A"), &InsertOptions::default())
            .expect("insert");

        assert_eq!(
            table.lookup("by_id", 1u64).expect("cached row").get_str("name"),
            Some("A")
        );
        assert_eq!(executor.call_count(), 3, "describe, insert, refresh list");
    }

    #[test]
    fn suspension_defers_the_mutation_refresh() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.push(users_describe());
        let table = build_table(
            &executor,
            "users",
            TableSettings {
                persistent: vec![PersistentDecl::association("by_id", "id")],
                ..TableSettings::default()
            },
            Config::default(),
        );

        table.suspend_persistent();

        executor.push(QueryOutput::affected(1));
        table
            .insert(Row::new().with("name", "A"), &InsertOptions::default())
            .expect("insert");

        assert_eq!(executor.call_count(), 2, "no refresh while suspended");
        assert!(table.lookup("by_id", 1u64).is_none());

        executor.push(QueryOutput::from_rows(vec![
            Row::new().with("id", 1u64).with("name", "A"),
        ]));
        table.resume_persistent(false).expect("resume rebuilds");

        assert!(table.lookup("by_id", 1u64).is_some());
    }
}
