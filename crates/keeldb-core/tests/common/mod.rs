//! Shared fixtures for the lifecycle tests: a MySQL-flavored escaper and a
//! scripted executor that replays queued responses while recording every
//! prepared statement.

use keeldb_core::{
    error::Error,
    executor::{Executor, QueryOutput},
    params::Params,
    row::Row,
    value::Value,
};
use std::{collections::VecDeque, sync::Mutex};

///
/// MockExecutor
///

#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<Result<QueryOutput, Error>>>,
    statements: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, output: QueryOutput) {
        self.responses.lock().unwrap().push_back(Ok(output));
    }

    pub fn push_err(&self, err: Error) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    /// Every executed statement, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.statements.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }
}

impl Executor for MockExecutor {
    fn query(&self, sql: &str, _params: Params) -> Result<QueryOutput, Error> {
        self.statements.lock().unwrap().push(sql.to_string());

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryOutput::default()))
    }

    fn escape(&self, value: &Value) -> String {
        escape(value)
    }
}

/// Escape a value the way a MySQL driver would.
pub fn escape(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => quote(s),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::List(items) => items.iter().map(escape).collect::<Vec<_>>().join(","),
        Value::Json(json) => quote(&json.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A `SHOW TABLES` response naming each table once.
pub fn show_tables(names: &[&str]) -> QueryOutput {
    QueryOutput::from_rows(
        names
            .iter()
            .map(|name| Row::new().with("Tables_in_app", *name))
            .collect(),
    )
}

/// The `SHOW COLUMNS` response for `users(id PK, name, email NULL)`.
pub fn users_describe() -> QueryOutput {
    let record = |field: &str, null: &str, key: &str| {
        Row::new()
            .with("Field", field)
            .with("Type", "text")
            .with("Null", null)
            .with("Key", key)
    };

    QueryOutput::from_rows(vec![
        record("id", "NO", "PRI"),
        record("name", "NO", ""),
        record("email", "YES", ""),
    ])
}
