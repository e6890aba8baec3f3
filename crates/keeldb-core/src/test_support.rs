//! Shared fakes for in-crate unit tests: a MySQL-flavored escaper and a
//! scripted executor that replays queued responses.

use crate::{
    error::Error,
    executor::{Executor, QueryOutput},
    params::Params,
    row::Row,
    value::Value,
};
use std::{
    collections::VecDeque,
    sync::Mutex,
};

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

///
/// ScriptedExecutor
///
/// Replays queued responses in order and records every prepared statement.
/// An exhausted script answers with an empty result set.
///

#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<QueryOutput, Error>>>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl ScriptedExecutor {
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
    pub fn sql_log(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(sql, _)| sql.clone())
    }

    pub fn last_params(&self) -> Option<Params> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, params)| params.clone())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for ScriptedExecutor {
    fn query(&self, sql: &str, params: Params) -> Result<QueryOutput, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));

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

/// One `SHOW COLUMNS` record.
pub fn describe_row(field: &str, nullable: bool, primary: bool) -> Row {
    Row::new()
        .with("Field", field)
        .with("Type", "text")
        .with("Null", if nullable { "YES" } else { "NO" })
        .with("Key", if primary { "PRI" } else { "" })
}

/// A full `SHOW COLUMNS` response for `(name, nullable, primary)` triples.
pub fn describe_output(columns: &[(&str, bool, bool)]) -> QueryOutput {
    QueryOutput::from_rows(
        columns
            .iter()
            .map(|(field, nullable, primary)| describe_row(field, *nullable, *primary))
            .collect(),
    )
}

/// The `users(id PK, name, email)` fixture most table tests introspect.
pub fn users_describe() -> QueryOutput {
    describe_output(&[("id", false, true), ("name", false, false), ("email", true, false)])
}
