use crate::{error::Error, params::Params, row::Row, value::Value};

///
/// QueryOutput
///
/// Result surface of one executor call. Read statements fill `rows`;
/// mutations fill `affected_rows` and, for inserts against an
/// auto-increment identity, `last_insert_id`.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
}

impl QueryOutput {
    #[must_use]
    pub const fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            affected_rows: 0,
            last_insert_id: None,
        }
    }

    #[must_use]
    pub const fn affected(affected_rows: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows,
            last_insert_id: None,
        }
    }

    #[must_use]
    pub const fn with_last_insert_id(mut self, id: u64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    #[must_use]
    pub fn first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

///
/// Executor
///
/// Boundary to the SQL engine. Implementations own transport, pooling, and
/// reconnection; this crate only renders SQL text and interprets the output.
///
/// `escape` must render scalars as SQL literals (text single-quoted with
/// engine-appropriate escaping) and `Value::List` as a comma-joined list of
/// escaped elements.
///

pub trait Executor: Send + Sync {
    fn query(&self, sql: &str, params: Params) -> Result<QueryOutput, Error>;

    fn escape(&self, value: &Value) -> String;
}
