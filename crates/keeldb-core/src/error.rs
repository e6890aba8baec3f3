use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable internal classification.
/// Module-level error enums convert into this type at the public surface.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct an executor-origin backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Backend, ErrorOrigin::Executor, message)
    }

    /// Construct a registry-origin lookup failure for an unknown table.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        let table = table.into();

        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Registry,
            format!("no table named `{table}`"),
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.class, ErrorClass::Validation)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Config,
    Validation,
    Backend,
    Cache,
    NotFound,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Backend => "backend",
            Self::Cache => "cache",
            Self::NotFound => "not_found",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Schema,
    Filter,
    Table,
    Cache,
    Executor,
    Registry,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Filter => "filter",
            Self::Table => "table",
            Self::Cache => "cache",
            Self::Executor => "executor",
            Self::Registry => "registry",
        };
        write!(f, "{label}")
    }
}
