use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Faults that abort an operation (a table, or the whole invocation).
/// Per-chunk query faults are [`QueryError`] and never bubble up this way.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("{0}")]
    Configuration(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("could not connect to {role} ClickHouse: {detail}")]
    Connection {
        role: &'static str,
        detail: String,
    },

    #[error("could not resolve block range for {table}: {detail}")]
    RangeResolution { table: String, detail: String },

    #[error("schema creation failed for {table}: {detail}")]
    Ddl { table: String, detail: String },
}

/// Fault from a single query against ClickHouse. Recorded per chunk so one
/// bad chunk never takes its siblings down with it.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryError {
    #[error("query exceeded the {}s execution limit", limit.as_secs())]
    Timeout { limit: Duration },

    #[error("{message}")]
    Failed { message: String },
}

impl QueryError {
    pub fn failed(message: impl Into<String>) -> Self {
        QueryError::Failed {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_serialize_with_kind_tags() {
        let timeout = serde_json::to_value(QueryError::Timeout {
            limit: Duration::from_secs(600),
        })
        .unwrap();
        assert_eq!(timeout["kind"], "timeout");

        let failed = serde_json::to_value(QueryError::failed("boom")).unwrap();
        assert_eq!(failed["kind"], "failed");
        assert_eq!(failed["message"], "boom");
        assert!(!QueryError::failed("boom").is_timeout());
    }
}
