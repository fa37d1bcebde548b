use std::time::Duration;

use async_trait::async_trait;

use crate::config::ConnectionSettings;
use crate::error::{BackfillError, QueryError};

/// Backend-reported statistics for an executed statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStats {
    /// Rows written, when the backend reported them. `None` means unknown,
    /// which is distinct from zero.
    pub rows_written: Option<u64>,
}

/// The surface the backfill core needs from a ClickHouse connection. The
/// trait seam keeps range resolution, chunk execution, and orchestration
/// testable against an in-memory fake.
#[async_trait]
pub trait ClickHouse: Send + Sync {
    /// Execute a statement (INSERT/DDL) without returning rows.
    async fn execute(&self, sql: &str) -> Result<QueryStats, QueryError>;

    /// Run a query expected to produce a single value. `None` when the
    /// result set is empty or the value is NULL.
    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, QueryError>;
}

/// Verify a connection is usable before any table work starts.
pub async fn ping(db: &dyn ClickHouse, role: &'static str) -> Result<(), BackfillError> {
    db.query_scalar("SELECT 1")
        .await
        .map_err(|err| BackfillError::Connection {
            role,
            detail: err.to_string(),
        })?;
    Ok(())
}

/// ClickHouse client speaking the HTTP interface: the query is POSTed as the
/// request body, auth goes in `X-ClickHouse-*` headers, and write statistics
/// come back in the `X-ClickHouse-Summary` response header.
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    statement_timeout: Option<Duration>,
}

impl HttpClient {
    pub fn new(
        settings: &ConnectionSettings,
        statement_timeout: Option<Duration>,
    ) -> Result<Self, BackfillError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = statement_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| BackfillError::Configuration(err.to_string()))?;

        Ok(HttpClient {
            http,
            endpoint: settings.endpoint(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            statement_timeout,
        })
    }

    fn url(&self) -> String {
        let mut url = format!(
            "{}/?database=default&send_progress_in_http_headers=1&wait_end_of_query=1",
            self.endpoint
        );
        if let Some(timeout) = self.statement_timeout {
            url.push_str(&format!("&max_execution_time={}", timeout.as_secs()));
        }
        url
    }

    async fn post(&self, sql: &str) -> Result<reqwest::Response, QueryError> {
        let response = self
            .http
            .post(self.url())
            .header("X-ClickHouse-User", &self.username)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_server_error(
                status,
                &body,
                self.statement_timeout,
            ));
        }
        Ok(response)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> QueryError {
        if err.is_timeout() {
            QueryError::Timeout {
                limit: self
                    .statement_timeout
                    .unwrap_or_else(|| Duration::from_secs(0)),
            }
        } else {
            QueryError::failed(err.to_string())
        }
    }
}

#[async_trait]
impl ClickHouse for HttpClient {
    async fn execute(&self, sql: &str) -> Result<QueryStats, QueryError> {
        let response = self.post(sql).await?;
        let rows_written = response
            .headers()
            .get("X-ClickHouse-Summary")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_written_rows);
        // Drain the body so the connection can be reused.
        response
            .text()
            .await
            .map_err(|err| self.map_transport_error(err))?;
        Ok(QueryStats { rows_written })
    }

    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, QueryError> {
        let sql = format!("{sql} FORMAT TabSeparatedRaw");
        let response = self.post(&sql).await?;
        let body = response
            .text()
            .await
            .map_err(|err| self.map_transport_error(err))?;
        Ok(parse_scalar(&body))
    }
}

/// A `max_execution_time` kill arrives as an HTTP error body carrying
/// ClickHouse error code 159 (TIMEOUT_EXCEEDED); it has to be told apart
/// from other server errors the same way a client-side timeout is.
fn classify_server_error(
    status: reqwest::StatusCode,
    body: &str,
    statement_timeout: Option<Duration>,
) -> QueryError {
    if body.contains("Code: 159") || body.contains("TIMEOUT_EXCEEDED") {
        return QueryError::Timeout {
            limit: statement_timeout.unwrap_or_default(),
        };
    }
    QueryError::failed(format!("clickhouse returned {status}: {}", body.trim()))
}

/// Extract `written_rows` from the `X-ClickHouse-Summary` header, a JSON
/// object whose numeric fields are encoded as strings.
fn parse_written_rows(summary: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(summary).ok()?;
    value.get("written_rows")?.as_str()?.parse().ok()
}

/// First value of a TabSeparated result body. ClickHouse renders NULL as \N.
fn parse_scalar(body: &str) -> Option<String> {
    let line = body.lines().next()?;
    let value = line.split('\t').next().unwrap_or(line);
    if value.is_empty() || value == "\\N" {
        return None;
    }
    Some(value.to_string())
}
