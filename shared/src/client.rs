//! HTTP client for the database REST API.
//!
//! Every `/v1` request carries the configured credentials and the
//! `x-greptime-timezone` header. Requests are sent once: there is no retry
//! and no cancellation, and a failure is returned to the caller as is.
//!
//! Besides SQL the client covers the Prometheus-compatible query API, the
//! table browser (`SHOW TABLES` / `DESC TABLE`) and log pipelines.

use crate::settings::ConnectionSettings;
use crate::sql::{escape_sql_string, TableColumn};
use crate::time::{db_timezone, format_nanos_utc, ClientContext};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the session timezone.
pub const TIMEZONE_HEADER: &str = "x-greptime-timezone";

const SQL_PATH: &str = "/v1/sql";
const STATUS_PATH: &str = "/status";
const PROMETHEUS_PATH: &str = "/v1/prometheus/api/v1";
const PIPELINES_PATH: &str = "/v1/events/pipelines";
const PIPELINE_DDL_PATH: &str = "/v1/pipelines";
const LOGS_PATH: &str = "/v1/events/logs";
const METRIC_NAMES_LIMIT: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors returned by [`DatabaseClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status.
    #[error("Server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The database rejected the request.
    #[error("Database error {code}: {message}")]
    Database {
        /// Database error code.
        code: i64,
        /// Database error message.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Rows could not be written as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Column description in a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Database data type, e.g. `TimestampMillisecond`.
    pub data_type: String,
}

/// Schema of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in order.
    #[serde(default)]
    pub column_schemas: Vec<ColumnSchema>,
}

/// Rows returned by a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Records {
    /// Result schema.
    #[serde(default)]
    pub schema: Schema,
    /// Row values, one array per row in schema order.
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Total number of rows, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
}

impl Records {
    /// Index of the column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema
            .column_schemas
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Writes the rows as CSV with a header line of column names.
    ///
    /// Nulls become empty fields; strings are written unquoted unless they
    /// need quoting.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV writer fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared::client::{ColumnSchema, Records, Schema};
    ///
    /// let records = Records {
    ///     schema: Schema {
    ///         column_schemas: vec![ColumnSchema {
    ///             name: "host".to_string(),
    ///             data_type: "String".to_string(),
    ///         }],
    ///     },
    ///     rows: vec![vec!["a,b".into()]],
    ///     total_rows: None,
    /// };
    /// assert_eq!(records.to_csv().unwrap(), "host\n\"a,b\"\n");
    /// ```
    pub fn to_csv(&self) -> Result<String, ClientError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.schema.column_schemas.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            writer.write_record(row.iter().map(cell_text))?;
        }
        let data = writer
            .into_inner()
            .map_err(|e| ClientError::Csv(e.into_error().into()))?;
        String::from_utf8(data).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

/// Result of a single statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SqlOutput {
    /// Rows for queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Records>,
    /// Affected row count for writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affectedrows: Option<u64>,
}

/// Response body of `POST /v1/sql`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SqlResponse {
    /// Zero on success.
    #[serde(default)]
    pub code: i64,
    /// Error message when `code` is non-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// One output per executed statement.
    #[serde(default)]
    pub output: Vec<SqlOutput>,
    /// Server-side execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl SqlResponse {
    /// Rows of the first output, if it is a query result.
    #[must_use]
    pub fn first_records(&self) -> Option<&Records> {
        self.output.first().and_then(|o| o.records.as_ref())
    }
}

/// A stored log pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name.
    pub name: String,
    /// Version, the creation time as an RFC 3339 string with nanoseconds.
    pub version: String,
    /// YAML definition, when fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Envelope of the Prometheus-compatible API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct PromResponse<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> PromResponse<T> {
    fn into_data(self) -> Result<T, ClientError> {
        match self.data {
            Some(data) if self.status == "success" => Ok(data),
            _ => Err(ClientError::InvalidResponse(format!(
                "{}: {}",
                self.error_type.as_deref().unwrap_or(&self.status),
                self.error.as_deref().unwrap_or("missing 'data'")
            ))),
        }
    }
}

/// Normalizes a metric name or selector into a series selector.
///
/// Text that already contains braces is kept as is; anything else is taken
/// as a metric name. Blank input yields an empty string.
///
/// # Examples
///
/// ```
/// use shared::client::to_series_selector;
///
/// assert_eq!(to_series_selector(" up "), "{__name__=\"up\"}");
/// assert_eq!(to_series_selector("up{job=\"node\"}"), "up{job=\"node\"}");
/// assert_eq!(to_series_selector("  "), "");
/// ```
#[must_use]
pub fn to_series_selector(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains('{') && trimmed.contains('}') {
        return trimmed.to_string();
    }
    format!("{{__name__=\"{trimmed}\"}}")
}

/// Anything that can execute SQL.
///
/// The HTTP service and the CLI depend on this trait rather than on
/// [`DatabaseClient`] so tests can substitute a fake.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Executes `sql` and returns the decoded response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the database rejects it.
    async fn run_sql(&self, sql: &str) -> Result<SqlResponse, ClientError>;

    /// Lists database names.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the database rejects it.
    async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
        let response = self.run_sql("SHOW DATABASES").await?;
        Ok(response
            .first_records()
            .map(|records| {
                records
                    .rows
                    .iter()
                    .flatten()
                    .map(cell_text)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Runs `sql` and renders the first result set as CSV. Statements
    /// without rows yield an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the rows cannot be written.
    async fn run_sql_csv(&self, sql: &str) -> Result<String, ClientError> {
        let response = self.run_sql(sql).await?;
        match response.first_records() {
            Some(records) => records.to_csv(),
            None => Ok(String::new()),
        }
    }

    /// Lists the tables of the current database.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the database rejects it.
    async fn list_tables(&self) -> Result<Vec<String>, ClientError> {
        let response = self.run_sql("SHOW TABLES").await?;
        Ok(response
            .first_records()
            .map(|records| {
                records
                    .rows
                    .iter()
                    .filter_map(|row| row.first())
                    .map(cell_text)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Describes the columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the result has no column
    /// names.
    async fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>, ClientError> {
        let sql = format!("DESC TABLE \"{}\"", table.replace('"', "\"\""));
        let response = self.run_sql(&sql).await?;
        let Some(records) = response.first_records() else {
            return Ok(Vec::new());
        };
        let name = records.column_index("Column").unwrap_or(0);
        let data_type = records.column_index("Type").unwrap_or(1);
        let semantic_type = records.column_index("Semantic Type");
        records
            .rows
            .iter()
            .map(|row| {
                Ok(TableColumn {
                    name: cell_string(row, name)?,
                    data_type: cell_string(row, data_type)?,
                    semantic_type: semantic_type
                        .and_then(|i| row.get(i))
                        .map(cell_text)
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Client for the database REST API.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    http: reqwest::Client,
    settings: ConnectionSettings,
    timezone: String,
}

impl DatabaseClient {
    /// Creates a client for `settings`. A `browser` timezone resolves to UTC;
    /// use [`Self::with_client_context`] to resolve it against another zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: ConnectionSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let mut client = Self {
            http,
            settings,
            timezone: String::new(),
        };
        client.resolve_timezone(&ClientContext::utc(Utc::now()));
        Ok(client)
    }

    /// Resolves the session timezone against `context`.
    #[must_use]
    pub fn with_client_context(mut self, context: ClientContext) -> Self {
        self.resolve_timezone(&context);
        self
    }

    fn resolve_timezone(&mut self, context: &ClientContext) {
        let tz = self.settings.user_timezone.clone().unwrap_or_default();
        self.timezone = db_timezone(&tz, context);
    }

    /// The settings this client was built from.
    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// The value sent in the timezone header.
    #[must_use]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.host.trim_end_matches('/'))
    }

    fn v1(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(self.settings.auth_header_name(), self.settings.authorization())
            .header(TIMEZONE_HEADER, &self.timezone)
    }

    /// Fetches `GET /status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not JSON.
    pub async fn status(&self) -> Result<serde_json::Value, ClientError> {
        let response = self
            .http
            .get(self.url(STATUS_PATH))
            .header(self.settings.auth_header_name(), self.settings.authorization())
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn prometheus_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, ClientError> {
        let mut query = vec![("db", self.settings.database.clone())];
        query.extend(params);
        let request = self
            .http
            .get(self.url(&format!("{PROMETHEUS_PATH}/{endpoint}")))
            .query(&query);
        let response = self.v1(request).send().await?;
        let body: PromResponse<T> = check_status(response).await?.json().await?;
        body.into_data()
    }

    /// Runs a PromQL range query; times are Unix seconds and `step` is in
    /// seconds. Returns the `data` member of the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the query is rejected.
    pub async fn range_query(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step: i64,
    ) -> Result<serde_json::Value, ClientError> {
        tracing::debug!(query = %query, start, end, step, "Running PromQL range query");
        let params = vec![
            ("query", query.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("step", step.to_string()),
        ];
        self.prometheus_get("query_range", params).await
    }

    /// Runs a PromQL instant query at `time` (Unix seconds), or at the
    /// server's current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the query is rejected.
    pub async fn instant_query(
        &self,
        query: &str,
        time: Option<i64>,
    ) -> Result<serde_json::Value, ClientError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(time) = time {
            params.push(("time", time.to_string()));
        }
        self.prometheus_get("query", params).await
    }

    /// Lists metric names. With `search`, only names matching it as a
    /// regular expression fragment; otherwise the first hundred.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn metric_names(&self, search: Option<&str>) -> Result<Vec<String>, ClientError> {
        let params = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(search) => vec![("match[]", format!("{{__name__=~\".*{search}.*\"}}"))],
            None => vec![("limit", METRIC_NAMES_LIMIT.to_string())],
        };
        self.prometheus_get("label/__name__/values", params).await
    }

    /// Lists label names, optionally restricted to series matching a metric
    /// name or selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn label_names(&self, matcher: Option<&str>) -> Result<Vec<String>, ClientError> {
        self.prometheus_get("labels", match_param(matcher)).await
    }

    /// Lists the values of `label`, optionally restricted to series matching
    /// a metric name or selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn label_values(
        &self,
        label: &str,
        matcher: Option<&str>,
    ) -> Result<Vec<String>, ClientError> {
        let endpoint = format!("label/{}/values", urlencoding::encode(label));
        self.prometheus_get(&endpoint, match_param(matcher)).await
    }

    /// Lists the label sets of series matching a metric name or selector,
    /// optionally within `[start, end]` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn series(
        &self,
        matcher: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Vec<BTreeMap<String, String>>, ClientError> {
        let mut params = match_param(Some(matcher));
        if let Some(start) = start {
            params.push(("start", start.to_string()));
        }
        if let Some(end) = end {
            params.push(("end", end.to_string()));
        }
        self.prometheus_get("series", params).await
    }

    /// Formats a PromQL expression on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no
    /// formatted query.
    pub async fn format_promql(&self, query: &str) -> Result<String, ClientError> {
        let request = self
            .http
            .post(self.url(&format!("{PROMETHEUS_PATH}/format_query")))
            .form(&[("query", query)]);
        let response = self.v1(request).send().await?;
        let body: serde_json::Value = check_status(response).await?.json().await?;
        body.get("data")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidResponse("missing 'data' in format response".to_string())
            })
    }

    /// Lists pipelines with their latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ClientError> {
        let response = self
            .run_sql(
                "SELECT name, max(created_at) AS created_at FROM greptime_private.pipelines \
                 GROUP BY name ORDER BY created_at DESC",
            )
            .await?;
        let Some(records) = response.first_records() else {
            return Ok(Vec::new());
        };
        records
            .rows
            .iter()
            .map(|row| {
                Ok(Pipeline {
                    name: cell_string(row, 0)?,
                    version: format_nanos_utc(cell_i64(row, 1)?),
                    content: None,
                })
            })
            .collect()
    }

    /// Fetches the latest version of pipeline `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails, or `InvalidResponse` if no such
    /// pipeline exists.
    pub async fn get_pipeline(&self, name: &str) -> Result<Pipeline, ClientError> {
        let sql = format!(
            "SELECT name, created_at, pipeline FROM greptime_private.pipelines \
             WHERE name = '{}' ORDER BY created_at DESC LIMIT 1",
            escape_sql_string(name)
        );
        let response = self.run_sql(&sql).await?;
        let row = response
            .first_records()
            .and_then(|r| r.rows.first())
            .ok_or_else(|| ClientError::InvalidResponse(format!("pipeline '{name}' not found")))?;
        Ok(Pipeline {
            name: cell_string(row, 0)?,
            version: format_nanos_utc(cell_i64(row, 1)?),
            content: Some(cell_string(row, 2)?),
        })
    }

    /// Uploads a pipeline definition as `<name>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub async fn create_pipeline(
        &self,
        name: &str,
        yaml: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let part = reqwest::multipart::Part::text(yaml.to_string())
            .file_name(format!("{name}.yaml"))
            .mime_str("application/yaml")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .http
            .post(self.url(&format!("{PIPELINES_PATH}/{}", urlencoding::encode(name))))
            .query(&[("db", self.settings.database.as_str())])
            .multipart(form);
        let response = self.v1(request).send().await?;
        tracing::info!(pipeline = %name, "Created pipeline");
        Ok(check_status(response).await?.json().await?)
    }

    /// Deletes one version of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_pipeline(&self, name: &str, version: &str) -> Result<(), ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("{PIPELINES_PATH}/{}", urlencoding::encode(name))))
            .query(&[("db", self.settings.database.as_str()), ("version", version)]);
        let response = self.v1(request).send().await?;
        check_status(response).await?;
        tracing::info!(pipeline = %name, version = %version, "Deleted pipeline");
        Ok(())
    }

    /// Runs a pipeline definition against sample data without storing
    /// anything. `data_type` is the sample's content type, e.g.
    /// `application/x-ndjson` or `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the pipeline is rejected.
    pub async fn dryrun_pipeline(
        &self,
        pipeline: &str,
        data: &str,
        data_type: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let body = serde_json::json!({
            "pipeline": pipeline,
            "data": data,
            "data_type": data_type,
        });
        let request = self
            .http
            .post(self.url(&format!("{PIPELINES_PATH}/dryrun")))
            .query(&[("db", self.settings.database.as_str())])
            .json(&body);
        let response = self.v1(request).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// The `CREATE TABLE` statement pipeline `name` implies for `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no SQL.
    pub async fn pipeline_ddl(&self, name: &str, table: &str) -> Result<String, ClientError> {
        let request = self
            .http
            .get(self.url(&format!("{PIPELINE_DDL_PATH}/{}/ddl", urlencoding::encode(name))))
            .query(&[("table", table), ("db", self.settings.database.as_str())]);
        let response = self.v1(request).send().await?;
        let body: serde_json::Value = check_status(response).await?.json().await?;
        body.pointer("/sql/sql")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::InvalidResponse("missing 'sql' in DDL response".to_string())
            })
    }

    /// Writes raw log lines into `table` through pipeline `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the data.
    pub async fn ingest_logs(
        &self,
        table: &str,
        pipeline: &str,
        data: String,
        content_type: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let request = self
            .http
            .post(self.url(LOGS_PATH))
            .query(&[
                ("db", self.settings.database.as_str()),
                ("table", table),
                ("pipeline_name", pipeline),
            ])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        let response = self.v1(request).send().await?;
        tracing::info!(table = %table, pipeline = %pipeline, "Ingested logs");
        Ok(check_status(response).await?.json().await?)
    }
}

fn match_param(matcher: Option<&str>) -> Vec<(&'static str, String)> {
    matcher
        .map(to_series_selector)
        .filter(|s| !s.is_empty())
        .map(|selector| vec![("match[]", selector)])
        .unwrap_or_default()
}

#[async_trait]
impl SqlBackend for DatabaseClient {
    async fn run_sql(&self, sql: &str) -> Result<SqlResponse, ClientError> {
        tracing::debug!(sql = %sql, database = %self.settings.database, "Running SQL");
        let request = self
            .http
            .post(self.url(SQL_PATH))
            .query(&[("db", self.settings.database.as_str())])
            .form(&[("sql", sql)]);
        let response = self.v1(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Errors come back as a JSON body with a non-zero code, often with a
        // non-2xx status.
        let decoded: SqlResponse = match serde_json::from_str(&body) {
            Ok(decoded) => decoded,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(e) => return Err(ClientError::InvalidResponse(e.to_string())),
        };

        if decoded.code != 0 {
            let message = decoded.error.clone().unwrap_or_else(|| "Error".to_string());
            tracing::error!(code = decoded.code, error = %message, "SQL execution failed");
            return Err(ClientError::Database {
                code: decoded.code,
                message,
            });
        }
        Ok(decoded)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Text of a result cell: strings without quotes, null as empty.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_string(row: &[serde_json::Value], index: usize) -> Result<String, ClientError> {
    row.get(index)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidResponse(format!("expected text in column {index}")))
}

/// Timestamps may arrive as numbers or, when too large for a double, as
/// strings.
fn cell_i64(row: &[serde_json::Value], index: usize) -> Result<i64, ClientError> {
    let value = row.get(index);
    value
        .and_then(serde_json::Value::as_i64)
        .or_else(|| {
            value
                .and_then(serde_json::Value::as_str)
                .and_then(|s| s.parse().ok())
        })
        .ok_or_else(|| {
            ClientError::InvalidResponse(format!("expected integer in column {index}"))
        })
}
