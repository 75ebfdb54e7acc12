//! Command implementations.
//!
//! Commands write to a caller-supplied writer so they can be tested without
//! capturing stdout.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use shared::client::{ColumnSchema, Records, SqlBackend, SqlResponse};
use shared::settings::{SettingsRepository, DATABASES_CACHE_KEY, DATABASES_CACHE_TTL};
use shared::sql::{
    build_template, find_statement_at_position, format_sql, parse_sql_statements, parse_table,
    BuilderFormState, TsColumn,
};
use shared::time::{
    calculate_step, db_timezone, format_timestamp, format_timezone_label, normalize_timezone,
    replace_time_placeholders, ClientContext, TimeRange, DEFAULT_RELATIVE_MINUTES,
};
use shared::url_state::{EditorType, QueryUrlState};
use shared::validator::Validate;
use std::io::{Read, Write};

/// How `run` prints result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table with timestamps in the session zone.
    #[default]
    Table,
    /// CSV with a header line, raw cell values.
    Csv,
}

/// Reads a file, or stdin when `path` is `-`.
pub fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

/// Resolves the time selection flags. Absolute bounds win over minutes.
pub fn resolve_time_range(
    minutes: Option<u32>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<TimeRange> {
    match (start, end) {
        (Some(start), Some(end)) => {
            TimeRange::absolute_from_unix(start, end).context("Invalid --start/--end")
        }
        (None, None) => Ok(minutes.map_or(TimeRange::All, TimeRange::relative)),
        _ => bail!("--start and --end must be given together"),
    }
}

/// Parses and validates a builder form given as JSON.
pub fn parse_form(form_json: &str) -> Result<BuilderFormState> {
    let form: BuilderFormState =
        serde_json::from_str(form_json).context("Invalid builder form JSON")?;
    form.validate().context("Invalid builder form")?;
    Ok(form)
}

/// Fills in the form's timestamp column from the table's description when
/// the form has none.
pub async fn detect_ts_column(backend: &dyn SqlBackend, form: &mut BuilderFormState) -> Result<()> {
    if form.ts_column.is_some() || form.table.is_empty() {
        return Ok(());
    }
    let columns = backend
        .describe_table(&form.table)
        .await
        .with_context(|| format!("Failed to describe table {}", form.table))?;
    form.ts_column = TsColumn::detect(&columns);
    match &form.ts_column {
        Some(column) => {
            tracing::info!(table = %form.table, column = %column.name, "Detected timestamp column");
        }
        None => tracing::warn!(table = %form.table, "Table has no timestamp column"),
    }
    Ok(())
}

/// Prints the SQL for a builder form. A form without a table prints
/// nothing.
pub fn build(
    form: &BuilderFormState,
    range: TimeRange,
    placeholders: bool,
    out: &mut impl Write,
) -> Result<()> {
    let window = range.values();
    let Some(template) = build_template(form, &window) else {
        tracing::warn!("The builder form has no table; no SQL generated");
        return Ok(());
    };
    let sql = if placeholders {
        template.to_placeholder_sql()
    } else {
        template.render(&window)
    };
    writeln!(out, "{sql}")?;
    Ok(())
}

/// Lists the statements of a document, or only the one under `cursor`.
pub fn split(sql: &str, cursor: Option<usize>, out: &mut impl Write) -> Result<()> {
    let statements = parse_sql_statements(sql);
    match cursor {
        Some(position) => match find_statement_at_position(&statements, position) {
            Some((index, statement)) => {
                writeln!(out, "{index}\t{}", statement.text)?;
                if let Some(table) = parse_table(&statement.text) {
                    writeln!(out, "table\t{table}")?;
                }
            }
            None => bail!("No statement at offset {position}"),
        },
        None => {
            for statement in &statements {
                writeln!(out, "{}..{}\t{}", statement.start, statement.end, statement.text)?;
            }
        }
    }
    Ok(())
}

/// Pretty-prints a SQL document.
pub fn format(sql: &str, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", format_sql(sql))?;
    Ok(())
}

/// Prints the canonical timezone, its label and the database session value.
pub fn timezone(value: &str, context: &ClientContext, out: &mut impl Write) -> Result<()> {
    writeln!(out, "timezone: {}", normalize_timezone(value))?;
    writeln!(out, "label:    {}", format_timezone_label(value, context))?;
    writeln!(out, "database: {}", db_timezone(value, context))?;
    Ok(())
}

/// Splits `sql`, substitutes the time window and executes each statement in
/// order. Stops at the first failure.
pub async fn run(
    backend: &dyn SqlBackend,
    sql: &str,
    range: TimeRange,
    format: OutputFormat,
    context: &ClientContext,
    out: &mut impl Write,
) -> Result<usize> {
    let window = range.values();
    let statements = parse_sql_statements(sql);
    if statements.is_empty() {
        bail!("No SQL statements to run");
    }

    for (index, statement) in statements.iter().enumerate() {
        let text = replace_time_placeholders(&statement.text, &window);
        tracing::info!(statement = index + 1, total = statements.len(), "Running statement");
        let failed = || format!("Statement {} failed: {}", index + 1, statement.text);
        match format {
            OutputFormat::Table => {
                let response = backend.run_sql(&text).await.with_context(failed)?;
                print_response(&response, context, out)?;
            }
            OutputFormat::Csv => {
                let csv = backend.run_sql_csv(&text).await.with_context(failed)?;
                write!(out, "{csv}")?;
            }
        }
    }
    Ok(statements.len())
}

/// Prints the database names, reusing a cached list younger than ten
/// minutes unless `refresh` is set.
pub async fn databases(
    backend: &dyn SqlBackend,
    repo: &SettingsRepository,
    host: &str,
    refresh: bool,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<()> {
    let key = format!("{DATABASES_CACHE_KEY}:{host}");
    let cached = if refresh {
        None
    } else {
        repo.cache_get::<String>(&key, DATABASES_CACHE_TTL, now)?
    };
    let names = match cached {
        Some(names) => {
            tracing::debug!(host = %host, "Using cached database list");
            names
        }
        None => {
            let names = backend.list_databases().await?;
            repo.cache_put(&key, &names, now)?;
            names
        }
    };
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Prints the tables of the current database.
pub async fn tables(backend: &dyn SqlBackend, out: &mut impl Write) -> Result<()> {
    for table in backend.list_tables().await? {
        writeln!(out, "{table}")?;
    }
    Ok(())
}

/// Prints the columns of `table` and the detected timestamp column.
pub async fn describe(backend: &dyn SqlBackend, table: &str, out: &mut impl Write) -> Result<()> {
    let columns = backend.describe_table(table).await?;
    for column in &columns {
        writeln!(out, "{}\t{}\t{}", column.name, column.data_type, column.semantic_type)?;
    }
    match TsColumn::detect(&columns) {
        Some(ts) => writeln!(out, "time column: {}", ts.name)?,
        None => writeln!(out, "time column: none")?,
    }
    Ok(())
}

/// Start, end and step in seconds for a PromQL range query.
///
/// An unlimited range falls back to the default relative window. Without an
/// explicit `step`, the step yields at most `points` samples.
pub fn range_query_params(
    range: TimeRange,
    now: DateTime<Utc>,
    points: u32,
    step: Option<i64>,
) -> Result<(i64, i64, i64)> {
    let (start, end) = range
        .unix_range(now)
        .or_else(|| TimeRange::relative(DEFAULT_RELATIVE_MINUTES).unix_range(now))
        .context("No time range for the query")?;
    if start > end {
        bail!("Range start {start} is after its end {end}");
    }
    let step = match step {
        Some(step) if step > 0 => step,
        Some(step) => bail!("Step must be positive, got {step}"),
        None => calculate_step(start, end, points, None),
    };
    Ok((start, end, step))
}

/// Encodes a query as a shareable query string: `sql` in text mode, or a
/// builder form when `form` is given.
pub fn share_encode(
    sql: Option<&str>,
    form: Option<BuilderFormState>,
    range: TimeRange,
) -> Result<String> {
    let mut state = QueryUrlState::default();
    match range {
        TimeRange::All => state.time_length = 0,
        TimeRange::Relative { minutes } => state.time_length = minutes,
        TimeRange::Absolute { start, end } => {
            state.time_range = Some((start.timestamp(), end.timestamp()));
        }
    }
    match (sql, form) {
        (Some(sql), None) => {
            state.editor_type = EditorType::Text;
            state.editor_sql = sql.trim().to_string();
        }
        (None, Some(form)) => {
            state.editor_type = EditorType::Builder;
            state.table = Some(form.table.clone()).filter(|t| !t.is_empty());
            state.builder_form = Some(form);
        }
        _ => bail!("Give either SQL or a builder form"),
    }
    Ok(state.to_query_string())
}

/// Prints the SQL a shared query string stands for, with its time window
/// substituted. A full URL is accepted; only its query part is read.
pub fn share_decode(link: &str, out: &mut impl Write) -> Result<()> {
    let query = link.split_once('?').map_or(link, |(_, query)| query);
    let state = QueryUrlState::from_query_string(query);
    let window = state.time_range().values();
    tracing::debug!(editor = state.editor_type.as_str(), "Decoded shared query");
    let sql = match state.editor_type {
        EditorType::Text => replace_time_placeholders(&state.editor_sql, &window),
        EditorType::Builder => state
            .builder_form
            .as_ref()
            .and_then(|form| build_template(form, &window))
            .map(|template| template.render(&window))
            .unwrap_or_default(),
    };
    if sql.is_empty() {
        bail!("The link holds no query");
    }
    writeln!(out, "{sql}")?;
    Ok(())
}

fn print_response(
    response: &SqlResponse,
    context: &ClientContext,
    out: &mut impl Write,
) -> Result<()> {
    for output in &response.output {
        if let Some(records) = &output.records {
            write!(out, "{}", render_table(records, context))?;
            writeln!(out, "({} rows)", records.rows.len())?;
        } else if let Some(affected) = output.affectedrows {
            writeln!(out, "Affected rows: {affected}")?;
        }
    }
    if let Some(ms) = response.execution_time_ms {
        writeln!(out, "Time: {ms} ms")?;
    }
    Ok(())
}

/// Renders rows as an aligned text table. Timestamp columns are shown in the
/// context's zone.
pub fn render_table(records: &Records, context: &ClientContext) -> String {
    let columns = &records.schema.column_schemas;
    let cells: Vec<Vec<String>> = records
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, value)| render_cell(value, columns.get(i), context))
                .collect()
        })
        .collect();

    let column_count = cells.iter().map(Vec::len).max().unwrap_or(0).max(columns.len());
    let headers: Vec<String> = (0..column_count)
        .map(|i| columns.get(i).map_or_else(String::new, |c| c.name.clone()))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut table = String::new();
    let mut push_line = |values: &[String]| {
        let line = (0..column_count)
            .map(|i| {
                let value = values.get(i).map_or("", String::as_str);
                format!("{value:<width$}", width = widths[i])
            })
            .collect::<Vec<_>>()
            .join(" | ");
        table.push_str(line.trim_end());
        table.push('\n');
    };

    push_line(&headers);
    push_line(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>());
    for row in &cells {
        push_line(row);
    }
    table
}

fn render_cell(
    value: &serde_json::Value,
    column: Option<&ColumnSchema>,
    context: &ClientContext,
) -> String {
    let is_timestamp = column.is_some_and(|c| {
        let data_type = c.data_type.to_ascii_lowercase();
        data_type.starts_with("timestamp") || data_type == "date" || data_type == "datetime"
    });
    if is_timestamp {
        if let (Some(raw), Some(column)) = (value.as_i64(), column) {
            let formatted = format_timestamp(raw, &column.data_type, context.zone(), context);
            if let Some(formatted) = formatted {
                return formatted;
            }
        }
    }
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use shared::client::{ClientError, Schema, SqlOutput};
    use shared::time::Timezone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedBackend {
        executed: Mutex<Vec<String>>,
    }

    fn records(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> SqlResponse {
        let column_schemas = columns
            .iter()
            .map(|name| ColumnSchema {
                name: (*name).to_string(),
                data_type: "String".to_string(),
            })
            .collect();
        SqlResponse {
            output: vec![SqlOutput {
                records: Some(Records {
                    schema: Schema { column_schemas },
                    rows,
                    total_rows: None,
                }),
                affectedrows: None,
            }],
            ..SqlResponse::default()
        }
    }

    #[async_trait]
    impl SqlBackend for ScriptedBackend {
        async fn run_sql(&self, sql: &str) -> Result<SqlResponse, ClientError> {
            self.executed.lock().unwrap().push(sql.to_string());
            if sql.starts_with("DROP") {
                return Err(ClientError::Database {
                    code: 7,
                    message: "denied".to_string(),
                });
            }
            let response = match sql {
                "SHOW DATABASES" => records(
                    &["Database"],
                    vec![vec!["public".into()], vec!["metrics".into()]],
                ),
                "SHOW TABLES" => records(&["Tables"], vec![vec!["cpu".into()]]),
                "DESC TABLE \"cpu\"" => records(
                    &["Column", "Type", "Semantic Type"],
                    vec![
                        vec!["host".into(), "String".into(), "TAG".into()],
                        vec!["created".into(), "TimestampSecond".into(), "FIELD".into()],
                        vec!["ts".into(), "TimestampMillisecond".into(), "TIMESTAMP".into()],
                    ],
                ),
                "SELECT host, usage FROM cpu" => records(
                    &["host", "usage"],
                    vec![vec!["web,1".into(), 0.5.into()]],
                ),
                _ => SqlResponse {
                    output: vec![SqlOutput {
                        affectedrows: Some(1),
                        records: None,
                    }],
                    ..SqlResponse::default()
                },
            };
            Ok(response)
        }
    }

    fn utc_context() -> ClientContext {
        ClientContext::new(Timezone::Utc, DateTime::from_timestamp(1_704_067_200, 0).unwrap())
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    fn form(json: &str) -> BuilderFormState {
        parse_form(json).unwrap()
    }

    #[test]
    fn test_resolve_time_range() {
        assert_eq!(resolve_time_range(None, None, None).unwrap(), TimeRange::All);
        assert_eq!(resolve_time_range(Some(5), None, None).unwrap(), TimeRange::relative(5));
        assert!(matches!(
            resolve_time_range(Some(5), Some("0"), Some("60")).unwrap(),
            TimeRange::Absolute { .. }
        ));
        assert!(resolve_time_range(None, Some("0"), None).is_err());
        assert!(resolve_time_range(None, Some("x"), Some("1")).is_err());
    }

    #[test]
    fn test_build_prints_rendered_sql() {
        let mut out = Vec::new();
        let form = form(r#"{"table":"cpu","tsColumn":{"name":"ts"}}"#);
        build(&form, TimeRange::relative(5), false, &mut out).unwrap();
        assert_eq!(
            output(out),
            "SELECT * FROM \"cpu\" WHERE ts <= now() AND ts >= now() - Interval '5m' LIMIT 1000\n"
        );
    }

    #[test]
    fn test_build_with_placeholders() {
        let mut out = Vec::new();
        let form = form(r#"{"table":"cpu","tsColumn":{"name":"ts"}}"#);
        build(&form, TimeRange::relative(5), true, &mut out).unwrap();
        assert!(output(out).contains("ts <= $timeend AND ts >= $timestart"));
        assert!(parse_form("not json").is_err());
    }

    #[test]
    fn test_build_without_table_prints_nothing() {
        let mut out = Vec::new();
        build(&form(r#"{"table":""}"#), TimeRange::All, false, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_detect_ts_column() {
        let backend = ScriptedBackend::default();
        let mut detected = form(r#"{"table":"cpu"}"#);
        tokio_test::block_on(detect_ts_column(&backend, &mut detected)).unwrap();
        assert_eq!(detected.ts_column.as_ref().map(|c| c.name.as_str()), Some("ts"));

        let mut explicit = form(r#"{"table":"cpu","tsColumn":{"name":"created"}}"#);
        tokio_test::block_on(detect_ts_column(&backend, &mut explicit)).unwrap();
        assert_eq!(explicit.ts_column.as_ref().map(|c| c.name.as_str()), Some("created"));
        assert_eq!(backend.executed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_split_lists_statements() {
        let mut out = Vec::new();
        split("SELECT 1; SELECT 2;", None, &mut out).unwrap();
        assert_eq!(output(out), "0..8\tSELECT 1;\n9..18\tSELECT 2;\n");

        let mut out = Vec::new();
        split("SELECT 1; SELECT 2;", Some(9), &mut out).unwrap();
        assert_eq!(output(out), "0\tSELECT 1;\n");
    }

    #[test]
    fn test_split_reports_table_at_cursor() {
        let mut out = Vec::new();
        split("SELECT 1; SELECT * FROM cpu;", Some(12), &mut out).unwrap();
        assert_eq!(output(out), "1\tSELECT * FROM cpu;\ntable\tcpu\n");
    }

    #[test]
    fn test_timezone_output() {
        let mut out = Vec::new();
        timezone("+8:00", &utc_context(), &mut out).unwrap();
        assert_eq!(output(out), "timezone: +08:00\nlabel:    +08\ndatabase: +08:00\n");
    }

    #[test]
    fn test_render_table_formats_timestamps() {
        let records = Records {
            schema: Schema {
                column_schemas: vec![
                    ColumnSchema {
                        name: "host".to_string(),
                        data_type: "String".to_string(),
                    },
                    ColumnSchema {
                        name: "ts".to_string(),
                        data_type: "TimestampMillisecond".to_string(),
                    },
                ],
            },
            rows: vec![vec!["web-1".into(), 1_704_067_200_000_i64.into()]],
            total_rows: None,
        };
        assert_eq!(
            render_table(&records, &utc_context()),
            "host  | ts\n----- | -----------------------\nweb-1 | 2024-01-01 00:00:00.000\n"
        );
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let backend = ScriptedBackend::default();
        let mut out = Vec::new();
        let result = tokio_test::block_on(run(
            &backend,
            "INSERT INTO t VALUES (1); DROP TABLE t; SELECT 1;",
            TimeRange::All,
            OutputFormat::Table,
            &utc_context(),
            &mut out,
        ));
        assert!(result.is_err());
        assert_eq!(backend.executed.lock().unwrap().len(), 2);
        assert_eq!(output(out), "Affected rows: 1\n");
    }

    #[test]
    fn test_run_substitutes_placeholders() {
        let backend = ScriptedBackend::default();
        let count = tokio_test::block_on(run(
            &backend,
            "DELETE FROM t WHERE ts < $timestart",
            TimeRange::relative(60),
            OutputFormat::Table,
            &utc_context(),
            &mut Vec::new(),
        ))
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            backend.executed.lock().unwrap()[0],
            "DELETE FROM t WHERE ts < now() - Interval '60m'"
        );
    }

    #[test]
    fn test_run_as_csv() {
        let backend = ScriptedBackend::default();
        let mut out = Vec::new();
        tokio_test::block_on(run(
            &backend,
            "SELECT host, usage FROM cpu",
            TimeRange::All,
            OutputFormat::Csv,
            &utc_context(),
            &mut out,
        ))
        .unwrap();
        assert_eq!(output(out), "host,usage\n\"web,1\",0.5\n");
    }

    #[test]
    fn test_databases_reuses_cache_until_expiry() {
        let backend = ScriptedBackend::default();
        let repo = SettingsRepository::in_memory();
        let host = "http://db:4000";
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let list = |refresh: bool, at: DateTime<Utc>| {
            let mut out = Vec::new();
            tokio_test::block_on(databases(&backend, &repo, host, refresh, at, &mut out)).unwrap();
            output(out)
        };

        assert_eq!(list(false, now), "public\nmetrics\n");
        assert_eq!(list(false, now + Duration::minutes(9)), "public\nmetrics\n");
        assert_eq!(backend.executed.lock().unwrap().len(), 1);

        list(false, now + Duration::minutes(11));
        assert_eq!(backend.executed.lock().unwrap().len(), 2);

        list(true, now + Duration::minutes(11));
        assert_eq!(backend.executed.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_tables_and_describe() {
        let backend = ScriptedBackend::default();
        let mut out = Vec::new();
        tokio_test::block_on(tables(&backend, &mut out)).unwrap();
        assert_eq!(output(out), "cpu\n");

        let mut out = Vec::new();
        tokio_test::block_on(describe(&backend, "cpu", &mut out)).unwrap();
        assert_eq!(
            output(out),
            "host\tString\tTAG\ncreated\tTimestampSecond\tFIELD\n\
             ts\tTimestampMillisecond\tTIMESTAMP\ntime column: ts\n"
        );
    }

    #[test]
    fn test_range_query_params() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = now.timestamp();

        let (start, stop, step) =
            range_query_params(TimeRange::relative(60), now, 240, None).unwrap();
        assert_eq!((start, stop, step), (end - 3600, end, 15));

        let (start, _, step) = range_query_params(TimeRange::All, now, 10, None).unwrap();
        assert_eq!((start, step), (end - 600, 60));

        let (_, _, step) = range_query_params(TimeRange::relative(5), now, 10, Some(1)).unwrap();
        assert_eq!(step, 1);
        assert!(range_query_params(TimeRange::relative(5), now, 10, Some(0)).is_err());
    }

    #[test]
    fn test_share_text_query() {
        let query = share_encode(Some("SELECT 1 "), None, TimeRange::relative(30)).unwrap();
        let state = QueryUrlState::from_query_string(&query);
        assert_eq!(state.editor_type, EditorType::Text);
        assert_eq!(state.editor_sql, "SELECT 1");
        assert_eq!(state.time_length, 30);

        let mut out = Vec::new();
        share_decode("https://example.com/query?editorType=text&editorSql=SELECT+1", &mut out)
            .unwrap();
        assert_eq!(output(out), "SELECT 1\n");
    }

    #[test]
    fn test_share_builder_form() {
        let builder = form(r#"{"table":"cpu","tsColumn":{"name":"ts"}}"#);
        let query = share_encode(None, Some(builder), TimeRange::relative(5)).unwrap();
        let mut out = Vec::new();
        share_decode(&query, &mut out).unwrap();
        assert_eq!(
            output(out),
            "SELECT * FROM \"cpu\" WHERE ts <= now() AND ts >= now() - Interval '5m' LIMIT 1000\n"
        );

        assert!(share_encode(None, None, TimeRange::All).is_err());
        assert!(share_decode("editorType=text", &mut Vec::new()).is_err());
    }
}
