//! Tidelens CLI
//!
//! Command-line query workbench for time-series databases.
//!
//! # Usage
//!
//! ```bash
//! tidelens --help
//! tidelens build --form form.json --minutes 30
//! tidelens split queries.sql --cursor 42
//! tidelens run queries.sql --minutes 60 --format csv
//! tidelens describe cpu
//! tidelens promql query 'rate(http_requests_total[5m])' --minutes 30
//! tidelens share decode 'https://example.com/query?editorType=text&editorSql=SELECT+1'
//! tidelens tz asia/shanghai
//! ```

#![deny(unsafe_code)]

mod commands;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use commands::OutputFormat;
use shared::client::{to_series_selector, DatabaseClient};
use shared::settings::{ConnectionSettings, FileStateStore, SettingsRepository};
use shared::time::ClientContext;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Tidelens CLI - query workbench for time-series databases
#[derive(Parser)]
#[command(name = "tidelens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database HTTP endpoint
    #[arg(short, long, env = "TIDELENS_DB_URL")]
    url: Option<String>,

    /// Database name
    #[arg(short, long, env = "TIDELENS_DB_NAME")]
    database: Option<String>,

    /// User name for basic authentication
    #[arg(long, env = "TIDELENS_DB_USER")]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "TIDELENS_DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Session timezone (UTC, ±HH:MM or an IANA name)
    #[arg(short, long, env = "TIDELENS_TIMEZONE")]
    timezone: Option<String>,

    /// File holding saved settings and column visibility
    #[arg(long, env = "TIDELENS_STATE_FILE", default_value = ".tidelens/state.json")]
    state_file: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Time selection shared by commands that substitute `$timestart` / `$timeend`.
#[derive(Args, Debug, Clone)]
struct TimeArgs {
    /// Relative window: the last N minutes
    #[arg(long, conflicts_with_all = ["start", "end"])]
    minutes: Option<u32>,

    /// Absolute window start, unix seconds
    #[arg(long, requires = "end")]
    start: Option<String>,

    /// Absolute window end, unix seconds
    #[arg(long, requires = "start")]
    end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL for a query builder form (JSON)
    Build {
        /// Form file, or - for stdin
        #[arg(long)]
        form: String,
        #[command(flatten)]
        time: TimeArgs,
        /// Keep $timestart / $timeend instead of substituting them
        #[arg(long)]
        placeholders: bool,
        /// Look up the timestamp column when the form names none
        #[arg(long)]
        detect_ts: bool,
    },
    /// List the statements of a SQL document
    Split {
        /// SQL file, or - for stdin
        input: String,
        /// Only print the statement (and its table) at this byte offset
        #[arg(long)]
        cursor: Option<usize>,
    },
    /// Pretty-print a SQL document
    Format {
        /// SQL file, or - for stdin
        input: String,
    },
    /// Normalize a timezone
    Tz {
        /// Timezone as typed by a user
        value: String,
    },
    /// Execute every statement of a SQL document
    Run {
        /// SQL file, or - for stdin
        input: String,
        #[command(flatten)]
        time: TimeArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the database status
    Status,
    /// List databases
    Databases {
        /// Ignore the cached list
        #[arg(long)]
        refresh: bool,
    },
    /// List the tables of the database
    Tables,
    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },
    /// Run PromQL queries and explore labels
    Promql {
        #[command(subcommand)]
        action: PromqlAction,
    },
    /// Encode or decode shareable query links
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },
    /// Show or save connection settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Show or change saved column visibility for a table
    Columns {
        /// Table name
        table: String,
        /// Columns to hide
        #[arg(long, value_delimiter = ',')]
        hide: Vec<String>,
        /// Columns to show
        #[arg(long, value_delimiter = ',')]
        show: Vec<String>,
    },
    /// Manage log pipelines
    Pipelines {
        #[command(subcommand)]
        action: PipelineAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective settings
    Show,
    /// Save the effective settings
    Save,
    /// Forget the saved settings
    Clear,
}

#[derive(Subcommand)]
enum PipelineAction {
    /// List pipelines
    List,
    /// Print the latest definition of a pipeline
    Get {
        /// Pipeline name
        name: String,
    },
    /// Upload a pipeline definition
    Create {
        /// Pipeline name
        name: String,
        /// YAML file, or - for stdin
        file: String,
    },
    /// Delete one version of a pipeline
    Delete {
        /// Pipeline name
        name: String,
        /// Version to delete
        version: String,
    },
    /// Run a pipeline over sample data without writing it
    Dryrun {
        /// Pipeline YAML file, or - for stdin
        pipeline: String,
        /// Sample data file
        data: String,
        /// Content type of the sample data
        #[arg(long, default_value = "application/json")]
        data_type: String,
    },
    /// Print the CREATE TABLE a pipeline would produce for a table
    Ddl {
        /// Pipeline name
        name: String,
        /// Target table
        table: String,
    },
    /// Write log lines into a table through a pipeline
    Ingest {
        /// Pipeline name
        name: String,
        /// Target table
        table: String,
        /// Log file, or - for stdin
        file: String,
        /// Content type of the log data
        #[arg(long, default_value = "text/plain")]
        content_type: String,
    },
}

#[derive(Subcommand)]
enum PromqlAction {
    /// Range query over the selected window
    Query {
        /// PromQL expression
        query: String,
        #[command(flatten)]
        time: TimeArgs,
        /// Step in seconds; derived from --points when absent
        #[arg(long)]
        step: Option<i64>,
        /// Maximum number of points per series
        #[arg(long, default_value_t = 1000)]
        points: u32,
    },
    /// Instant query
    Instant {
        /// PromQL expression
        query: String,
        /// Evaluation time, unix seconds
        #[arg(long)]
        time: Option<i64>,
    },
    /// Metric names, optionally filtered by a substring
    Metrics {
        /// Substring to search for
        search: Option<String>,
    },
    /// Label names
    Labels {
        /// Metric or series selector to restrict to
        #[arg(long = "match")]
        matcher: Option<String>,
    },
    /// Values of one label
    Values {
        /// Label name
        label: String,
        /// Metric or series selector to restrict to
        #[arg(long = "match")]
        matcher: Option<String>,
    },
    /// Series matching a selector
    Series {
        /// Metric or series selector
        matcher: String,
        #[command(flatten)]
        time: TimeArgs,
    },
    /// Pretty-print a PromQL expression
    Format {
        /// PromQL expression
        query: String,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Print the query string for SQL or a builder form
    Encode {
        /// SQL file, or - for stdin
        #[arg(long, conflicts_with = "form", required_unless_present = "form")]
        sql: Option<String>,
        /// Builder form file, or - for stdin
        #[arg(long)]
        form: Option<String>,
        #[command(flatten)]
        time: TimeArgs,
    },
    /// Print the SQL a link or query string stands for
    Decode {
        /// Link or query string
        link: String,
    },
}

impl Cli {
    fn repository(&self) -> SettingsRepository {
        SettingsRepository::new(Arc::new(FileStateStore::new(&self.state_file)))
    }

    /// Saved settings overlaid with flags and environment.
    fn effective_settings(&self, repo: &SettingsRepository) -> Result<ConnectionSettings> {
        let mut settings = repo.load().context("Failed to load saved settings")?;
        if let Some(url) = &self.url {
            settings.host.clone_from(url);
        }
        if let Some(database) = &self.database {
            settings.database.clone_from(database);
        }
        if let Some(username) = &self.username {
            settings.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            settings.password.clone_from(password);
        }
        if let Some(timezone) = &self.timezone {
            settings.user_timezone = Some(timezone.clone());
        }
        Ok(settings)
    }
}

impl TimeArgs {
    fn range(&self) -> Result<shared::time::TimeRange> {
        commands::resolve_time_range(self.minutes, self.start.as_deref(), self.end.as_deref())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json =
        std::env::var("TIDELENS_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let repo = cli.repository();
    let settings = cli.effective_settings(&repo)?;
    let context = ClientContext::new(settings.timezone(), Utc::now());
    let mut out = std::io::stdout().lock();

    let Some(command) = &cli.command else {
        writeln!(out, "Tidelens CLI v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "Use --help for usage information")?;
        return Ok(());
    };

    match command {
        Commands::Build {
            form,
            time,
            placeholders,
            detect_ts,
        } => {
            let mut form = commands::parse_form(&commands::read_input(form)?)?;
            if *detect_ts {
                let client = client(settings, context)?;
                commands::detect_ts_column(&client, &mut form).await?;
            }
            commands::build(&form, time.range()?, *placeholders, &mut out)?;
        }
        Commands::Split { input, cursor } => {
            commands::split(&commands::read_input(input)?, *cursor, &mut out)?;
        }
        Commands::Format { input } => commands::format(&commands::read_input(input)?, &mut out)?,
        Commands::Tz { value } => commands::timezone(value, &context, &mut out)?,
        Commands::Run {
            input,
            time,
            format,
        } => {
            let sql = commands::read_input(input)?;
            let client = client(settings, context)?;
            let count =
                commands::run(&client, &sql, time.range()?, *format, &context, &mut out).await?;
            tracing::info!(statements = count, "Done");
        }
        Commands::Status => {
            let status = client(settings, context)?.status().await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
        }
        Commands::Databases { refresh } => {
            let host = settings.host.clone();
            let client = client(settings, context)?;
            commands::databases(&client, &repo, &host, *refresh, Utc::now(), &mut out).await?;
        }
        Commands::Tables => commands::tables(&client(settings, context)?, &mut out).await?,
        Commands::Describe { table } => {
            commands::describe(&client(settings, context)?, table, &mut out).await?;
        }
        Commands::Promql { action } => {
            promql(&client(settings, context)?, action, &mut out).await?;
        }
        Commands::Share { action } => match action {
            ShareAction::Encode { sql, form, time } => {
                let sql = sql.as_deref().map(commands::read_input).transpose()?;
                let form = form
                    .as_deref()
                    .map(|path| commands::read_input(path).and_then(|f| commands::parse_form(&f)))
                    .transpose()?;
                let query = commands::share_encode(sql.as_deref(), form, time.range()?)?;
                writeln!(out, "{query}")?;
            }
            ShareAction::Decode { link } => commands::share_decode(link, &mut out)?,
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let mut shown = settings.clone();
                if !shown.password.is_empty() {
                    shown.password = "********".to_string();
                }
                writeln!(out, "{}", serde_json::to_string_pretty(&shown)?)?;
            }
            SettingsAction::Save => {
                repo.save(&settings)?;
                writeln!(out, "Saved settings to {}", cli.state_file)?;
            }
            SettingsAction::Clear => {
                repo.clear()?;
                writeln!(out, "Cleared saved settings")?;
            }
        },
        Commands::Columns { table, hide, show } => {
            let mut visibility = repo.column_visibility(table)?;
            apply_visibility(&mut visibility, hide, show);
            if !hide.is_empty() || !show.is_empty() {
                repo.set_column_visibility(table, &visibility)?;
            }
            for (column, visible) in &visibility {
                writeln!(out, "{column}\t{}", if *visible { "shown" } else { "hidden" })?;
            }
        }
        Commands::Pipelines { action } => {
            let client = client(settings, context)?;
            match action {
                PipelineAction::List => {
                    for pipeline in client.list_pipelines().await? {
                        writeln!(out, "{}\t{}", pipeline.name, pipeline.version)?;
                    }
                }
                PipelineAction::Get { name } => {
                    let pipeline = client.get_pipeline(name).await?;
                    writeln!(out, "# version {}", pipeline.version)?;
                    writeln!(out, "{}", pipeline.content.unwrap_or_default())?;
                }
                PipelineAction::Create { name, file } => {
                    let yaml = commands::read_input(file)?;
                    let response = client.create_pipeline(name, &yaml).await?;
                    writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
                }
                PipelineAction::Delete { name, version } => {
                    client.delete_pipeline(name, version).await?;
                    writeln!(out, "Deleted {name} version {version}")?;
                }
                PipelineAction::Dryrun {
                    pipeline,
                    data,
                    data_type,
                } => {
                    let pipeline = commands::read_input(pipeline)?;
                    let data = commands::read_input(data)?;
                    let result = client.dryrun_pipeline(&pipeline, &data, data_type).await?;
                    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
                }
                PipelineAction::Ddl { name, table } => {
                    writeln!(out, "{}", client.pipeline_ddl(name, table).await?)?;
                }
                PipelineAction::Ingest {
                    name,
                    table,
                    file,
                    content_type,
                } => {
                    let data = commands::read_input(file)?;
                    let result = client.ingest_logs(table, name, data, content_type).await?;
                    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
                }
            }
        }
    }

    Ok(())
}

async fn promql(
    client: &DatabaseClient,
    action: &PromqlAction,
    out: &mut impl Write,
) -> Result<()> {
    let result = match action {
        PromqlAction::Query {
            query,
            time,
            step,
            points,
        } => {
            let (start, end, step) =
                commands::range_query_params(time.range()?, Utc::now(), *points, *step)?;
            tracing::info!(start, end, step, "Running range query");
            client.range_query(query, start, end, step).await?
        }
        PromqlAction::Instant { query, time } => client.instant_query(query, *time).await?,
        PromqlAction::Metrics { search } => {
            for name in client.metric_names(search.as_deref()).await? {
                writeln!(out, "{name}")?;
            }
            return Ok(());
        }
        PromqlAction::Labels { matcher } => {
            let matcher = matcher.as_deref().map(to_series_selector);
            for name in client.label_names(matcher.as_deref()).await? {
                writeln!(out, "{name}")?;
            }
            return Ok(());
        }
        PromqlAction::Values { label, matcher } => {
            let matcher = matcher.as_deref().map(to_series_selector);
            for value in client.label_values(label, matcher.as_deref()).await? {
                writeln!(out, "{value}")?;
            }
            return Ok(());
        }
        PromqlAction::Series { matcher, time } => {
            let bounds = time.range()?.unix_range(Utc::now());
            let (start, end) = (bounds.map(|b| b.0), bounds.map(|b| b.1));
            let series = client.series(&to_series_selector(matcher), start, end).await?;
            serde_json::to_value(series)?
        }
        PromqlAction::Format { query } => {
            writeln!(out, "{}", client.format_promql(query).await?)?;
            return Ok(());
        }
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    Ok(())
}

fn client(settings: ConnectionSettings, context: ClientContext) -> Result<DatabaseClient> {
    Ok(DatabaseClient::new(settings)
        .context("Failed to create database client")?
        .with_client_context(context))
}

fn apply_visibility(visibility: &mut BTreeMap<String, bool>, hide: &[String], show: &[String]) {
    for column in hide {
        visibility.insert(column.clone(), false);
    }
    for column in show {
        visibility.insert(column.clone(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::time::normalize_timezone;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["tidelens"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_build_command() {
        let cli =
            Cli::try_parse_from(["tidelens", "build", "--form", "form.json", "--minutes", "15"])
                .unwrap();
        match cli.command {
            Some(Commands::Build {
                form,
                time,
                placeholders,
                detect_ts,
            }) => {
                assert_eq!(form, "form.json");
                assert_eq!(time.minutes, Some(15));
                assert!(!placeholders);
                assert!(!detect_ts);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_cli_time_flags_conflict() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["tidelens", "run", "-"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv)
        };
        assert!(parse(&["--minutes", "5", "--start", "1", "--end", "2"]).is_err());
        assert!(parse(&["--start", "1"]).is_err());
        assert!(parse(&["--start", "1", "--end", "2"]).is_ok());
    }

    #[test]
    fn test_cli_run_format() {
        let cli = Cli::try_parse_from(["tidelens", "run", "-", "--format", "csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                format: OutputFormat::Csv,
                ..
            })
        ));
        let cli = Cli::try_parse_from(["tidelens", "run", "-"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                format: OutputFormat::Table,
                ..
            })
        ));
        assert!(Cli::try_parse_from(["tidelens", "run", "-", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_cli_promql_commands() {
        let cli =
            Cli::try_parse_from(["tidelens", "promql", "query", "up", "--minutes", "30"]).unwrap();
        match cli.command {
            Some(Commands::Promql {
                action:
                    PromqlAction::Query {
                        query,
                        time,
                        step,
                        points,
                    },
            }) => {
                assert_eq!(query, "up");
                assert_eq!(time.minutes, Some(30));
                assert_eq!(step, None);
                assert_eq!(points, 1000);
            }
            _ => panic!("expected promql query command"),
        }

        let cli = Cli::try_parse_from(["tidelens", "promql", "values", "job", "--match", "up"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Promql { action: PromqlAction::Values { ref label, ref matcher } })
                if label == "job" && matcher.as_deref() == Some("up")
        ));
    }

    #[test]
    fn test_cli_share_encode_needs_one_source() {
        let share = |args: &[&str]| {
            let mut argv = vec!["tidelens", "share", "encode"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv)
        };
        assert!(share(&["--sql", "-"]).is_ok());
        assert!(share(&["--form", "form.json", "--minutes", "5"]).is_ok());
        assert!(share(&[]).is_err());
        assert!(share(&["--sql", "-", "--form", "form.json"]).is_err());
    }

    #[test]
    fn test_cli_pipeline_commands() {
        let cli =
            Cli::try_parse_from(["tidelens", "pipelines", "ingest", "nginx", "logs", "-"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Pipelines {
                action: PipelineAction::Ingest { ref content_type, .. }
            }) if content_type == "text/plain"
        ));
        assert!(Cli::try_parse_from(["tidelens", "pipelines", "ddl", "nginx"]).is_err());
    }

    #[test]
    fn test_cli_columns_command() {
        let cli = Cli::try_parse_from(["tidelens", "columns", "cpu", "--hide", "a,b"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Columns { ref hide, .. }) if hide == &["a", "b"]
        ));
    }

    #[test]
    fn test_effective_settings_overlay_flags() {
        let cli = Cli::try_parse_from([
            "tidelens",
            "--url",
            "http://db:4000",
            "--database",
            "metrics",
            "--timezone",
            "+8:00",
            "status",
        ])
        .unwrap();
        let settings = cli.effective_settings(&SettingsRepository::in_memory()).unwrap();
        assert_eq!(settings.host, "http://db:4000");
        assert_eq!(settings.database, "metrics");
        assert_eq!(settings.timezone(), normalize_timezone("+08:00"));
    }

    #[test]
    fn test_apply_visibility() {
        let mut visibility = BTreeMap::new();
        apply_visibility(&mut visibility, &["a".to_string(), "b".to_string()], &["b".to_string()]);
        assert_eq!(visibility.get("a"), Some(&false));
        assert_eq!(visibility.get("b"), Some(&true));
    }
}
