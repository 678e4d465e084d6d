mod examples;
mod output;
mod theme;

use anyhow::{Context, Result};
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser};
use colored::{Colorize, control::ShouldColorize};
use std::fmt::Write;

use sessmigrate::{
    BatchExecutor, Cancellation, ConnectionManager, DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE, DryRunExecutor, KeyContext,
    Migration, MigrationOptions, MigrationSummary, PostgresSource, ProgressReporter, RedisExecutor, RenderMode,
    StopRequest, TableName, select_renderer,
};

use examples::{EXAMPLES, command_width};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ACCENT, DIM, help_styles};

/// Exit status after Ctrl-C, following the shell convention for SIGINT.
const EXIT_CANCELLED: i32 = 130;

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("DATABASE_URL", "Postgres connection string of the session table"),
    ("REDIS_URL", "Redis connection URL sessions are written to"),
    ("SESSION_TABLE", "Session table, optionally schema-qualified"),
    ("SESSION_REDIS_PREFIX", "Prefix prepended to every Redis key"),
    ("RUST_LOG", "Log filter, e.g. sessmigrate=debug"),
];

#[derive(Parser)]
#[command(name = "sessmigrate")]
#[command(version)]
#[command(
    about = "Migrate database sessions into Redis",
    long_about = r#"Copies every session row into Redis and gives each key the TTL left
until its expiry date:

• Keyed pagination, safe on a live table
• Pipelined writes, one round trip per chunk
• Expired sessions are skipped and counted
• Re-running is safe: writes overwrite by session key

A `timestamp` expire_date column without time zone is read as UTC. Projects
storing local wall-clock times (USE_TZ = False on a non-UTC server) should
convert the column first or expect TTLs off by the server's UTC offset.
"#
)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://postgres@localhost/postgres")]
    database_url: String,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1/")]
    redis_url: String,

    /// Session table to read, optionally schema-qualified
    #[arg(long, env = "SESSION_TABLE", default_value = "django_session")]
    table: String,

    /// Prefix for Redis keys (stored as <prefix>:<session_key>)
    #[arg(long, env = "SESSION_REDIS_PREFIX")]
    key_prefix: Option<String>,

    /// Records per pipeline flush
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Rows fetched per database round trip
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Count what would be written without touching Redis
    #[arg(long)]
    dry_run: bool,

    /// Print counter lines instead of a live progress bar
    #[arg(long)]
    plain: bool,

    /// Output format of the final summary
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn parse_args() -> Self {
        let matches = build_cli_command().get_matches();
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }

    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            output_format: self.output.clone(),
            quiet: self.quiet,
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }

    fn render_mode(&self) -> RenderMode {
        if self.quiet || self.output == OutputFormat::Json {
            RenderMode::Silent
        } else if self.plain || self.no_color {
            RenderMode::Plain
        } else {
            RenderMode::Auto
        }
    }

    fn migration_options(&self) -> Result<MigrationOptions> {
        let options = MigrationOptions {
            chunk_size: self.chunk_size,
            page_size: self.page_size,
            keys: KeyContext::new(self.key_prefix.clone()),
        };
        options.validate()?;
        Ok(options)
    }
}

fn build_cli_command() -> Command {
    let use_color = ShouldColorize::from_env().should_colorize();
    Cli::command()
        .styles(help_styles())
        .after_long_help(help_appendix(use_color))
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
}

/// Examples and environment variables shown under `--help`.
fn help_appendix(use_color: bool) -> String {
    let paint = |text: &str, accent: bool| -> String {
        match (use_color, accent) {
            (false, _) => text.to_string(),
            (true, true) => text.color(ACCENT).bold().to_string(),
            (true, false) => text.color(DIM).to_string(),
        }
    };

    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Examples:", true));
    let width = command_width();
    for (group, commands) in EXAMPLES {
        let _ = writeln!(buffer, "  {group}");
        for (command, effect) in commands.iter() {
            let _ = writeln!(buffer, "    {command:<width$}  {}", paint(&format!("# {effect}"), false));
        }
    }

    let _ = writeln!(buffer, "\n{}", paint("Environment Variables:", true));
    let key_width = ENVIRONMENT_VARIABLES.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(buffer, "  {key:<key_width$}  {}", paint(description, false));
    }
    buffer
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_args();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(cli.global_options());

    match execute(&cli, &output).await {
        Ok(summary) if summary.cancelled => {
            output.warning("Migration cancelled; re-run to migrate the remaining sessions");
            std::process::exit(EXIT_CANCELLED);
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn execute(cli: &Cli, output: &OutputManager) -> Result<MigrationSummary> {
    let options = cli.migration_options()?;
    let table = TableName::parse(&cli.table)?;

    output.heading("Migrate Sessions");
    output.field("Table", &table.qualified());
    output.field("Chunk size", &options.chunk_size.to_string());
    output.field("Page size", &options.page_size.to_string());
    if let Some(prefix) = options.keys.prefix() {
        output.field("Key prefix", &format!("{prefix}:"));
    }
    if cli.dry_run {
        output.warning("DRY RUN MODE - No changes will be made");
    }

    output.begin_step("Connecting to Postgres");
    let source = PostgresSource::connect(&cli.database_url, table)
        .await
        .context("Failed to connect to Postgres")?;
    output.end_step("connected");

    let cancellation = Cancellation::new();
    watch_ctrl_c(cancellation.clone());

    let reporter = ProgressReporter::new(select_renderer(cli.render_mode()));

    let summary = if cli.dry_run {
        let executor = DryRunExecutor::new();
        run_migration(source, executor, options, cancellation, reporter, output).await?
    } else {
        output.begin_step(&format!("Connecting to Redis at {}", cli.redis_url));
        let client = redis::Client::open(cli.redis_url.as_str()).context("Invalid Redis URL")?;
        let mut conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        output.end_step("connected");

        let executor = RedisExecutor::new(&mut conn);
        run_migration(source, executor, options, cancellation, reporter, output).await?
    };

    report_summary(&summary, cli.dry_run, output)?;
    Ok(summary)
}

async fn run_migration<E>(
    source: PostgresSource,
    executor: E,
    options: MigrationOptions,
    cancellation: Cancellation,
    mut reporter: ProgressReporter,
    output: &OutputManager,
) -> Result<MigrationSummary>
where
    E: BatchExecutor,
{
    let mut migration = Migration::new(source, executor, options).with_cancellation(cancellation);

    match migration.run(&mut reporter).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            let committed = migration.committed();
            output.error("Migration aborted; nothing after the last completed chunk is guaranteed");
            output.display(&committed)?;
            Err(err).context("Session migration failed")
        }
    }
}

fn report_summary(summary: &MigrationSummary, dry_run: bool, output: &OutputManager) -> Result<()> {
    if summary.nothing_to_do {
        output.info("Nothing to do: the session table is empty");
        return output.display(summary);
    }

    output.heading("Summary");
    if output.options.output_format == OutputFormat::Table && !output.options.quiet {
        println!("{summary}");
    }
    output.display(summary)?;
    output.verbose(&format!("{} session(s) streamed", summary.seen()));

    if summary.skipped > 0 {
        output.info(&format!("{} expired session(s) were skipped", summary.skipped));
    }
    if dry_run {
        output.warning("DRY RUN - No actual changes were made");
    } else if !summary.cancelled {
        output.success("Sessions migrated");
    }
    Ok(())
}

fn watch_ctrl_c(cancellation: Cancellation) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match cancellation.request_stop() {
                StopRequest::AfterChunk => {
                    log::warn!("interrupt received, stopping after the current chunk (press Ctrl-C again to abort)");
                }
                StopRequest::Immediate => {
                    eprintln!("\nInterrupted again, aborting without waiting for the current chunk");
                    std::process::exit(EXIT_CANCELLED);
                }
            }
        }
    });
}
