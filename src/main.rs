//! hn-crawl command line
//!
//! Crawls items into SQLite, exports the table to a line file, or resumes a
//! crawl from a given id into a line file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use hn_crawl::{Config, ItemId, RunConfig, RunOutcome, SinkKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hn-crawl")]
#[command(about = "Copy every Hacker News item into SQLite or a JSON lines file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path (default: ./hn-crawl.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Number of concurrent fetch workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Base URL of the item API
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every item from id 1 into the items table
    Crawl {
        /// Where fetched items go
        #[arg(long, value_enum)]
        sink: Option<SinkArg>,

        /// SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Write the items table to a JSON lines file, ordered by id
    Export {
        /// SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Crawl from a starting id into a JSON lines file
    #[command(alias = "update")]
    Resume {
        /// First id to fetch
        #[arg(long)]
        start_id: i64,

        /// Where fetched items go
        #[arg(long, value_enum)]
        sink: Option<SinkArg>,

        /// Output file for the file sink
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SQLite database path for the table sink
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    Table,
    File,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Table => SinkKind::Table,
            SinkArg::File => SinkKind::File,
        }
    }
}

/// Initialize structured logging; `RUST_LOG` takes precedence over `level`
fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> hn_crawl::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    if let Some(workers) = cli.workers {
        config.crawl.workers = workers;
    }
    if let Some(base_url) = &cli.base_url {
        config.source.base_url = base_url.clone();
    }

    Ok(config)
}

/// Apply per-command overrides and pick the run to perform
fn plan(command: Command, config: &mut Config) -> Option<RunConfig> {
    match command {
        Command::Crawl { sink, database } => {
            if let Some(database) = database {
                config.output.database_path = database;
            }
            let run = RunConfig::crawl();
            Some(match sink {
                Some(sink) => run.with_sink(sink.into()),
                None => run,
            })
        }
        Command::Export { database, output } => {
            if let Some(database) = database {
                config.output.database_path = database;
            }
            if let Some(output) = output {
                config.output.export_path = output;
            }
            Some(RunConfig::export())
        }
        Command::Resume {
            start_id,
            sink,
            output,
            database,
        } => {
            if let Some(output) = output {
                config.output.update_path = output;
            }
            if let Some(database) = database {
                config.output.database_path = database;
            }
            let run = RunConfig::resume(ItemId(start_id));
            Some(match sink {
                Some(sink) => run.with_sink(sink.into()),
                None => run,
            })
        }
        Command::Config => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let Some(run_config) = plan(cli.command, &mut config) else {
        return match config.to_toml_string() {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render configuration");
                ExitCode::FAILURE
            }
        };
    };

    let cancel = CancellationToken::new();
    let signals = hn_crawl::cancel_on_signal(cancel.clone());

    let result = hn_crawl::run(&config, run_config, &cancel).await;

    // Stop the signal listener
    cancel.cancel();
    signals.await.ok();

    match result {
        Ok(outcome) => {
            match serde_json::to_string_pretty(&outcome) {
                Ok(summary) => println!("{summary}"),
                Err(e) => tracing::warn!(error = %e, "Failed to render run summary"),
            }
            match outcome {
                RunOutcome::Crawled(report) if !report.is_complete() => ExitCode::from(2),
                _ => ExitCode::SUCCESS,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
