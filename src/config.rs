//! Configuration types for hn-crawl

use crate::error::{Error, Result};
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote item source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL that `maxitem.json` and `item/{id}.json` are resolved against
    /// (default: "https://hacker-news.firebaseio.com/v0/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a whole request, connect through body (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for establishing a connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Worker pool and queue sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Number of concurrent fetch workers (default: 512)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the id queue between feeder and workers (default: 1000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Capacity of the result channel between workers and sink (default: 512)
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Log progress whenever a worker picks up an id divisible by this (default: 5000)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            result_buffer: default_result_buffer(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Retry behavior for item fetches
///
/// Every fetch failure is treated as transient. With `max_attempts` unset the
/// worker keeps retrying the same id (with backoff) until the run is cancelled;
/// with a bound, the id is reported as a dead letter once the budget is spent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: unlimited)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Where results are stored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// SQLite database holding the items table (default: "hn.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Destination of `export` (default: "hn.json")
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    /// Line file written by `resume` (default: "week.json")
    #[serde(default = "default_update_path")]
    pub update_path: PathBuf,

    /// Buffer size for line-file writers in bytes (default: 40960)
    #[serde(default = "default_write_buffer")]
    pub write_buffer: usize,

    /// Records committed per transaction by the table sink (default: 500)
    #[serde(default = "default_table_batch_size")]
    pub table_batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            export_path: default_export_path(),
            update_path: default_update_path(),
            write_buffer: default_write_buffer(),
            table_batch_size: default_table_batch_size(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Worker pool settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Fetch retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
}

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hn-crawl.toml";

impl Config {
    /// Load configuration from `./hn-crawl.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }
        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
            key: None,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse config file {}: {}", path.display(), e),
            key: None,
        })?;

        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.crawl.workers == 0 {
            return Err(Error::config("crawl.workers", "must be at least 1"));
        }
        if self.crawl.queue_capacity == 0 {
            return Err(Error::config("crawl.queue_capacity", "must be at least 1"));
        }
        if self.crawl.result_buffer == 0 {
            return Err(Error::config("crawl.result_buffer", "must be at least 1"));
        }
        if self.crawl.progress_interval == 0 {
            return Err(Error::config("crawl.progress_interval", "must be at least 1"));
        }
        if self.output.table_batch_size == 0 {
            return Err(Error::config("output.table_batch_size", "must be at least 1"));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be a finite number of at least 1.0",
            ));
        }
        url::Url::parse(&self.source.base_url).map_err(|e| {
            Error::config("source.base_url", format!("invalid URL {:?}: {}", self.source.base_url, e))
        })?;
        Ok(())
    }
}

/// What a run does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Crawl every item from id 1 (table sink unless overridden)
    Crawl,
    /// Copy the items table to a line-delimited file
    Export,
    /// Crawl from a caller-supplied id (file sink unless overridden)
    Resume,
}

/// Kind of result sink
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Keyed `items` table in SQLite
    Table,
    /// Append-only line file
    File,
}

/// Immutable description of one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Mode of operation
    pub mode: Mode,
    /// First id to crawl; only used by [`Mode::Resume`]
    #[serde(default)]
    pub start_id: Option<ItemId>,
    /// Sink override; `None` picks the mode's default
    #[serde(default)]
    pub sink: Option<SinkKind>,
}

impl RunConfig {
    /// Full crawl into the table sink
    pub fn crawl() -> Self {
        Self {
            mode: Mode::Crawl,
            start_id: None,
            sink: None,
        }
    }

    /// Table to file export
    pub fn export() -> Self {
        Self {
            mode: Mode::Export,
            start_id: None,
            sink: None,
        }
    }

    /// Crawl from `start_id` into the file sink
    pub fn resume(start_id: ItemId) -> Self {
        Self {
            mode: Mode::Resume,
            start_id: Some(start_id),
            sink: None,
        }
    }

    /// Override the sink chosen by the mode
    pub fn with_sink(mut self, sink: SinkKind) -> Self {
        self.sink = Some(sink);
        self
    }

    /// First id to crawl for this run
    pub fn start_id(&self) -> Result<ItemId> {
        match self.mode {
            Mode::Crawl => Ok(ItemId(1)),
            Mode::Resume => match self.start_id {
                Some(id) if id.get() >= 0 => Ok(id),
                Some(id) => Err(Error::config(
                    "start_id",
                    format!("must be non-negative, got {}", id),
                )),
                None => Err(Error::config("start_id", "resume requires a starting id")),
            },
            Mode::Export => Err(Error::config("mode", "export does not crawl")),
        }
    }

    /// Sink used by crawling modes
    pub fn sink_kind(&self) -> SinkKind {
        self.sink.unwrap_or(match self.mode {
            Mode::Crawl | Mode::Export => SinkKind::Table,
            Mode::Resume => SinkKind::File,
        })
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://hacker-news.firebaseio.com/v0/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_workers() -> usize {
    512
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_result_buffer() -> usize {
    512
}

fn default_progress_interval() -> u64 {
    5000
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("hn.db")
}

fn default_export_path() -> PathBuf {
    PathBuf::from("hn.json")
}

fn default_update_path() -> PathBuf {
    PathBuf::from("week.json")
}

fn default_write_buffer() -> usize {
    40960
}

fn default_table_batch_size() -> usize {
    500
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
